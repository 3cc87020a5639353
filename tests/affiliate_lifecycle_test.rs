// Affiliate application, moderation and notification behaviour

mod common;

use affiliate_backend::{
    db::AffiliateStore,
    middleware::AuthenticatedUser,
    models::{AdminAction, AdminActionRequest, ApplyRequest},
    services::{AffiliateService, LinkGeneratorService},
    utils::{link_code::is_valid_code, AffiliateError},
};
use common::{FixedCodeSource, RecordingNotifier, TestApp};
use std::sync::Arc;
use uuid::Uuid;

fn applicant() -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: Uuid::new_v4(),
        email: "creator@blog.test".to_string(),
        role: "authenticated".to_string(),
        is_admin: false,
    }
}

fn admin() -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: Uuid::new_v4(),
        email: "ops@shop.test".to_string(),
        role: "admin".to_string(),
        is_admin: true,
    }
}

fn application() -> ApplyRequest {
    ApplyRequest {
        full_name: Some("  Casey Creator ".to_string()),
        payment_method: "paypal".to_string(),
        bank_details: Some(serde_json::json!({ "paypal_email": "casey@pay.test" })),
    }
}

#[tokio::test]
async fn test_apply_creates_pending_profile_and_sends_receipt() {
    let app = TestApp::new();
    let service = AffiliateService::new(&app.state);
    let user = applicant();

    let profile = service.apply(&user, application()).await.unwrap();

    assert_eq!(profile.status, "pending");
    assert_eq!(profile.affiliate_code, None);
    assert_eq!(profile.full_name.as_deref(), Some("Casey Creator"));
    assert_eq!(profile.commission_rate, 5);
    assert_eq!((profile.total_earnings, profile.pending_earnings), (0, 0));
    assert_eq!(app.notifier.kinds(), vec!["application_received"]);
    assert_eq!(app.notifier.sent()[0].recipient(), "creator@blog.test");

    assert!(matches!(
        service.apply(&user, application()).await,
        Err(AffiliateError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_apply_requires_payment_method() {
    let app = TestApp::new();
    let service = AffiliateService::new(&app.state);

    let mut request = application();
    request.payment_method = "   ".to_string();

    assert!(matches!(
        service.apply(&applicant(), request).await,
        Err(AffiliateError::Validation(_))
    ));
    assert!(app.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_approve_mints_code_and_notifies() {
    let app = TestApp::new();
    let service = AffiliateService::new(&app.state);
    let user = applicant();
    service.apply(&user, application()).await.unwrap();

    let approved = service
        .apply_admin_action(
            &admin(),
            user.user_id,
            AdminActionRequest {
                action: AdminAction::Approve,
                reason: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(approved.status, "approved");
    let code = approved.affiliate_code.clone().unwrap();
    assert!(is_valid_code(&code, 8));
    assert!(approved.approved_at.is_some());
    assert_eq!(
        app.notifier.kinds(),
        vec!["application_received", "application_approved"]
    );

    let found = app.store.find_approved_by_code(&code).await.unwrap().unwrap();
    assert_eq!(found.user_id, user.user_id);

    assert!(matches!(
        service.approve(None, user.user_id).await,
        Err(AffiliateError::Conflict(_))
    ));
    assert!(matches!(
        service.approve(None, Uuid::new_v4()).await,
        Err(AffiliateError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_moderation_requires_admin() {
    let app = TestApp::new();
    let service = AffiliateService::new(&app.state);
    let user = applicant();
    service.apply(&user, application()).await.unwrap();

    let result = service
        .apply_admin_action(
            &user,
            user.user_id,
            AdminActionRequest {
                action: AdminAction::Approve,
                reason: None,
            },
        )
        .await;

    assert!(matches!(result, Err(AffiliateError::Forbidden(_))));
    let profile = service.get_profile(user.user_id).await.unwrap();
    assert_eq!(profile.status, "pending");
}

#[tokio::test]
async fn test_rejected_applicant_can_reapply() {
    let app = TestApp::new();
    let service = AffiliateService::new(&app.state);
    let user = applicant();
    service.apply(&user, application()).await.unwrap();

    let rejected = service
        .reject(None, user.user_id, Some("Audience too small".to_string()))
        .await
        .unwrap();
    assert_eq!(rejected.status, "rejected");
    assert!(matches!(
        service.reject(None, user.user_id, None).await,
        Err(AffiliateError::Conflict(_))
    ));
    assert!(matches!(
        service.approve(None, user.user_id).await,
        Err(AffiliateError::Conflict(_))
    ));

    let reapplied = service.apply(&user, application()).await.unwrap();
    assert_eq!(reapplied.status, "pending");
    assert_eq!(
        app.notifier.kinds(),
        vec![
            "application_received",
            "application_rejected",
            "application_received"
        ]
    );
}

#[tokio::test]
async fn test_suspension_revokes_code_and_links() {
    let app = TestApp::new();
    let service = AffiliateService::new(&app.state);
    let user = applicant();
    service.apply(&user, application()).await.unwrap();
    let approved = service.approve(None, user.user_id).await.unwrap();
    let old_code = approved.affiliate_code.clone().unwrap();

    app.seed_product("prod-1", None).await;
    let links = LinkGeneratorService::new(&app.state);
    let link = links.generate_link(user.user_id, "prod-1").await.unwrap();

    let suspended = service
        .suspend(None, user.user_id, Some("Coupon abuse".to_string()))
        .await
        .unwrap();
    assert_eq!(suspended.status, "suspended");
    assert_eq!(suspended.affiliate_code, None);
    assert!(app.store.find_approved_by_code(&old_code).await.unwrap().is_none());
    assert!(!links.list_links(user.user_id).await.unwrap()[0].is_active);

    assert_eq!(
        links.set_link_active(user.user_id, link.id, true).await,
        Err(AffiliateError::NotApproved)
    );

    let reinstated = service.approve(None, user.user_id).await.unwrap();
    let new_code = reinstated.affiliate_code.unwrap();
    assert!(is_valid_code(&new_code, 8));
    assert_ne!(new_code, old_code);
}

#[tokio::test]
async fn test_failing_notifier_does_not_fail_actions() {
    let app = TestApp::with_notifier(RecordingNotifier::failing());
    let service = AffiliateService::new(&app.state);
    let user = applicant();

    service.apply(&user, application()).await.unwrap();
    let approved = service.approve(None, user.user_id).await.unwrap();

    assert_eq!(approved.status, "approved");
    assert_eq!(app.notifier.sent().len(), 2);
}

#[tokio::test]
async fn test_approve_gives_up_after_repeated_collisions() {
    let app = TestApp::with_code_source(Arc::new(FixedCodeSource("K3J9QX2M".to_string())));
    app.seed_affiliate("K3J9QX2M", 0).await;
    let service = AffiliateService::new(&app.state);
    let user = applicant();
    service.apply(&user, application()).await.unwrap();

    assert_eq!(
        service.approve(None, user.user_id).await,
        Err(AffiliateError::CodeGenerationExhausted)
    );
    let profile = service.get_profile(user.user_id).await.unwrap();
    assert_eq!(profile.status, "pending");
    assert_eq!(profile.affiliate_code, None);
}

#[tokio::test]
async fn test_list_profiles_by_status() {
    let app = TestApp::new();
    let service = AffiliateService::new(&app.state);
    app.seed_affiliate("AB12CD34", 0).await;
    service.apply(&applicant(), application()).await.unwrap();
    service.apply(&applicant(), application()).await.unwrap();

    assert_eq!(service.list_profiles(None).await.unwrap().len(), 3);
    assert_eq!(service.list_profiles(Some("pending")).await.unwrap().len(), 2);
    assert_eq!(service.list_profiles(Some("approved")).await.unwrap().len(), 1);
}
