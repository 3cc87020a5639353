// Link generation: preconditions, code uniqueness and collision handling

mod common;

use affiliate_backend::{
    services::LinkGeneratorService,
    utils::{link_code::is_valid_code, AffiliateError},
};
use common::{FixedCodeSource, TestApp, SITE_URL};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::test]
async fn test_approved_affiliate_gets_link_with_zeroed_counters() {
    let app = TestApp::new();
    let affiliate = app.seed_affiliate("AB12CD34", 0).await;
    app.seed_product("prod-1", Some("wireless-headphones")).await;

    let link = LinkGeneratorService::new(&app.state)
        .generate_link(affiliate.user_id, "prod-1")
        .await
        .unwrap();

    assert!(is_valid_code(&link.link_code, 12));
    assert_eq!(link.affiliate_id, affiliate.user_id);
    assert_eq!((link.clicks, link.conversions, link.commission_earned), (0, 0, 0));
    assert!(link.is_active);
    assert_eq!(
        link.url,
        format!(
            "{}/store/product/wireless-headphones?ref=AB12CD34&product=prod-1&link={}",
            SITE_URL, link.link_code
        )
    );
}

#[tokio::test]
async fn test_many_links_get_distinct_codes() {
    let app = TestApp::new();
    let affiliate = app.seed_affiliate("AB12CD34", 0).await;
    app.seed_product("prod-1", None).await;
    let service = LinkGeneratorService::new(&app.state);

    let mut codes = HashSet::new();
    for _ in 0..50 {
        let link = service.generate_link(affiliate.user_id, "prod-1").await.unwrap();
        codes.insert(link.link_code);
    }

    assert_eq!(codes.len(), 50);
    assert_eq!(service.list_links(affiliate.user_id).await.unwrap().len(), 50);
}

#[tokio::test]
async fn test_pending_affiliate_cannot_generate_links() {
    let app = TestApp::new();
    app.seed_product("prod-1", None).await;

    let mut pending = common::approved_profile(Uuid::new_v4(), "ZZ99ZZ99", 0);
    pending.status = "pending".to_string();
    pending.affiliate_code = None;
    app.store.insert_profile(pending.clone()).await;

    let service = LinkGeneratorService::new(&app.state);
    let result = service.generate_link(pending.user_id, "prod-1").await;

    assert_eq!(result, Err(AffiliateError::NotApproved));
    assert!(service.list_links(pending.user_id).await.unwrap().is_empty());

    let stranger = service.generate_link(Uuid::new_v4(), "prod-1").await;
    assert_eq!(stranger, Err(AffiliateError::NotApproved));
}

#[tokio::test]
async fn test_unknown_or_inactive_product_is_rejected() {
    let app = TestApp::new();
    let affiliate = app.seed_affiliate("AB12CD34", 0).await;
    app.store
        .insert_product(affiliate_backend::models::ProductRef {
            id: "retired".to_string(),
            name: "Retired".to_string(),
            slug: None,
            is_active: false,
        })
        .await;
    let service = LinkGeneratorService::new(&app.state);

    assert_eq!(
        service.generate_link(affiliate.user_id, "missing").await,
        Err(AffiliateError::ProductNotFound)
    );
    assert_eq!(
        service.generate_link(affiliate.user_id, "retired").await,
        Err(AffiliateError::ProductNotFound)
    );
}

#[tokio::test]
async fn test_forced_collisions_exhaust_generation() {
    let app = TestApp::with_code_source(Arc::new(FixedCodeSource("K3J9QX2M7P1Z".to_string())));
    let affiliate = app.seed_affiliate("AB12CD34", 0).await;
    app.seed_product("prod-1", None).await;
    let service = LinkGeneratorService::new(&app.state);

    let first = service.generate_link(affiliate.user_id, "prod-1").await.unwrap();
    assert_eq!(first.link_code, "K3J9QX2M7P1Z");

    let second = service.generate_link(affiliate.user_id, "prod-1").await;
    assert_eq!(second, Err(AffiliateError::CodeGenerationExhausted));
    assert_eq!(service.list_links(affiliate.user_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_only_the_owner_can_toggle_a_link() {
    let app = TestApp::new();
    let owner = app.seed_affiliate("AB12CD34", 0).await;
    let other = app.seed_affiliate("EF56GH78", 0).await;
    app.seed_product("prod-1", None).await;
    let service = LinkGeneratorService::new(&app.state);

    let link = service.generate_link(owner.user_id, "prod-1").await.unwrap();

    assert!(matches!(
        service.set_link_active(other.user_id, link.id, false).await,
        Err(AffiliateError::NotFound(_))
    ));

    let deactivated = service
        .set_link_active(owner.user_id, link.id, false)
        .await
        .unwrap();
    assert!(!deactivated.is_active);

    let reactivated = service
        .set_link_active(owner.user_id, link.id, true)
        .await
        .unwrap();
    assert!(reactivated.is_active);
}
