// Payout reservation against pending earnings and settlement outcomes

mod common;

use affiliate_backend::{
    db::AffiliateStore,
    middleware::AuthenticatedUser,
    models::{
        AffiliateProfile, AttributionRequest, ClientMeta, PayoutRequest, PayoutStatus,
        SettlePayoutRequest,
    },
    services::{AttributionService, PayoutService},
    utils::AffiliateError,
};
use common::TestApp;
use uuid::Uuid;

fn admin() -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: Uuid::new_v4(),
        email: "ops@shop.test".to_string(),
        role: "admin".to_string(),
        is_admin: true,
    }
}

fn settle(status: PayoutStatus, transaction_ref: Option<&str>) -> SettlePayoutRequest {
    SettlePayoutRequest {
        status,
        transaction_ref: transaction_ref.map(str::to_string),
    }
}

/// Affiliate with 10,000 earned from two confirmed 5,000 commissions
async fn earning_affiliate(app: &TestApp) -> AffiliateProfile {
    let affiliate = app.seed_affiliate("AB12CD34", 0).await;
    let attribution = AttributionService::new(&app.state);
    for order_id in ["order-1", "order-2"] {
        attribution
            .attribute_referral(AttributionRequest {
                order_id: order_id.to_string(),
                affiliate_code: "AB12CD34".to_string(),
                order_total: 100_000,
                link_code: None,
                client: ClientMeta::default(),
            })
            .await
            .unwrap();
        attribution.confirm_order(order_id).await.unwrap();
    }
    affiliate
}

async fn balance(app: &TestApp, affiliate_id: Uuid) -> i64 {
    app.store
        .find_profile(affiliate_id)
        .await
        .unwrap()
        .unwrap()
        .pending_earnings
}

async fn paid_referrals(app: &TestApp, affiliate_id: Uuid) -> usize {
    app.store
        .list_referrals(affiliate_id, None)
        .await
        .unwrap()
        .iter()
        .filter(|r| r.paid_at.is_some())
        .count()
}

#[tokio::test]
async fn test_request_over_balance_is_rejected_without_side_effects() {
    let app = TestApp::new();
    let affiliate = earning_affiliate(&app).await;
    let service = PayoutService::new(&app.state);

    let result = service
        .request_payout(affiliate.user_id, PayoutRequest { amount: 15_000 })
        .await;

    assert_eq!(
        result,
        Err(AffiliateError::InsufficientBalance {
            requested: 15_000,
            available: 10_000,
        })
    );
    assert_eq!(balance(&app, affiliate.user_id).await, 10_000);
    assert!(service.list_payouts(affiliate.user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_request_reserves_amount_as_pending_payout() {
    let app = TestApp::new();
    let affiliate = earning_affiliate(&app).await;
    let service = PayoutService::new(&app.state);

    let payout = service
        .request_payout(affiliate.user_id, PayoutRequest { amount: 8_000 })
        .await
        .unwrap();

    assert_eq!(payout.amount, 8_000);
    assert_eq!(payout.status, "pending");
    assert_eq!(payout.payment_method, "bank_transfer");
    assert_eq!(balance(&app, affiliate.user_id).await, 2_000);

    let profile = app.store.find_profile(affiliate.user_id).await.unwrap().unwrap();
    assert_eq!(profile.total_earnings, 10_000);
}

#[tokio::test]
async fn test_below_minimum_and_non_positive_amounts() {
    let app = TestApp::new();
    let affiliate = earning_affiliate(&app).await;
    let service = PayoutService::new(&app.state);

    assert_eq!(
        service
            .request_payout(affiliate.user_id, PayoutRequest { amount: 4_999 })
            .await,
        Err(AffiliateError::BelowMinimum { minimum: 5_000 })
    );
    assert!(matches!(
        service
            .request_payout(affiliate.user_id, PayoutRequest { amount: 0 })
            .await,
        Err(AffiliateError::Validation(_))
    ));
    assert!(matches!(
        service
            .request_payout(Uuid::new_v4(), PayoutRequest { amount: 6_000 })
            .await,
        Err(AffiliateError::NotFound(_))
    ));
    assert_eq!(balance(&app, affiliate.user_id).await, 10_000);
}

#[tokio::test]
async fn test_completed_payout_marks_referrals_paid_and_notifies() {
    let app = TestApp::new();
    let affiliate = earning_affiliate(&app).await;
    let service = PayoutService::new(&app.state);
    let payout = service
        .request_payout(affiliate.user_id, PayoutRequest { amount: 8_000 })
        .await
        .unwrap();

    let processing = service
        .settle_payout(&admin(), payout.id, settle(PayoutStatus::Processing, None))
        .await
        .unwrap();
    assert_eq!(processing.status, "processing");

    let completed = service
        .settle_payout(
            &admin(),
            payout.id,
            settle(PayoutStatus::Completed, Some("txn-001")),
        )
        .await
        .unwrap();
    assert_eq!(completed.status, "completed");
    assert_eq!(completed.transaction_ref.as_deref(), Some("txn-001"));
    assert!(completed.processed_at.is_some());

    let referrals = app.store.list_referrals(affiliate.user_id, None).await.unwrap();
    assert_eq!(referrals.iter().filter(|r| r.paid_at.is_some()).count(), 1);
    assert_eq!(app.notifier.kinds(), vec!["payout_completed"]);

    // Repeating the same settlement is a no-op without a second email
    service
        .settle_payout(&admin(), payout.id, settle(PayoutStatus::Completed, None))
        .await
        .unwrap();
    assert_eq!(app.notifier.kinds().len(), 1);
    assert_eq!(balance(&app, affiliate.user_id).await, 2_000);
}

#[tokio::test]
async fn test_failed_payout_returns_amount_to_balance() {
    let app = TestApp::new();
    let affiliate = earning_affiliate(&app).await;
    let service = PayoutService::new(&app.state);
    let payout = service
        .request_payout(affiliate.user_id, PayoutRequest { amount: 8_000 })
        .await
        .unwrap();

    let failed = service
        .settle_payout(&admin(), payout.id, settle(PayoutStatus::Failed, None))
        .await
        .unwrap();

    assert_eq!(failed.status, "failed");
    assert_eq!(balance(&app, affiliate.user_id).await, 10_000);
    assert!(app.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_settlement_rejects_invalid_moves_and_non_admins() {
    let app = TestApp::new();
    let affiliate = earning_affiliate(&app).await;
    let service = PayoutService::new(&app.state);
    let payout = service
        .request_payout(affiliate.user_id, PayoutRequest { amount: 8_000 })
        .await
        .unwrap();

    let member = AuthenticatedUser {
        user_id: affiliate.user_id,
        email: affiliate.email.clone(),
        role: "authenticated".to_string(),
        is_admin: false,
    };
    assert!(matches!(
        service
            .settle_payout(&member, payout.id, settle(PayoutStatus::Completed, None))
            .await,
        Err(AffiliateError::Forbidden(_))
    ));

    assert!(matches!(
        service
            .settle_payout(&admin(), payout.id, settle(PayoutStatus::Pending, None))
            .await,
        Err(AffiliateError::Validation(_))
    ));

    service
        .settle_payout(&admin(), payout.id, settle(PayoutStatus::Failed, None))
        .await
        .unwrap();
    assert!(matches!(
        service
            .settle_payout(&admin(), payout.id, settle(PayoutStatus::Completed, None))
            .await,
        Err(AffiliateError::Conflict(_))
    ));

    assert!(matches!(
        service
            .settle_payout(&admin(), Uuid::new_v4(), settle(PayoutStatus::Failed, None))
            .await,
        Err(AffiliateError::NotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_cannot_overdraw_balance() {
    let app = TestApp::new();
    let affiliate = earning_affiliate(&app).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let state = app.state.clone();
        let affiliate_id = affiliate.user_id;
        handles.push(tokio::spawn(async move {
            PayoutService::new(&state)
                .request_payout(affiliate_id, PayoutRequest { amount: 6_000 })
                .await
        }));
    }

    let mut reserved = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(payout) => {
                assert_eq!(payout.amount, 6_000);
                reserved += 1;
            },
            Err(e) => assert!(
                matches!(e, AffiliateError::InsufficientBalance { requested: 6_000, .. }),
                "unexpected error: {:?}",
                e
            ),
        }
    }

    assert_eq!(reserved, 1);
    assert_eq!(balance(&app, affiliate.user_id).await, 4_000);
    let payouts = PayoutService::new(&app.state)
        .list_payouts(affiliate.user_id)
        .await
        .unwrap();
    assert_eq!(payouts.len(), 1);
}

#[tokio::test]
async fn test_payout_remainder_counts_toward_next_settlement() {
    let app = TestApp::new();
    let affiliate = earning_affiliate(&app).await;
    let attribution = AttributionService::new(&app.state);
    attribution
        .attribute_referral(AttributionRequest {
            order_id: "order-3".to_string(),
            affiliate_code: "AB12CD34".to_string(),
            order_total: 100_000,
            link_code: None,
            client: ClientMeta::default(),
        })
        .await
        .unwrap();
    attribution.confirm_order("order-3").await.unwrap();
    assert_eq!(balance(&app, affiliate.user_id).await, 15_000);

    let service = PayoutService::new(&app.state);
    let first = service
        .request_payout(affiliate.user_id, PayoutRequest { amount: 6_000 })
        .await
        .unwrap();
    service
        .settle_payout(&admin(), first.id, settle(PayoutStatus::Completed, None))
        .await
        .unwrap();
    assert_eq!(paid_referrals(&app, affiliate.user_id).await, 1);

    // 9,000 plus the 1,000 left from the first payout covers both remaining commissions
    let second = service
        .request_payout(affiliate.user_id, PayoutRequest { amount: 9_000 })
        .await
        .unwrap();
    service
        .settle_payout(&admin(), second.id, settle(PayoutStatus::Completed, None))
        .await
        .unwrap();
    assert_eq!(paid_referrals(&app, affiliate.user_id).await, 3);
    assert_eq!(balance(&app, affiliate.user_id).await, 0);
}
