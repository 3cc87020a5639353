// Payout requests and settlement

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    db::{AffiliateStore, PayoutReservation, Transition},
    middleware::AuthenticatedUser,
    models::{
        AffiliatePayout, NewAffiliatePayout, PayoutRequest, PayoutSettlement, PayoutStatus,
        SettlePayoutRequest,
    },
    services::email::{notify_best_effort, AffiliateNotification, AffiliateNotifier},
    utils::{AffiliateError, AffiliateResult, AuditAction, AuditLogger},
};

pub struct PayoutService {
    store: Arc<dyn AffiliateStore>,
    notifier: Arc<dyn AffiliateNotifier>,
    minimum_payout: i64,
}

impl PayoutService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            notifier: state.notifier.clone(),
            minimum_payout: state.affiliate_config.minimum_payout,
        }
    }

    /// Reserve `amount` out of the affiliate's pending earnings as a pending payout.
    /// Not retried: a reservation either commits once or leaves the balance untouched.
    #[instrument(skip(self, request), fields(amount = request.amount))]
    pub async fn request_payout(
        &self,
        affiliate_id: Uuid,
        request: PayoutRequest,
    ) -> AffiliateResult<AffiliatePayout> {
        request.validate()?;
        if request.amount < self.minimum_payout {
            return Err(AffiliateError::BelowMinimum {
                minimum: self.minimum_payout,
            });
        }

        let profile = self
            .store
            .find_profile(affiliate_id)
            .await?
            .ok_or_else(|| AffiliateError::NotFound("Affiliate profile".to_string()))?;

        let now = Utc::now();
        let new_payout = NewAffiliatePayout {
            id: Uuid::new_v4(),
            affiliate_id,
            amount: request.amount,
            payment_method: profile.payment_method,
            status: PayoutStatus::Pending.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };

        match self.store.reserve_payout(new_payout).await? {
            PayoutReservation::Reserved(payout) => {
                info!(
                    "Payout {} of {} requested by {}",
                    payout.id, payout.amount, affiliate_id
                );
                AuditLogger::log(
                    AuditAction::PayoutRequested,
                    Some(affiliate_id),
                    affiliate_id,
                    Some(payout.id.to_string()),
                    Some(format!("amount={}", payout.amount)),
                );
                Ok(payout)
            },
            PayoutReservation::InsufficientBalance { available } => {
                warn!(
                    "Payout of {} rejected for {}: only {} available",
                    request.amount, affiliate_id, available
                );
                Err(AffiliateError::InsufficientBalance {
                    requested: request.amount,
                    available,
                })
            },
            PayoutReservation::ProfileNotFound => {
                Err(AffiliateError::NotFound("Affiliate profile".to_string()))
            },
        }
    }

    /// Apply a settlement outcome reported by an admin or the payment processor
    #[instrument(skip(self, actor, request), fields(status = request.status.as_str()))]
    pub async fn settle_payout(
        &self,
        actor: &AuthenticatedUser,
        payout_id: Uuid,
        request: SettlePayoutRequest,
    ) -> AffiliateResult<AffiliatePayout> {
        actor.require_admin()?;
        request.validate()?;

        let settlement = request.settlement().ok_or_else(|| {
            AffiliateError::Validation("A payout cannot be moved back to pending".to_string())
        })?;

        let payout = match self.store.settle_payout(payout_id, &settlement, Utc::now()).await? {
            Transition::Applied(payout) => payout,
            Transition::Unchanged(payout) => return Ok(payout),
            Transition::Rejected(payout) => {
                return Err(AffiliateError::Conflict(format!(
                    "Cannot move payout from {} to {}",
                    payout.status,
                    settlement.target_status().as_str()
                )));
            },
            Transition::NotFound => return Err(AffiliateError::NotFound("Payout".to_string())),
        };

        info!("Payout {} settled as {}", payout.id, payout.status);
        AuditLogger::log(
            AuditAction::PayoutSettled,
            Some(actor.user_id),
            payout.affiliate_id,
            Some(payout.id.to_string()),
            Some(format!("status={}", payout.status)),
        );

        if let PayoutSettlement::Completed { .. } = settlement {
            self.notify_completed(&payout).await;
        }

        Ok(payout)
    }

    pub async fn list_payouts(&self, affiliate_id: Uuid) -> AffiliateResult<Vec<AffiliatePayout>> {
        Ok(self.store.list_payouts(affiliate_id).await?)
    }

    async fn notify_completed(&self, payout: &AffiliatePayout) {
        let profile = match self.store.find_profile(payout.affiliate_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => return,
            Err(e) => {
                warn!("Could not load affiliate for payout email: {}", e);
                return;
            },
        };

        notify_best_effort(
            self.notifier.as_ref(),
            AffiliateNotification::PayoutCompleted {
                email: profile.email.clone(),
                name: profile.display_name().to_string(),
                amount: payout.amount,
                transaction_ref: payout.transaction_ref.clone(),
                paid_at: payout.processed_at.unwrap_or(payout.updated_at),
            },
        )
        .await;
    }
}
