// Referral attribution, order lifecycle signals and tier re-evaluation

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    db::{AffiliateStore, Transition},
    models::{
        AffiliateReferral, AttributionOutcome, AttributionRequest, NewAffiliateReferral,
        ReferralStatus,
    },
    services::commission::{compute_commission, CommissionSchedule},
    utils::{
        link_code::is_plausible_code, AffiliateError, AffiliateResult, AuditAction, AuditLogger,
    },
};

/// Parse an optional `?status=` filter value
pub fn parse_referral_status(raw: Option<&str>) -> AffiliateResult<Option<ReferralStatus>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => ReferralStatus::from_string(&s.to_lowercase())
            .map(Some)
            .ok_or_else(|| AffiliateError::Validation(format!("Unknown referral status: {}", s))),
    }
}

fn referral_conflict(referral: &AffiliateReferral, action: &str) -> AffiliateError {
    AffiliateError::Conflict(format!(
        "Cannot {} order {}: referral is {}",
        action, referral.order_id, referral.status
    ))
}

pub struct AttributionService {
    store: Arc<dyn AffiliateStore>,
    schedule: CommissionSchedule,
}

impl AttributionService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            schedule: CommissionSchedule::new(state.affiliate_config.commission_tiers.clone()),
        }
    }

    /// Attribute an order to the affiliate owning `affiliate_code`.
    /// Each order is attributed at most once.
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn attribute_referral(
        &self,
        request: AttributionRequest,
    ) -> AffiliateResult<AffiliateReferral> {
        request.validate()?;

        let order_id = request.order_id.trim().to_string();
        if order_id.is_empty() {
            return Err(AffiliateError::Validation("Order ID is required".to_string()));
        }

        let affiliate_code = request.affiliate_code.trim().to_uppercase();
        if !is_plausible_code(&affiliate_code) {
            return Err(AffiliateError::InvalidAffiliateCode);
        }

        let affiliate = self
            .store
            .find_approved_by_code(&affiliate_code)
            .await?
            .ok_or(AffiliateError::InvalidAffiliateCode)?;

        let rate = affiliate.commission_rate;
        let commission_amount = compute_commission(request.order_total, rate)?;

        let link_code = request
            .link_code
            .map(|c| c.trim().to_uppercase())
            .filter(|c| is_plausible_code(c));
        let client = request.client.normalized();

        let now = Utc::now();
        let new_referral = NewAffiliateReferral {
            id: Uuid::new_v4(),
            affiliate_id: affiliate.user_id,
            order_id: order_id.clone(),
            link_code,
            customer_ip: client.ip_address,
            user_agent: client.user_agent,
            referrer_url: client.referrer_url,
            commission_amount,
            commission_rate: rate,
            order_total: request.order_total,
            status: ReferralStatus::Pending.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };

        match self.store.insert_referral(new_referral, &affiliate_code).await? {
            Some(referral) => {
                info!(
                    "Attributed order {} to affiliate {}: commission {} at {}%",
                    referral.order_id, referral.affiliate_id, referral.commission_amount, rate
                );
                Ok(referral)
            },
            None => {
                info!("Order {} already attributed", order_id);
                Err(AffiliateError::DuplicateAttribution(order_id))
            },
        }
    }

    /// Webhook entry point: attribution problems never fail the checkout
    pub async fn attribute_best_effort(&self, request: AttributionRequest) -> AttributionOutcome {
        let order_id = request.order_id.clone();

        match self.attribute_referral(request).await {
            Ok(referral) => AttributionOutcome::Attributed { referral },
            Err(AffiliateError::DuplicateAttribution(order_id)) => {
                AttributionOutcome::AlreadyAttributed { order_id }
            },
            Err(e) => {
                if e.status_code().is_server_error() {
                    error!("Attribution for order {} failed: {}", order_id, e);
                } else {
                    warn!("Attribution for order {} skipped: {}", order_id, e);
                }
                AttributionOutcome::Skipped {
                    reason: e.public_message(),
                }
            },
        }
    }

    /// Order paid: pending -> completed, crediting the affiliate
    #[instrument(skip(self))]
    pub async fn confirm_order(&self, order_id: &str) -> AffiliateResult<AffiliateReferral> {
        let referral = match self.store.complete_referral(order_id.trim(), Utc::now()).await? {
            Transition::Applied(referral) => referral,
            Transition::Unchanged(referral) => return Ok(referral),
            Transition::Rejected(referral) => return Err(referral_conflict(&referral, "confirm")),
            Transition::NotFound => return Err(AffiliateError::NotFound("Referral".to_string())),
        };

        info!(
            "Referral for order {} completed, credited {} to {}",
            referral.order_id, referral.commission_amount, referral.affiliate_id
        );
        AuditLogger::log(
            AuditAction::ReferralCompleted,
            None,
            referral.affiliate_id,
            Some(referral.order_id.clone()),
            Some(format!("commission={}", referral.commission_amount)),
        );

        if let Err(e) = self.reevaluate_tier(referral.affiliate_id).await {
            warn!(
                "Tier re-evaluation failed for affiliate {}: {}",
                referral.affiliate_id, e
            );
        }

        Ok(referral)
    }

    /// Order refunded or voided before completion: pending -> cancelled
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: &str) -> AffiliateResult<AffiliateReferral> {
        let referral = match self.store.cancel_referral(order_id.trim(), Utc::now()).await? {
            Transition::Applied(referral) => referral,
            Transition::Unchanged(referral) => return Ok(referral),
            Transition::Rejected(referral) => return Err(referral_conflict(&referral, "cancel")),
            Transition::NotFound => return Err(AffiliateError::NotFound("Referral".to_string())),
        };

        AuditLogger::log(
            AuditAction::ReferralCancelled,
            None,
            referral.affiliate_id,
            Some(referral.order_id.clone()),
            None,
        );

        Ok(referral)
    }

    pub async fn list_referrals(
        &self,
        affiliate_id: Uuid,
        status: Option<&str>,
    ) -> AffiliateResult<Vec<AffiliateReferral>> {
        let status = parse_referral_status(status)?;
        Ok(self.store.list_referrals(affiliate_id, status).await?)
    }

    /// Move the affiliate to the tier matching its completed conversions.
    /// Existing referrals keep their snapshot rate.
    async fn reevaluate_tier(&self, affiliate_id: Uuid) -> AffiliateResult<()> {
        let Some(profile) = self.store.find_profile(affiliate_id).await? else {
            return Ok(());
        };

        let completed = self.store.count_completed_referrals(affiliate_id).await?;
        let rate = self.schedule.rate_for(completed);
        if rate != profile.commission_rate {
            info!(
                "Affiliate {} reached {} conversions, rate {}% -> {}%",
                affiliate_id, completed, profile.commission_rate, rate
            );
            self.store.update_commission_rate(affiliate_id, rate).await?;
        }

        Ok(())
    }
}
