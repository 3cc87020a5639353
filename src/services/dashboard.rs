// Read-only dashboard aggregation

use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app::AppState,
    db::AffiliateStore,
    models::{
        AffiliateDashboard, AffiliateLink, AffiliatePayout, AffiliateProfile, AffiliateReferral,
        NextTier, PayoutStatus, ReferralCounts, ReferralStatus,
    },
    services::commission::CommissionSchedule,
    utils::{AffiliateError, AffiliateResult},
};

/// Conversions per hundred clicks, rounded to two decimals
pub fn conversion_rate(conversions: i64, clicks: i64) -> f64 {
    if clicks <= 0 {
        return 0.0;
    }
    let rate = conversions as f64 * 100.0 / clicks as f64;
    (rate * 100.0).round() / 100.0
}

/// Fold the affiliate's rows into dashboard figures
pub fn summarize(
    profile: AffiliateProfile,
    links: &[AffiliateLink],
    referrals: &[AffiliateReferral],
    payouts: &[AffiliatePayout],
    schedule: &CommissionSchedule,
) -> AffiliateDashboard {
    let total_clicks: i64 = links.iter().map(|l| l.clicks).sum();
    let active_links = links.iter().filter(|l| l.is_active).count() as i64;

    let mut counts = ReferralCounts::default();
    let mut pending_commission = 0;
    for referral in referrals {
        match referral.status() {
            Some(ReferralStatus::Pending) => {
                counts.pending += 1;
                pending_commission += referral.commission_amount;
            },
            Some(ReferralStatus::Completed) => counts.completed += 1,
            Some(ReferralStatus::Cancelled) => counts.cancelled += 1,
            None => {},
        }
    }

    let mut completed_payouts = 0;
    let mut pending_payouts = 0;
    for payout in payouts {
        match payout.status() {
            Some(PayoutStatus::Completed) => completed_payouts += payout.amount,
            Some(PayoutStatus::Pending) | Some(PayoutStatus::Processing) => {
                pending_payouts += payout.amount
            },
            _ => {},
        }
    }

    let total_conversions = counts.completed;
    AffiliateDashboard {
        profile,
        total_clicks,
        total_conversions,
        total_links: links.len() as i64,
        active_links,
        conversion_rate: conversion_rate(total_conversions, total_clicks),
        next_tier: schedule
            .next_tier(total_conversions)
            .map(|tier| NextTier::from_tier(tier, total_conversions)),
        referrals: counts,
        pending_commission,
        completed_payouts,
        pending_payouts,
    }
}

pub struct DashboardService {
    store: Arc<dyn AffiliateStore>,
    schedule: CommissionSchedule,
}

impl DashboardService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            schedule: CommissionSchedule::new(state.affiliate_config.commission_tiers.clone()),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_dashboard(&self, affiliate_id: Uuid) -> AffiliateResult<AffiliateDashboard> {
        let profile = self
            .store
            .find_profile(affiliate_id)
            .await?
            .ok_or_else(|| AffiliateError::NotFound("Affiliate profile".to_string()))?;

        let links = self.store.list_links(affiliate_id).await?;
        let referrals = self.store.list_referrals(affiliate_id, None).await?;
        let payouts = self.store.list_payouts(affiliate_id).await?;

        Ok(summarize(
            profile,
            &links,
            &referrals,
            &payouts,
            &self.schedule,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::commission::parse_tiers;
    use chrono::Utc;

    fn profile() -> AffiliateProfile {
        let now = Utc::now();
        AffiliateProfile {
            user_id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            full_name: None,
            status: "approved".to_string(),
            affiliate_code: Some("AB12CD34".to_string()),
            commission_rate: 5,
            total_earnings: 0,
            pending_earnings: 0,
            payment_method: "bank_transfer".to_string(),
            bank_details: None,
            applied_at: now,
            approved_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    fn link(clicks: i64, is_active: bool) -> AffiliateLink {
        let now = Utc::now();
        AffiliateLink {
            id: Uuid::new_v4(),
            affiliate_id: Uuid::new_v4(),
            product_id: "p".to_string(),
            link_code: "K3J9QX2M7P1Z".to_string(),
            url: "https://shop.test".to_string(),
            clicks,
            conversions: 0,
            commission_earned: 0,
            is_active,
            created_at: now,
            updated_at: now,
        }
    }

    fn referral(status: &str, commission: i64) -> AffiliateReferral {
        let now = Utc::now();
        AffiliateReferral {
            id: Uuid::new_v4(),
            affiliate_id: Uuid::new_v4(),
            order_id: Uuid::new_v4().to_string(),
            link_code: None,
            customer_ip: None,
            user_agent: None,
            referrer_url: None,
            commission_amount: commission,
            commission_rate: 5,
            order_total: commission * 20,
            status: status.to_string(),
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn schedule() -> CommissionSchedule {
        CommissionSchedule::new(parse_tiers("0:5,11:7,51:10").unwrap())
    }

    #[test]
    fn test_conversion_rate_rounding() {
        assert_eq!(conversion_rate(0, 0), 0.0);
        assert_eq!(conversion_rate(1, 3), 33.33);
        assert_eq!(conversion_rate(2, 3), 66.67);
        assert_eq!(conversion_rate(5, 5), 100.0);
    }

    #[test]
    fn test_zero_activity_summary() {
        let dashboard = summarize(profile(), &[], &[], &[], &schedule());
        assert_eq!(dashboard.total_clicks, 0);
        assert_eq!(dashboard.total_conversions, 0);
        assert_eq!(dashboard.referrals, ReferralCounts::default());
        assert_eq!(dashboard.conversion_rate, 0.0);
        let next = dashboard.next_tier.unwrap();
        assert_eq!(next.min_conversions, 11);
        assert_eq!(next.conversions_needed, 11);
    }

    #[test]
    fn test_summary_counts_by_status() {
        let links = vec![link(30, true), link(10, false)];
        let referrals = vec![
            referral("pending", 500),
            referral("pending", 250),
            referral("completed", 1000),
            referral("cancelled", 300),
        ];

        let dashboard = summarize(profile(), &links, &referrals, &[], &schedule());
        assert_eq!(dashboard.total_clicks, 40);
        assert_eq!(dashboard.total_links, 2);
        assert_eq!(dashboard.active_links, 1);
        assert_eq!(
            dashboard.referrals,
            ReferralCounts {
                pending: 2,
                completed: 1,
                cancelled: 1
            }
        );
        assert_eq!(dashboard.pending_commission, 750);
        assert_eq!(dashboard.conversion_rate, 2.5);
        assert_eq!(dashboard.next_tier.unwrap().conversions_needed, 10);
    }
}
