use serde::Serialize;

use crate::models::affiliate::AffiliateProfile;
use crate::services::commission::CommissionTier;

/// Referral counts by status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferralCounts {
    pub pending: i64,
    pub completed: i64,
    pub cancelled: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NextTier {
    pub min_conversions: i64,
    pub rate: i32,
    /// Completed referrals still needed to reach the tier
    pub conversions_needed: i64,
}

impl NextTier {
    pub fn from_tier(tier: CommissionTier, completed: i64) -> Self {
        Self {
            min_conversions: tier.min_conversions,
            rate: tier.rate,
            conversions_needed: (tier.min_conversions - completed).max(0),
        }
    }
}

/// Aggregated view shown on the affiliate dashboard
#[derive(Debug, Clone, Serialize)]
pub struct AffiliateDashboard {
    pub profile: AffiliateProfile,
    pub total_clicks: i64,
    pub total_conversions: i64,
    pub total_links: i64,
    pub active_links: i64,
    pub referrals: ReferralCounts,
    /// Commission on referrals that have not completed yet
    pub pending_commission: i64,
    pub completed_payouts: i64,
    pub pending_payouts: i64,
    /// Percentage with two decimals
    pub conversion_rate: f64,
    pub next_tier: Option<NextTier>,
}
