// Referral (conversion) model and the order webhook payloads

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::click::ClientMeta;
use crate::schema::affiliate_referrals;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferralStatus {
    Pending,
    Completed,
    Cancelled,
}

impl ReferralStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralStatus::Pending => "pending",
            ReferralStatus::Completed => "completed",
            ReferralStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReferralStatus::Pending),
            "completed" => Some(ReferralStatus::Completed),
            "cancelled" => Some(ReferralStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = affiliate_referrals)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AffiliateReferral {
    pub id: Uuid,
    pub affiliate_id: Uuid,
    pub order_id: String,
    pub link_code: Option<String>,
    pub customer_ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer_url: Option<String>,
    pub commission_amount: i64,
    pub commission_rate: i32,
    pub order_total: i64,
    pub status: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AffiliateReferral {
    pub fn status(&self) -> Option<ReferralStatus> {
        ReferralStatus::from_string(&self.status)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = affiliate_referrals)]
pub struct NewAffiliateReferral {
    pub id: Uuid,
    pub affiliate_id: Uuid,
    pub order_id: String,
    pub link_code: Option<String>,
    pub customer_ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer_url: Option<String>,
    pub commission_amount: i64,
    pub commission_rate: i32,
    pub order_total: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewAffiliateReferral {
    pub fn into_referral(self) -> AffiliateReferral {
        AffiliateReferral {
            id: self.id,
            affiliate_id: self.affiliate_id,
            order_id: self.order_id,
            link_code: self.link_code,
            customer_ip: self.customer_ip,
            user_agent: self.user_agent,
            referrer_url: self.referrer_url,
            commission_amount: self.commission_amount,
            commission_rate: self.commission_rate,
            order_total: self.order_total,
            status: self.status,
            paid_at: None,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// =============================================================================
// WEBHOOK PAYLOADS
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AttributionRequest {
    #[validate(length(min = 1, max = 100, message = "Order ID is required"))]
    pub order_id: String,

    #[validate(length(min = 1, max = 32, message = "Affiliate code is required"))]
    pub affiliate_code: String,

    #[validate(range(min = 0, message = "Order total must not be negative"))]
    pub order_total: i64,

    #[validate(length(min = 1, max = 32, message = "Link code must be 1-32 characters"))]
    pub link_code: Option<String>,

    #[serde(flatten)]
    pub client: ClientMeta,
}

/// Result of the best-effort attribution entry point
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttributionOutcome {
    Attributed { referral: AffiliateReferral },
    AlreadyAttributed { order_id: String },
    Skipped { reason: String },
}
