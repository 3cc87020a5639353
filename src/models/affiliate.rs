// Affiliate profile model and the application / moderation requests

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

use crate::schema::affiliate_profiles;

// =============================================================================
// STATUS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AffiliateStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
}

impl AffiliateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AffiliateStatus::Pending => "pending",
            AffiliateStatus::Approved => "approved",
            AffiliateStatus::Rejected => "rejected",
            AffiliateStatus::Suspended => "suspended",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AffiliateStatus::Pending),
            "approved" => Some(AffiliateStatus::Approved),
            "rejected" => Some(AffiliateStatus::Rejected),
            "suspended" => Some(AffiliateStatus::Suspended),
            _ => None,
        }
    }
}

impl std::fmt::Display for AffiliateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// DATABASE MODELS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = affiliate_profiles, primary_key(user_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AffiliateProfile {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub status: String,
    pub affiliate_code: Option<String>,
    pub commission_rate: i32,
    pub total_earnings: i64,
    pub pending_earnings: i64,
    pub payment_method: String,
    pub bank_details: Option<JsonValue>,
    pub applied_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AffiliateProfile {
    pub fn status(&self) -> Option<AffiliateStatus> {
        AffiliateStatus::from_string(&self.status)
    }

    /// Approved with a usable code
    pub fn is_approved(&self) -> bool {
        self.status() == Some(AffiliateStatus::Approved) && self.affiliate_code.is_some()
    }

    /// Name used in notifications; falls back to the email local part
    pub fn display_name(&self) -> &str {
        match self.full_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.email.split('@').next().unwrap_or(&self.email),
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = affiliate_profiles)]
pub struct NewAffiliateProfile {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub status: String,
    pub commission_rate: i32,
    pub payment_method: String,
    pub bank_details: Option<JsonValue>,
    pub applied_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewAffiliateProfile {
    /// Profile row as first stored: pending, no code, zero balances
    pub fn into_profile(self) -> AffiliateProfile {
        AffiliateProfile {
            user_id: self.user_id,
            email: self.email,
            full_name: self.full_name,
            status: self.status,
            affiliate_code: None,
            commission_rate: self.commission_rate,
            total_earnings: 0,
            pending_earnings: 0,
            payment_method: self.payment_method,
            bank_details: self.bank_details,
            applied_at: self.applied_at,
            approved_at: None,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// =============================================================================
// REQUEST MODELS
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ApplyRequest {
    #[validate(length(min = 1, max = 255, message = "Full name must be 1-255 characters"))]
    pub full_name: Option<String>,

    #[validate(length(min = 1, max = 50, message = "Payment method is required"))]
    pub payment_method: String,

    /// Opaque payout destination details, stored as given
    pub bank_details: Option<JsonValue>,
}

impl ApplyRequest {
    pub fn sanitize(&mut self) {
        self.payment_method = self.payment_method.trim().to_string();
        self.full_name = self
            .full_name
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminAction {
    Approve,
    Reject,
    Suspend,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdminActionRequest {
    pub action: AdminAction,

    #[validate(length(max = 1000, message = "Reason must be less than 1000 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}
