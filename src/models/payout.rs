use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::schema::affiliate_payouts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Processing => "processing",
            PayoutStatus::Completed => "completed",
            PayoutStatus::Failed => "failed",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PayoutStatus::Pending),
            "processing" => Some(PayoutStatus::Processing),
            "completed" => Some(PayoutStatus::Completed),
            "failed" => Some(PayoutStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = affiliate_payouts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AffiliatePayout {
    pub id: Uuid,
    pub affiliate_id: Uuid,
    pub amount: i64,
    pub payment_method: String,
    pub status: String,
    pub transaction_ref: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AffiliatePayout {
    pub fn status(&self) -> Option<PayoutStatus> {
        PayoutStatus::from_string(&self.status)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = affiliate_payouts)]
pub struct NewAffiliatePayout {
    pub id: Uuid,
    pub affiliate_id: Uuid,
    pub amount: i64,
    pub payment_method: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewAffiliatePayout {
    pub fn into_payout(self) -> AffiliatePayout {
        AffiliatePayout {
            id: self.id,
            affiliate_id: self.affiliate_id,
            amount: self.amount,
            payment_method: self.payment_method,
            status: self.status,
            transaction_ref: None,
            processed_at: None,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Status change written by settlement. `None` fields are left untouched.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = affiliate_payouts)]
pub struct PayoutStatusChange {
    pub status: String,
    pub transaction_ref: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Settlement outcome reported by the payment collaborator or an admin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutSettlement {
    Processing,
    Completed { transaction_ref: Option<String> },
    Failed,
}

impl PayoutSettlement {
    pub fn target_status(&self) -> PayoutStatus {
        match self {
            PayoutSettlement::Processing => PayoutStatus::Processing,
            PayoutSettlement::Completed { .. } => PayoutStatus::Completed,
            PayoutSettlement::Failed => PayoutStatus::Failed,
        }
    }

    /// Statuses a payout may be in for this settlement to apply
    pub fn allowed_from(&self) -> &'static [PayoutStatus] {
        match self {
            PayoutSettlement::Processing => &[PayoutStatus::Pending],
            PayoutSettlement::Completed { .. } | PayoutSettlement::Failed => {
                &[PayoutStatus::Pending, PayoutStatus::Processing]
            },
        }
    }

    pub fn change(&self, now: DateTime<Utc>) -> PayoutStatusChange {
        let (transaction_ref, processed_at) = match self {
            PayoutSettlement::Processing => (None, None),
            PayoutSettlement::Completed { transaction_ref } => (transaction_ref.clone(), Some(now)),
            PayoutSettlement::Failed => (None, Some(now)),
        };

        PayoutStatusChange {
            status: self.target_status().as_str().to_string(),
            transaction_ref,
            processed_at,
            updated_at: now,
        }
    }
}

// =============================================================================
// REQUEST MODELS
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PayoutRequest {
    #[validate(range(min = 1, message = "Payout amount must be greater than zero"))]
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SettlePayoutRequest {
    pub status: PayoutStatus,

    #[validate(length(min = 1, max = 255, message = "Transaction reference must be 1-255 characters"))]
    pub transaction_ref: Option<String>,
}

impl SettlePayoutRequest {
    /// `None` for a target status settlement cannot move to
    pub fn settlement(&self) -> Option<PayoutSettlement> {
        match self.status {
            PayoutStatus::Pending => None,
            PayoutStatus::Processing => Some(PayoutSettlement::Processing),
            PayoutStatus::Completed => Some(PayoutSettlement::Completed {
                transaction_ref: self.transaction_ref.clone(),
            }),
            PayoutStatus::Failed => Some(PayoutSettlement::Failed),
        }
    }
}
