// Storage seam for the affiliate pipeline
//
// Every mutating method is a single logical transaction. Counter and balance
// changes are applied atomically by the implementation, never read-modify-write
// in the service layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AffiliateLink, AffiliatePayout, AffiliateProfile, AffiliateReferral, AffiliateStatus,
    ClientMeta, NewAffiliateLink, NewAffiliatePayout, NewAffiliateProfile, NewAffiliateReferral,
    PayoutSettlement, ProductRef, ReferralStatus,
};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Datastore operation timed out")]
    Timeout,

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Failures worth one more attempt for idempotent reads
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Pool(_) | StoreError::Timeout | StoreError::ConnectionLost(_)
        )
    }
}

impl From<diesel::result::Error> for StoreError {
    fn from(error: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};

        match error {
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::UniqueViolation(info.message().to_string())
            },
            Error::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
                StoreError::ConnectionLost(info.message().to_string())
            },
            Error::BrokenTransactionManager => {
                StoreError::ConnectionLost("broken transaction manager".to_string())
            },
            other => StoreError::Database(other.to_string()),
        }
    }
}

impl From<bb8::RunError<diesel_async::pooled_connection::PoolError>> for StoreError {
    fn from(error: bb8::RunError<diesel_async::pooled_connection::PoolError>) -> Self {
        match error {
            bb8::RunError::TimedOut => StoreError::Pool("checkout timed out".to_string()),
            bb8::RunError::User(e) => StoreError::Pool(e.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// OUTCOMES
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ApplicationOutcome {
    Created(AffiliateProfile),
    /// A rejected profile moved back to pending
    Reapplied(AffiliateProfile),
    /// A profile already exists in a state that blocks applying
    Exists(AffiliateProfile),
}

/// Result of a conditional state change
#[derive(Debug, Clone, PartialEq)]
pub enum Transition<T> {
    Applied(T),
    /// Already in the target state
    Unchanged(T),
    /// Current state does not allow the change
    Rejected(T),
    NotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PayoutReservation {
    Reserved(AffiliatePayout),
    InsufficientBalance { available: i64 },
    ProfileNotFound,
}

// =============================================================================
// TRAITS
// =============================================================================

#[async_trait]
pub trait AffiliateStore: Send + Sync {
    // Profiles
    async fn create_application(&self, new: NewAffiliateProfile) -> StoreResult<ApplicationOutcome>;
    async fn find_profile(&self, user_id: Uuid) -> StoreResult<Option<AffiliateProfile>>;
    async fn find_approved_by_code(&self, code: &str) -> StoreResult<Option<AffiliateProfile>>;
    async fn affiliate_code_exists(&self, code: &str) -> StoreResult<bool>;
    async fn list_profiles(
        &self,
        status: Option<AffiliateStatus>,
    ) -> StoreResult<Vec<AffiliateProfile>>;
    /// Pending or suspended -> approved with the given code
    async fn approve_profile(
        &self,
        user_id: Uuid,
        affiliate_code: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition<AffiliateProfile>>;
    /// Pending -> rejected
    async fn reject_profile(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition<AffiliateProfile>>;
    /// Approved -> suspended, clearing the code and deactivating every link
    async fn suspend_profile(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition<AffiliateProfile>>;
    async fn update_commission_rate(&self, user_id: Uuid, rate: i32) -> StoreResult<()>;

    // Links
    async fn link_code_exists(&self, code: &str) -> StoreResult<bool>;
    async fn insert_link(&self, new: NewAffiliateLink) -> StoreResult<AffiliateLink>;
    async fn list_links(&self, affiliate_id: Uuid) -> StoreResult<Vec<AffiliateLink>>;
    async fn set_link_active(
        &self,
        affiliate_id: Uuid,
        link_id: Uuid,
        active: bool,
    ) -> StoreResult<Option<AffiliateLink>>;
    /// Increment clicks on an active link and append the click event.
    /// `None` when the code is unknown or inactive.
    async fn record_click(
        &self,
        link_code: &str,
        meta: &ClientMeta,
    ) -> StoreResult<Option<AffiliateLink>>;

    // Referrals
    /// Insert a pending referral and stamp the order. `None` when the order is
    /// already attributed.
    async fn insert_referral(
        &self,
        new: NewAffiliateReferral,
        affiliate_code: &str,
    ) -> StoreResult<Option<AffiliateReferral>>;
    /// Pending -> completed, crediting balances and link counters
    async fn complete_referral(
        &self,
        order_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition<AffiliateReferral>>;
    /// Pending -> cancelled
    async fn cancel_referral(
        &self,
        order_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition<AffiliateReferral>>;
    async fn list_referrals(
        &self,
        affiliate_id: Uuid,
        status: Option<ReferralStatus>,
    ) -> StoreResult<Vec<AffiliateReferral>>;
    async fn count_completed_referrals(&self, affiliate_id: Uuid) -> StoreResult<i64>;

    // Payouts
    /// Conditionally decrement `pending_earnings` and insert the payout
    async fn reserve_payout(&self, new: NewAffiliatePayout) -> StoreResult<PayoutReservation>;
    async fn settle_payout(
        &self,
        payout_id: Uuid,
        settlement: &PayoutSettlement,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition<AffiliatePayout>>;
    async fn list_payouts(&self, affiliate_id: Uuid) -> StoreResult<Vec<AffiliatePayout>>;

    async fn health_check(&self) -> StoreResult<()>;
}

/// Read access to the storefront catalog
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn find_product(&self, product_id: &str) -> StoreResult<Option<ProductRef>>;
}
