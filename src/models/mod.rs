pub mod affiliate;
pub mod api;
pub mod auth;
pub mod click;
pub mod dashboard;
pub mod link;
pub mod payout;
pub mod referral;

// Re-export common types
pub use affiliate::{
    AdminAction, AdminActionRequest, AffiliateProfile, AffiliateStatus, ApplyRequest,
    NewAffiliateProfile, StatusFilter,
};
pub use api::ApiResponse;
pub use auth::AccessTokenClaims;
pub use click::{ClickEvent, ClientMeta, NewClickEvent, TrackClickRequest, TrackClickResponse};
pub use dashboard::{AffiliateDashboard, NextTier, ReferralCounts};
pub use link::{AffiliateLink, CreateLinkRequest, NewAffiliateLink, ProductRef, UpdateLinkRequest};
pub use payout::{
    AffiliatePayout, NewAffiliatePayout, PayoutRequest, PayoutSettlement, PayoutStatus,
    PayoutStatusChange, SettlePayoutRequest,
};
pub use referral::{
    AffiliateReferral, AttributionOutcome, AttributionRequest, NewAffiliateReferral,
    ReferralStatus,
};
