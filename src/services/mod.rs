// Services module for the affiliate backend
// Business logic layer between the handlers and the store

pub mod affiliate;
pub mod attribution;
pub mod click_tracking;
pub mod commission;
pub mod dashboard;
pub mod email;
pub mod jwt;
pub mod link_generator;
pub mod payout;

// Re-export commonly used services
pub use affiliate::AffiliateService;
pub use attribution::AttributionService;
pub use click_tracking::ClickTrackingService;
pub use commission::{compute_commission, CommissionSchedule, CommissionTier};
pub use dashboard::DashboardService;
pub use email::{AffiliateNotification, AffiliateNotifier, EmailError, EmailService, LogOnlyNotifier};
pub use jwt::{JwtError, JwtService};
pub use link_generator::LinkGeneratorService;
pub use payout::PayoutService;
