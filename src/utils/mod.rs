// Utility modules for the affiliate backend

pub mod affiliate_errors;
pub mod audit_logger;
pub mod link_code;

pub use affiliate_errors::{AffiliateError, AffiliateResult};
pub use audit_logger::{AuditAction, AuditLog, AuditLogger};
pub use link_code::{CodeSource, RandomCodeSource};
