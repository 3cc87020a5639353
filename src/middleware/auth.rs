// Caller identity resolved from the bearer token

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::AffiliateError;

/// Authenticated user information extracted from JWT
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
    pub is_admin: bool,
}

impl AuthenticatedUser {
    pub fn require_admin(&self) -> Result<(), AffiliateError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AffiliateError::Forbidden(
                "Admin access required".to_string(),
            ))
        }
    }
}
