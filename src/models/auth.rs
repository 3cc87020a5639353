// Claims carried by bearer tokens from the hosted auth provider

use serde::{Deserialize, Serialize};

/// Access token claims. Only validated here, never issued.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessTokenClaims {
    /// User ID (subject), a UUID
    pub sub: String,

    pub email: Option<String>,

    /// Application role; the configured admin role unlocks moderation endpoints
    #[serde(default)]
    pub role: Option<String>,

    pub aud: String,

    pub iss: String,

    /// Issued at timestamp (Unix epoch seconds)
    pub iat: u64,

    /// Expires at timestamp (Unix epoch seconds)
    pub exp: u64,
}
