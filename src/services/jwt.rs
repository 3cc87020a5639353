// Bearer token validation for tokens minted by the hosted auth provider

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use thiserror::Error;
use uuid::Uuid;

use crate::app_config::JwtConfig;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::AccessTokenClaims;

#[derive(Error, Debug, PartialEq)]
pub enum JwtError {
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token subject is not a valid user id")]
    InvalidSubject,

    #[error("JWT decoding error: {0}")]
    DecodingError(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer => JwtError::InvalidToken,
            _ => JwtError::DecodingError(err.to_string()),
        }
    }
}

pub struct JwtService {
    decoding_key: DecodingKey,
    validation: Validation,
    admin_role: String,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[config.audience.clone()]);
        validation.set_issuer(&[config.issuer.clone()]);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = 0;

        Self {
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            admin_role: config.admin_role.clone(),
        }
    }

    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, JwtError> {
        let token_data = decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    /// Validate a token and resolve the caller identity
    pub fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, JwtError> {
        let claims = self.validate_access_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| JwtError::InvalidSubject)?;
        let role = claims.role.unwrap_or_default();

        Ok(AuthenticatedUser {
            user_id,
            email: claims.email.unwrap_or_default(),
            is_admin: !role.is_empty() && role == self.admin_role,
            role,
        })
    }
}
