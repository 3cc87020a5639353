// Error taxonomy for affiliate operations and its HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::warn;

use crate::db::StoreError;
use crate::models::ApiResponse;
use crate::services::commission::CommissionError;
use crate::services::jwt::JwtError;

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Error, Debug, PartialEq)]
pub enum AffiliateError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Affiliate account is not approved")]
    NotApproved,

    #[error("Product not found or inactive")]
    ProductNotFound,

    #[error("Invalid affiliate code")]
    InvalidAffiliateCode,

    #[error("Could not generate a unique code")]
    CodeGenerationExhausted,

    #[error("Order {0} is already attributed")]
    DuplicateAttribution(String),

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: i64, available: i64 },

    #[error("Amount is below the minimum payout of {minimum}")]
    BelowMinimum { minimum: i64 },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

pub type AffiliateResult<T> = Result<T, AffiliateError>;

// =============================================================================
// ERROR CONVERSIONS
// =============================================================================

impl From<StoreError> for AffiliateError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(constraint) => {
                warn!("Unique constraint violated: {}", constraint);
                AffiliateError::Conflict("Resource already exists".to_string())
            },
            other => AffiliateError::Unavailable(other.to_string()),
        }
    }
}

impl From<CommissionError> for AffiliateError {
    fn from(err: CommissionError) -> Self {
        AffiliateError::Validation(err.to_string())
    }
}

impl From<JwtError> for AffiliateError {
    fn from(_: JwtError) -> Self {
        AffiliateError::Unauthenticated
    }
}

impl From<validator::ValidationErrors> for AffiliateError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors
                    .iter()
                    .map(move |e| format!("{}: {}", field, e.message.as_ref().unwrap_or(&e.code)))
            })
            .collect();
        messages.sort();

        AffiliateError::Validation(messages.join(", "))
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

impl AffiliateError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AffiliateError::Validation(_) | AffiliateError::BelowMinimum { .. } => {
                StatusCode::BAD_REQUEST
            },

            AffiliateError::Unauthenticated => StatusCode::UNAUTHORIZED,

            AffiliateError::Forbidden(_) | AffiliateError::NotApproved => StatusCode::FORBIDDEN,

            AffiliateError::NotFound(_)
            | AffiliateError::ProductNotFound
            | AffiliateError::InvalidAffiliateCode => StatusCode::NOT_FOUND,

            AffiliateError::DuplicateAttribution(_)
            | AffiliateError::InsufficientBalance { .. }
            | AffiliateError::Conflict(_) => StatusCode::CONFLICT,

            AffiliateError::CodeGenerationExhausted | AffiliateError::Unavailable(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    /// Message safe to show to the caller
    pub fn public_message(&self) -> String {
        match self {
            AffiliateError::CodeGenerationExhausted | AffiliateError::Unavailable(_) => {
                "Internal server error".to_string()
            },
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AffiliateError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        (status, Json(ApiResponse::error(self.public_message()))).into_response()
    }
}

// =============================================================================
// TESTS
// =============================================================================
