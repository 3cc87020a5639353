// Shared-secret authentication for order lifecycle webhooks

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::{app::AppState, utils::AffiliateError};

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Constant-time comparison of the presented secret against the configured one
pub fn secret_matches(presented: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

pub async fn webhook_auth_middleware(
    State(app_state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    if !secret_matches(presented, &app_state.affiliate_config.order_webhook_secret) {
        tracing::warn!(path = %request.uri().path(), "Rejected webhook with bad secret");
        return AffiliateError::Unauthenticated.into_response();
    }

    next.run(request).await
}
