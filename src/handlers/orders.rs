// Order lifecycle webhooks from the commerce collaborator

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use crate::{
    app::AppState,
    models::{ApiResponse, AttributionRequest},
    services::AttributionService,
    utils::{AffiliateError, AffiliateResult},
};

/// Attribute an order to an affiliate. Best-effort: answers 200 with the outcome
/// for anything but a malformed payload.
/// POST /api/v1/orders/attribution
pub async fn attribution(
    State(state): State<AppState>,
    payload: Result<Json<AttributionRequest>, axum::extract::rejection::JsonRejection>,
) -> AffiliateResult<impl IntoResponse> {
    let Json(request) =
        payload.map_err(|rejection| AffiliateError::Validation(rejection.body_text()))?;

    let outcome = AttributionService::new(&state)
        .attribute_best_effort(request)
        .await;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// POST /api/v1/orders/{id}/confirmed
pub async fn order_confirmed(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> AffiliateResult<impl IntoResponse> {
    let referral = AttributionService::new(&state)
        .confirm_order(&order_id)
        .await?;
    Ok(Json(ApiResponse::ok(referral)))
}

/// POST /api/v1/orders/{id}/cancelled
pub async fn order_cancelled(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> AffiliateResult<impl IntoResponse> {
    let referral = AttributionService::new(&state)
        .cancel_order(&order_id)
        .await?;
    Ok(Json(ApiResponse::ok(referral)))
}
