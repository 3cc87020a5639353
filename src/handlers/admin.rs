// Admin endpoints: affiliate moderation and payout settlement

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    app::AppState,
    handlers::extract::ValidatedJson,
    middleware::AuthenticatedUser,
    models::{AdminAction, AdminActionRequest, ApiResponse, SettlePayoutRequest, StatusFilter},
    services::{AffiliateService, PayoutService},
    utils::AffiliateResult,
};

/// GET /api/v1/admin/affiliates?status=
pub async fn list_affiliates(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Query(filter): Query<StatusFilter>,
) -> AffiliateResult<impl IntoResponse> {
    admin.require_admin()?;
    let profiles = AffiliateService::new(&state)
        .list_profiles(filter.status.as_deref())
        .await?;
    Ok(Json(ApiResponse::ok(profiles)))
}

/// Approve, reject or suspend an affiliate
/// POST /api/v1/admin/affiliates/{id}/action
pub async fn affiliate_action(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<AdminActionRequest>,
) -> AffiliateResult<impl IntoResponse> {
    let action = request.action;
    let profile = AffiliateService::new(&state)
        .apply_admin_action(&admin, user_id, request)
        .await?;

    let message = match action {
        AdminAction::Approve => "Affiliate approved",
        AdminAction::Reject => "Affiliate rejected",
        AdminAction::Suspend => "Affiliate suspended",
    };
    Ok(Json(ApiResponse::ok_with_message(profile, message)))
}

/// POST /api/v1/admin/payouts/{id}/settle
pub async fn settle_payout(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(payout_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<SettlePayoutRequest>,
) -> AffiliateResult<impl IntoResponse> {
    let payout = PayoutService::new(&state)
        .settle_payout(&admin, payout_id, request)
        .await?;
    Ok(Json(ApiResponse::ok(payout)))
}
