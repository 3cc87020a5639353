// Affiliate-facing endpoints: application, links, tracking, referrals, payouts, dashboard

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    app::AppState,
    handlers::extract::ValidatedJson,
    middleware::AuthenticatedUser,
    models::{
        ApiResponse, ApplyRequest, ClientMeta, CreateLinkRequest, PayoutRequest, StatusFilter,
        TrackClickRequest, TrackClickResponse, UpdateLinkRequest,
    },
    services::{
        AffiliateService, AttributionService, ClickTrackingService, DashboardService,
        LinkGeneratorService, PayoutService,
    },
    utils::AffiliateResult,
};

/// Client metadata from request headers, used where the body carries none
pub fn client_meta_from_headers(headers: &HeaderMap) -> ClientMeta {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let ip_address = header_value("x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        .or_else(|| header_value("x-real-ip"));

    ClientMeta {
        ip_address,
        user_agent: header_value(header::USER_AGENT.as_str()),
        referrer_url: header_value(header::REFERER.as_str()),
    }
}

/// Submit an affiliate application
/// POST /api/v1/affiliate/apply
pub async fn apply(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<ApplyRequest>,
) -> AffiliateResult<impl IntoResponse> {
    let profile = AffiliateService::new(&state).apply(&user, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(
            profile,
            "Application submitted for review",
        )),
    ))
}

/// GET /api/v1/affiliate/profile
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AffiliateResult<impl IntoResponse> {
    let profile = AffiliateService::new(&state).get_profile(user.user_id).await?;
    Ok(Json(ApiResponse::ok(profile)))
}

/// GET /api/v1/affiliate/links
pub async fn list_links(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AffiliateResult<impl IntoResponse> {
    let links = LinkGeneratorService::new(&state).list_links(user.user_id).await?;
    Ok(Json(ApiResponse::ok(links)))
}

/// Generate a shareable link for a product
/// POST /api/v1/affiliate/links
pub async fn create_link(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<CreateLinkRequest>,
) -> AffiliateResult<impl IntoResponse> {
    let link = LinkGeneratorService::new(&state)
        .generate_link(user.user_id, &request.product_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(link, "Affiliate link created")),
    ))
}

/// Activate or deactivate one of the caller's links
/// PATCH /api/v1/affiliate/links/{id}
pub async fn update_link(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(link_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateLinkRequest>,
) -> AffiliateResult<impl IntoResponse> {
    let link = LinkGeneratorService::new(&state)
        .set_link_active(user.user_id, link_id, request.is_active)
        .await?;
    Ok(Json(ApiResponse::ok(link)))
}

/// Record a click. Public, and always answers 200 with `tracked`,
/// including for unreadable bodies.
/// POST /api/v1/affiliate/track
pub async fn track_click(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<TrackClickRequest>, JsonRejection>,
) -> impl IntoResponse {
    let tracked = match payload {
        Ok(Json(request)) => {
            let meta = request.client.or(client_meta_from_headers(&headers));
            ClickTrackingService::new(&state)
                .track_click(&request.link_code, meta)
                .await
        },
        Err(rejection) => {
            debug!("Ignoring unreadable click payload: {}", rejection.body_text());
            false
        },
    };

    Json(ApiResponse::ok(TrackClickResponse { tracked }))
}

/// GET /api/v1/affiliate/referrals?status=
pub async fn list_referrals(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(filter): Query<StatusFilter>,
) -> AffiliateResult<impl IntoResponse> {
    let referrals = AttributionService::new(&state)
        .list_referrals(user.user_id, filter.status.as_deref())
        .await?;
    Ok(Json(ApiResponse::ok(referrals)))
}

/// Request a payout from pending earnings
/// POST /api/v1/affiliate/payout
pub async fn request_payout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<PayoutRequest>,
) -> AffiliateResult<impl IntoResponse> {
    let payout = PayoutService::new(&state)
        .request_payout(user.user_id, request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(
            payout,
            "Payout request submitted",
        )),
    ))
}

/// GET /api/v1/affiliate/payouts
pub async fn list_payouts(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AffiliateResult<impl IntoResponse> {
    let payouts = PayoutService::new(&state).list_payouts(user.user_id).await?;
    Ok(Json(ApiResponse::ok(payouts)))
}

/// GET /api/v1/affiliate/dashboard
pub async fn get_dashboard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AffiliateResult<impl IntoResponse> {
    let dashboard = DashboardService::new(&state)
        .get_dashboard(user.user_id)
        .await?;
    Ok(Json(ApiResponse::ok(dashboard)))
}
