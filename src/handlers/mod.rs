// HTTP handlers and route builders

pub mod admin;
pub mod affiliate;
pub mod extract;
pub mod health;
pub mod orders;

use crate::{
    app::AppState,
    middleware::{auth_middleware, webhook_auth_middleware},
};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};

/// Routes for the signed-in affiliate, plus the public click tracker
pub fn affiliate_routes(state: AppState) -> Router<AppState> {
    let authenticated = Router::new()
        .route("/apply", post(affiliate::apply))
        .route("/profile", get(affiliate::get_profile))
        .route("/links", get(affiliate::list_links).post(affiliate::create_link))
        .route("/links/{id}", patch(affiliate::update_link))
        .route("/referrals", get(affiliate::list_referrals))
        .route("/payout", post(affiliate::request_payout))
        .route("/payouts", get(affiliate::list_payouts))
        .route("/dashboard", get(affiliate::get_dashboard))
        .route_layer(from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/track", post(affiliate::track_click))
        .merge(authenticated)
}

// Admin routes; handlers check the admin role
pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/affiliates", get(admin::list_affiliates))
        .route("/affiliates/{id}/action", post(admin::affiliate_action))
        .route("/payouts/{id}/settle", post(admin::settle_payout))
        .route_layer(from_fn_with_state(state, auth_middleware))
}

// Order lifecycle webhooks, authenticated with the shared secret
pub fn order_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/attribution", post(orders::attribution))
        .route("/{id}/confirmed", post(orders::order_confirmed))
        .route("/{id}/cancelled", post(orders::order_cancelled))
        .route_layer(from_fn_with_state(state, webhook_auth_middleware))
}
