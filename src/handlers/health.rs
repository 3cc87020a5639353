use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::app::AppState;

/// GET /api/v1/health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let timestamp = chrono::Utc::now().to_rfc3339();

    let (healthy, datastore) = match state.store.health_check().await {
        Ok(()) => (true, json!({ "status": "healthy", "error": null })),
        Err(e) => {
            tracing::error!("Datastore health check failed: {}", e);
            (
                false,
                json!({ "status": "unhealthy", "error": "Datastore unreachable" }),
            )
        },
    };

    let response = json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "service": "affiliate-backend",
        "timestamp": timestamp,
        "components": { "datastore": datastore }
    });

    if healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
