// Library exports for the affiliate backend
// Exposes modules plus the router and state builders used by the binary and tests

pub mod app;
pub mod app_config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use app::AppState;
pub use app_config::{init_config, AffiliateConfig, AppConfig};
pub use db::{AffiliateStore, DieselPool, MemoryStore, PostgresStore, ProductCatalog};
pub use middleware::AuthenticatedUser;
pub use utils::{AffiliateError, AffiliateResult};

use axum::{routing::get, Router};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    db::{DieselDatabaseConfig, RetryPolicy},
    services::{AffiliateNotifier, EmailService, JwtService, LogOnlyNotifier},
    utils::RandomCodeSource,
};

/// Build the `/api/v1` router over a ready application state
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/affiliate", handlers::affiliate_routes(state.clone()))
        .nest("/admin", handlers::admin_routes(state.clone()))
        .nest("/orders", handlers::order_routes(state.clone()));

    Router::new().nest("/api/v1", api).with_state(state)
}

/// Notifier for the configured email settings; logs only when no API key is set
pub fn build_notifier(
    config: &AppConfig,
) -> Result<Arc<dyn AffiliateNotifier>, Box<dyn std::error::Error + Send + Sync>> {
    if config.email.resend_api_key.is_empty() {
        warn!("RESEND_API_KEY not set, affiliate emails will only be logged");
        return Ok(Arc::new(LogOnlyNotifier));
    }

    Ok(Arc::new(EmailService::new(config.email.clone())?))
}

/// Connect to Postgres, run migrations and wire every service dependency
pub async fn initialize_app_state(
    config: &AppConfig,
) -> Result<AppState, Box<dyn std::error::Error + Send + Sync>> {
    info!("Initializing database pool...");
    let db_config = DieselDatabaseConfig::from_app_config(config);
    let diesel_pool = db::create_diesel_pool(db_config).await?;

    migrations::run_all_migrations(config).await?;

    let store = Arc::new(PostgresStore::new(
        diesel_pool,
        RetryPolicy::with_timeout_ms(config.database_query_timeout_ms),
    ));

    Ok(AppState {
        affiliate_config: Arc::new(config.affiliate.clone()),
        jwt_service: Arc::new(JwtService::new(&config.jwt)),
        store: store.clone(),
        catalog: store,
        notifier: build_notifier(config)?,
        code_source: Arc::new(RandomCodeSource),
    })
}
