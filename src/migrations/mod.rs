// Embedded schema migrations, applied at startup unless disabled

pub mod diesel;

use std::error::Error;
use tracing::{error, info};

use crate::app_config::AppConfig;

/// Apply pending migrations for the configured database
pub async fn run_all_migrations(config: &AppConfig) -> Result<(), Box<dyn Error + Send + Sync>> {
    if !should_run_migrations(config) {
        info!("[MIGRATIONS] Skipping embedded migrations (disabled in config)");
        return Ok(());
    }

    info!(
        "[MIGRATIONS] Starting migration process for environment: {}",
        config.environment
    );

    match diesel::run_migrations(config.database_url.clone()).await {
        Ok(0) => info!("[MIGRATIONS] Diesel migrations up to date"),
        Ok(applied) => info!("[MIGRATIONS] Applied {} Diesel migrations", applied),
        Err(e) => {
            error!("[MIGRATIONS] Diesel migration failed: {}", e);
            return Err(format!("Diesel migration failed: {}", e).into());
        },
    }

    Ok(())
}

pub fn should_run_migrations(config: &AppConfig) -> bool {
    !config.disable_embedded_migrations
}
