// Application state shared across handlers
use std::sync::Arc;

use crate::{
    app_config::AffiliateConfig,
    db::{AffiliateStore, ProductCatalog},
    services::{email::AffiliateNotifier, JwtService},
    utils::CodeSource,
};

#[derive(Clone)]
pub struct AppState {
    pub affiliate_config: Arc<AffiliateConfig>,
    pub jwt_service: Arc<JwtService>,
    pub store: Arc<dyn AffiliateStore>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub notifier: Arc<dyn AffiliateNotifier>,
    pub code_source: Arc<dyn CodeSource>,
}
