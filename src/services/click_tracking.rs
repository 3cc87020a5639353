// Click tracking for affiliate links
//
// Tracking never fails the caller: unknown codes and datastore errors both
// resolve to `false`.

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::{
    app::AppState,
    db::AffiliateStore,
    models::ClientMeta,
    utils::link_code::is_valid_code,
};

pub struct ClickTrackingService {
    store: Arc<dyn AffiliateStore>,
    link_code_length: usize,
}

impl ClickTrackingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            link_code_length: state.affiliate_config.link_code_length,
        }
    }

    /// Count a click on an active link. Returns whether a click was recorded.
    #[instrument(skip(self, meta))]
    pub async fn track_click(&self, link_code: &str, meta: ClientMeta) -> bool {
        let link_code = link_code.trim();
        if !is_valid_code(link_code, self.link_code_length) {
            debug!("Ignoring malformed link code");
            return false;
        }

        match self.store.record_click(link_code, &meta.normalized()).await {
            Ok(Some(link)) => {
                debug!("Click recorded on {} (total {})", link.link_code, link.clicks);
                true
            },
            Ok(None) => {
                debug!("Unknown or inactive link code");
                false
            },
            Err(e) => {
                warn!("Click tracking failed for {}: {}", link_code, e);
                false
            },
        }
    }
}
