// Affiliate link generation and management

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    app::AppState,
    app_config::AffiliateConfig,
    db::{AffiliateStore, ProductCatalog, StoreError},
    models::{AffiliateLink, NewAffiliateLink, ProductRef},
    utils::{AffiliateError, AffiliateResult, AuditAction, AuditLogger, CodeSource},
};

/// `{site}/store/product/{slug-or-id}?ref={affiliate_code}&product={id}&link={link_code}`
pub fn build_link_url(
    site_url: &str,
    product: &ProductRef,
    affiliate_code: &str,
    link_code: &str,
) -> AffiliateResult<String> {
    let mut url = Url::parse(site_url)
        .map_err(|e| AffiliateError::Unavailable(format!("Invalid site URL {}: {}", site_url, e)))?;

    url.path_segments_mut()
        .map_err(|_| AffiliateError::Unavailable(format!("Site URL cannot be a base: {}", site_url)))?
        .pop_if_empty()
        .extend(["store", "product", product.path_segment()]);

    url.query_pairs_mut()
        .append_pair("ref", affiliate_code)
        .append_pair("product", &product.id)
        .append_pair("link", link_code);

    Ok(url.into())
}

pub struct LinkGeneratorService {
    store: Arc<dyn AffiliateStore>,
    catalog: Arc<dyn ProductCatalog>,
    code_source: Arc<dyn CodeSource>,
    config: Arc<AffiliateConfig>,
}

impl LinkGeneratorService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            catalog: state.catalog.clone(),
            code_source: state.code_source.clone(),
            config: state.affiliate_config.clone(),
        }
    }

    /// Create a shareable link for an approved affiliate and an active product
    #[instrument(skip(self))]
    pub async fn generate_link(
        &self,
        affiliate_id: Uuid,
        product_id: &str,
    ) -> AffiliateResult<AffiliateLink> {
        let profile = self
            .store
            .find_profile(affiliate_id)
            .await?
            .filter(|p| p.is_approved())
            .ok_or(AffiliateError::NotApproved)?;
        let affiliate_code = profile
            .affiliate_code
            .as_deref()
            .ok_or(AffiliateError::NotApproved)?;

        let product = self
            .catalog
            .find_product(product_id.trim())
            .await?
            .filter(|p| p.is_active)
            .ok_or(AffiliateError::ProductNotFound)?;

        let max_attempts = self.config.code_max_retries.max(1);
        for attempt in 1..=max_attempts {
            let link_code = self.code_source.next_code(self.config.link_code_length);

            if self.store.link_code_exists(&link_code).await? {
                warn!("Link code collision on attempt {}: {}", attempt, link_code);
                continue;
            }

            let now = Utc::now();
            let new_link = NewAffiliateLink {
                id: Uuid::new_v4(),
                affiliate_id,
                product_id: product.id.clone(),
                url: build_link_url(&self.config.site_url, &product, affiliate_code, &link_code)?,
                link_code,
                created_at: now,
                updated_at: now,
            };

            match self.store.insert_link(new_link).await {
                Ok(link) => {
                    info!(
                        "Created affiliate link {} for product {}",
                        link.link_code, link.product_id
                    );
                    AuditLogger::log(
                        AuditAction::LinkCreated,
                        Some(affiliate_id),
                        affiliate_id,
                        Some(link.id.to_string()),
                        Some(format!("product={}", link.product_id)),
                    );
                    return Ok(link);
                },
                Err(StoreError::UniqueViolation(constraint)) => {
                    warn!(
                        "Link code taken at insert on attempt {} ({})",
                        attempt, constraint
                    );
                },
                Err(e) => return Err(e.into()),
            }
        }

        error!(
            "Link code generation exhausted after {} attempts for affiliate {}",
            max_attempts, affiliate_id
        );
        Err(AffiliateError::CodeGenerationExhausted)
    }

    pub async fn list_links(&self, affiliate_id: Uuid) -> AffiliateResult<Vec<AffiliateLink>> {
        Ok(self.store.list_links(affiliate_id).await?)
    }

    /// Toggle a link owned by the caller. Reactivation requires an approved account.
    #[instrument(skip(self))]
    pub async fn set_link_active(
        &self,
        affiliate_id: Uuid,
        link_id: Uuid,
        active: bool,
    ) -> AffiliateResult<AffiliateLink> {
        if active {
            let approved = self
                .store
                .find_profile(affiliate_id)
                .await?
                .is_some_and(|p| p.is_approved());
            if !approved {
                return Err(AffiliateError::NotApproved);
            }
        }

        let link = self
            .store
            .set_link_active(affiliate_id, link_id, active)
            .await?
            .ok_or_else(|| AffiliateError::NotFound("Affiliate link".to_string()))?;

        AuditLogger::log(
            AuditAction::LinkStatusChanged,
            Some(affiliate_id),
            affiliate_id,
            Some(link.id.to_string()),
            Some(format!("is_active={}", active)),
        );

        Ok(link)
    }
}
