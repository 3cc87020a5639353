// Affiliate link model and storefront product reference

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::schema::{affiliate_links, products};

// =============================================================================
// DATABASE MODELS
// =============================================================================

/// Shareable product link owned by one affiliate
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = affiliate_links)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AffiliateLink {
    pub id: Uuid,
    pub affiliate_id: Uuid,
    pub product_id: String,
    pub link_code: String,
    pub url: String,
    pub clicks: i64,
    pub conversions: i64,
    pub commission_earned: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = affiliate_links)]
pub struct NewAffiliateLink {
    pub id: Uuid,
    pub affiliate_id: Uuid,
    pub product_id: String,
    pub link_code: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewAffiliateLink {
    pub fn into_link(self) -> AffiliateLink {
        AffiliateLink {
            id: self.id,
            affiliate_id: self.affiliate_id,
            product_id: self.product_id,
            link_code: self.link_code,
            url: self.url,
            clicks: 0,
            conversions: 0,
            commission_earned: 0,
            is_active: true,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Read-only view of a storefront product
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductRef {
    pub id: String,
    pub name: String,
    pub slug: Option<String>,
    pub is_active: bool,
}

impl ProductRef {
    /// Path segment used in storefront URLs
    pub fn path_segment(&self) -> &str {
        match self.slug.as_deref() {
            Some(slug) if !slug.is_empty() => slug,
            _ => &self.id,
        }
    }
}

// =============================================================================
// REQUEST MODELS
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateLinkRequest {
    #[validate(length(min = 1, max = 100, message = "Product ID must be 1-100 characters"))]
    pub product_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateLinkRequest {
    pub is_active: bool,
}
