use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::affiliate_clicks;

/// Longest stored value for any single client metadata field
const MAX_META_FIELD_LENGTH: usize = 1024;

/// Visitor metadata captured with clicks and referrals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer_url: Option<String>,
}

impl ClientMeta {
    /// Trim, drop empty values and cap field length
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().chars().take(MAX_META_FIELD_LENGTH).collect::<String>())
                .filter(|v| !v.is_empty())
        }

        Self {
            ip_address: clean(self.ip_address),
            user_agent: clean(self.user_agent),
            referrer_url: clean(self.referrer_url),
        }
    }

    /// Fill missing fields from `other`
    pub fn or(self, other: ClientMeta) -> Self {
        Self {
            ip_address: self.ip_address.or(other.ip_address),
            user_agent: self.user_agent.or(other.user_agent),
            referrer_url: self.referrer_url.or(other.referrer_url),
        }
    }
}

/// Append-only click log row
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = affiliate_clicks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ClickEvent {
    pub id: Uuid,
    pub link_id: Uuid,
    pub affiliate_id: Uuid,
    pub link_code: String,
    pub customer_ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = affiliate_clicks)]
pub struct NewClickEvent {
    pub id: Uuid,
    pub link_id: Uuid,
    pub affiliate_id: Uuid,
    pub link_code: String,
    pub customer_ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewClickEvent {
    pub fn for_link(link_id: Uuid, affiliate_id: Uuid, link_code: &str, meta: &ClientMeta) -> Self {
        Self {
            id: Uuid::new_v4(),
            link_id,
            affiliate_id,
            link_code: link_code.to_string(),
            customer_ip: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
            referrer_url: meta.referrer_url.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Public click payload. The code is checked by the tracker, never rejected here.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackClickRequest {
    #[serde(default)]
    pub link_code: String,

    #[serde(flatten)]
    pub client: ClientMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackClickResponse {
    pub tracked: bool,
}
