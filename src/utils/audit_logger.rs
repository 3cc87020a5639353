// Audit trail for affiliate lifecycle and money movements
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    AffiliateApplied,
    AffiliateApproved,
    AffiliateRejected,
    AffiliateSuspended,
    LinkCreated,
    LinkStatusChanged,
    ReferralCompleted,
    ReferralCancelled,
    PayoutRequested,
    PayoutSettled,
}

impl AuditAction {
    fn resource_type(self) -> &'static str {
        match self {
            AuditAction::AffiliateApplied
            | AuditAction::AffiliateApproved
            | AuditAction::AffiliateRejected
            | AuditAction::AffiliateSuspended => "affiliate",
            AuditAction::LinkCreated | AuditAction::LinkStatusChanged => "affiliate_link",
            AuditAction::ReferralCompleted | AuditAction::ReferralCancelled => "referral",
            AuditAction::PayoutRequested | AuditAction::PayoutSettled => "payout",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub action: AuditAction,
    /// Who performed the action. `None` for webhook-driven events.
    pub actor_id: Option<Uuid>,
    pub affiliate_id: Uuid,
    pub resource_id: Option<String>,
    pub resource_type: String,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditLog {
    pub fn new(action: AuditAction, actor_id: Option<Uuid>, affiliate_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            actor_id,
            affiliate_id,
            resource_id: None,
            resource_type: action.resource_type().to_string(),
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

pub struct AuditLogger;

impl AuditLogger {
    /// Emit one audit event as JSON on the `audit` target
    pub fn record(entry: AuditLog) {
        let json_log = serde_json::to_string(&entry).unwrap_or_else(|e| {
            warn!("Failed to serialize audit log: {}", e);
            format!("{:?}", entry)
        });

        info!(target: "audit", "{}", json_log);
    }

    pub fn log(
        action: AuditAction,
        actor_id: Option<Uuid>,
        affiliate_id: Uuid,
        resource_id: Option<String>,
        details: Option<String>,
    ) {
        let mut entry = AuditLog::new(action, actor_id, affiliate_id);
        if let Some(resource_id) = resource_id {
            entry = entry.with_resource(resource_id);
        }
        if let Some(details) = details {
            entry = entry.with_details(details);
        }
        Self::record(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_log_serializes_snake_case_action() {
        let affiliate = Uuid::new_v4();
        let entry = AuditLog::new(AuditAction::PayoutRequested, Some(affiliate), affiliate)
            .with_resource("payout-1")
            .with_details("amount=8000");

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["action"], "payout_requested");
        assert_eq!(json["resource_type"], "payout");
        assert_eq!(json["resource_id"], "payout-1");
    }
}
