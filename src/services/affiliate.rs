// Affiliate application and moderation lifecycle

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    app_config::AffiliateConfig,
    db::{AffiliateStore, ApplicationOutcome, StoreError, Transition},
    middleware::AuthenticatedUser,
    models::{
        AdminAction, AdminActionRequest, AffiliateProfile, AffiliateStatus, ApplyRequest,
        NewAffiliateProfile,
    },
    services::{
        commission::CommissionSchedule,
        email::{notify_best_effort, AffiliateNotification, AffiliateNotifier},
    },
    utils::{AffiliateError, AffiliateResult, AuditAction, AuditLogger, CodeSource},
};

pub struct AffiliateService {
    store: Arc<dyn AffiliateStore>,
    notifier: Arc<dyn AffiliateNotifier>,
    code_source: Arc<dyn CodeSource>,
    config: Arc<AffiliateConfig>,
    schedule: CommissionSchedule,
}

/// Parse an optional `?status=` filter value
pub fn parse_affiliate_status(raw: Option<&str>) -> AffiliateResult<Option<AffiliateStatus>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => AffiliateStatus::from_string(&s.to_lowercase())
            .map(Some)
            .ok_or_else(|| AffiliateError::Validation(format!("Unknown affiliate status: {}", s))),
    }
}

fn transition_conflict(profile: &AffiliateProfile, action: &str) -> AffiliateError {
    AffiliateError::Conflict(format!(
        "Cannot {} an affiliate whose status is {}",
        action, profile.status
    ))
}

impl AffiliateService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            notifier: state.notifier.clone(),
            code_source: state.code_source.clone(),
            config: state.affiliate_config.clone(),
            schedule: CommissionSchedule::new(state.affiliate_config.commission_tiers.clone()),
        }
    }

    /// Submit (or resubmit after rejection) an affiliate application
    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn apply(
        &self,
        user: &AuthenticatedUser,
        mut request: ApplyRequest,
    ) -> AffiliateResult<AffiliateProfile> {
        request.sanitize();
        request.validate()?;

        let email = user.email.trim();
        if email.is_empty() {
            return Err(AffiliateError::Validation(
                "Account has no email address".to_string(),
            ));
        }

        let now = Utc::now();
        let new_profile = NewAffiliateProfile {
            user_id: user.user_id,
            email: email.to_string(),
            full_name: request.full_name,
            status: AffiliateStatus::Pending.as_str().to_string(),
            commission_rate: self.schedule.base_rate(),
            payment_method: request.payment_method,
            bank_details: request.bank_details,
            applied_at: now,
            created_at: now,
            updated_at: now,
        };

        let profile = match self.store.create_application(new_profile).await? {
            ApplicationOutcome::Created(profile) => profile,
            ApplicationOutcome::Reapplied(profile) => {
                info!("Rejected affiliate {} re-applied", profile.user_id);
                profile
            },
            ApplicationOutcome::Exists(profile) => {
                return Err(AffiliateError::Conflict(format!(
                    "An affiliate application already exists with status {}",
                    profile.status
                )));
            },
        };

        AuditLogger::log(
            AuditAction::AffiliateApplied,
            Some(user.user_id),
            profile.user_id,
            None,
            None,
        );

        notify_best_effort(
            self.notifier.as_ref(),
            AffiliateNotification::ApplicationReceived {
                email: profile.email.clone(),
                name: profile.display_name().to_string(),
                applied_at: profile.applied_at,
            },
        )
        .await;

        Ok(profile)
    }

    pub async fn get_profile(&self, user_id: Uuid) -> AffiliateResult<AffiliateProfile> {
        self.store
            .find_profile(user_id)
            .await?
            .ok_or_else(|| AffiliateError::NotFound("Affiliate profile".to_string()))
    }

    pub async fn list_profiles(&self, status: Option<&str>) -> AffiliateResult<Vec<AffiliateProfile>> {
        let status = parse_affiliate_status(status)?;
        Ok(self.store.list_profiles(status).await?)
    }

    /// Route an admin moderation request to the matching transition
    pub async fn apply_admin_action(
        &self,
        admin: &AuthenticatedUser,
        user_id: Uuid,
        mut request: AdminActionRequest,
    ) -> AffiliateResult<AffiliateProfile> {
        admin.require_admin()?;
        request.validate()?;
        request.reason = request
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        match request.action {
            AdminAction::Approve => self.approve(Some(admin.user_id), user_id).await,
            AdminAction::Reject => {
                self.reject(Some(admin.user_id), user_id, request.reason)
                    .await
            },
            AdminAction::Suspend => {
                self.suspend(Some(admin.user_id), user_id, request.reason)
                    .await
            },
        }
    }

    /// Pending or suspended -> approved, minting a fresh affiliate code
    #[instrument(skip(self))]
    pub async fn approve(
        &self,
        actor_id: Option<Uuid>,
        user_id: Uuid,
    ) -> AffiliateResult<AffiliateProfile> {
        let max_attempts = self.config.code_max_retries.max(1);

        for attempt in 1..=max_attempts {
            let code = self.code_source.next_code(self.config.affiliate_code_length);

            if self.store.affiliate_code_exists(&code).await? {
                warn!("Affiliate code collision on attempt {}: {}", attempt, code);
                continue;
            }

            let profile = match self.store.approve_profile(user_id, &code, Utc::now()).await {
                Ok(Transition::Applied(profile)) => profile,
                Ok(Transition::Unchanged(profile)) | Ok(Transition::Rejected(profile)) => {
                    return Err(transition_conflict(&profile, "approve"));
                },
                Ok(Transition::NotFound) => {
                    return Err(AffiliateError::NotFound("Affiliate profile".to_string()));
                },
                Err(StoreError::UniqueViolation(constraint)) => {
                    warn!(
                        "Affiliate code taken at insert on attempt {} ({})",
                        attempt, constraint
                    );
                    continue;
                },
                Err(e) => return Err(e.into()),
            };

            info!(
                "Approved affiliate {} with code {}",
                profile.user_id,
                profile.affiliate_code.as_deref().unwrap_or_default()
            );
            AuditLogger::log(
                AuditAction::AffiliateApproved,
                actor_id,
                profile.user_id,
                profile.affiliate_code.clone(),
                None,
            );

            notify_best_effort(
                self.notifier.as_ref(),
                AffiliateNotification::ApplicationApproved {
                    email: profile.email.clone(),
                    name: profile.display_name().to_string(),
                    affiliate_code: code,
                    commission_rate: profile.commission_rate,
                    approved_at: profile.approved_at.unwrap_or(profile.updated_at),
                },
            )
            .await;

            return Ok(profile);
        }

        error!(
            "Affiliate code generation exhausted after {} attempts for {}",
            max_attempts, user_id
        );
        Err(AffiliateError::CodeGenerationExhausted)
    }

    /// Pending -> rejected with optional feedback for the applicant
    #[instrument(skip(self, feedback))]
    pub async fn reject(
        &self,
        actor_id: Option<Uuid>,
        user_id: Uuid,
        feedback: Option<String>,
    ) -> AffiliateResult<AffiliateProfile> {
        let profile = match self.store.reject_profile(user_id, Utc::now()).await? {
            Transition::Applied(profile) => profile,
            Transition::Unchanged(profile) | Transition::Rejected(profile) => {
                return Err(transition_conflict(&profile, "reject"));
            },
            Transition::NotFound => {
                return Err(AffiliateError::NotFound("Affiliate profile".to_string()));
            },
        };

        AuditLogger::log(
            AuditAction::AffiliateRejected,
            actor_id,
            profile.user_id,
            None,
            feedback.clone(),
        );

        notify_best_effort(
            self.notifier.as_ref(),
            AffiliateNotification::ApplicationRejected {
                email: profile.email.clone(),
                name: profile.display_name().to_string(),
                feedback,
                rejected_at: profile.updated_at,
            },
        )
        .await;

        Ok(profile)
    }

    /// Approved -> suspended. The code is revoked and every link deactivated.
    #[instrument(skip(self, reason))]
    pub async fn suspend(
        &self,
        actor_id: Option<Uuid>,
        user_id: Uuid,
        reason: Option<String>,
    ) -> AffiliateResult<AffiliateProfile> {
        let profile = match self.store.suspend_profile(user_id, Utc::now()).await? {
            Transition::Applied(profile) => profile,
            Transition::Unchanged(profile) | Transition::Rejected(profile) => {
                return Err(transition_conflict(&profile, "suspend"));
            },
            Transition::NotFound => {
                return Err(AffiliateError::NotFound("Affiliate profile".to_string()));
            },
        };

        warn!("Suspended affiliate {}", profile.user_id);
        AuditLogger::log(
            AuditAction::AffiliateSuspended,
            actor_id,
            profile.user_id,
            None,
            reason,
        );

        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_affiliate_status() {
        assert_eq!(parse_affiliate_status(None).unwrap(), None);
        assert_eq!(parse_affiliate_status(Some("  ")).unwrap(), None);
        assert_eq!(
            parse_affiliate_status(Some("Approved")).unwrap(),
            Some(AffiliateStatus::Approved)
        );
        assert!(matches!(
            parse_affiliate_status(Some("archived")),
            Err(AffiliateError::Validation(_))
        ));
    }
}
