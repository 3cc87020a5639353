// Email Service Module - affiliate notifications
// Orchestrates template builders and the HTTP sender

pub mod builders;
pub mod sender;
pub mod types;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use handlebars::Handlebars;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use self::builders::{
    ApplicationReceivedEmailBuilder, ApprovalEmailBuilder, PayoutCompletedEmailBuilder,
    RejectionEmailBuilder,
};
use self::sender::EmailSender;
use self::types::EmailBuilder;
use crate::app_config::EmailConfig;

pub use types::{EmailError, EmailMessage};

/// Notifications sent to affiliates
#[derive(Debug, Clone, PartialEq)]
pub enum AffiliateNotification {
    ApplicationReceived {
        email: String,
        name: String,
        applied_at: DateTime<Utc>,
    },
    ApplicationApproved {
        email: String,
        name: String,
        affiliate_code: String,
        commission_rate: i32,
        approved_at: DateTime<Utc>,
    },
    ApplicationRejected {
        email: String,
        name: String,
        feedback: Option<String>,
        rejected_at: DateTime<Utc>,
    },
    PayoutCompleted {
        email: String,
        name: String,
        amount: i64,
        transaction_ref: Option<String>,
        paid_at: DateTime<Utc>,
    },
}

impl AffiliateNotification {
    pub fn recipient(&self) -> &str {
        match self {
            AffiliateNotification::ApplicationReceived { email, .. }
            | AffiliateNotification::ApplicationApproved { email, .. }
            | AffiliateNotification::ApplicationRejected { email, .. }
            | AffiliateNotification::PayoutCompleted { email, .. } => email,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AffiliateNotification::ApplicationReceived { .. } => "application_received",
            AffiliateNotification::ApplicationApproved { .. } => "application_approved",
            AffiliateNotification::ApplicationRejected { .. } => "application_rejected",
            AffiliateNotification::PayoutCompleted { .. } => "payout_completed",
        }
    }
}

/// Delivery seam for affiliate notifications. Callers treat failures as non-fatal.
#[async_trait]
pub trait AffiliateNotifier: Send + Sync {
    async fn notify(&self, notification: AffiliateNotification) -> Result<(), EmailError>;
}

/// Deliver a notification, logging failures instead of propagating them
pub async fn notify_best_effort(
    notifier: &dyn AffiliateNotifier,
    notification: AffiliateNotification,
) {
    let kind = notification.kind();
    let recipient = notification.recipient().to_string();
    if let Err(e) = notifier.notify(notification).await {
        error!("Failed to send {} email to {}: {}", kind, recipient, e);
    }
}

/// Email service for affiliate notifications
#[derive(Clone)]
pub struct EmailService {
    sender: EmailSender,
    config: EmailConfig,
    templates: Arc<Handlebars<'static>>,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        if config.resend_api_key.is_empty() {
            return Err(EmailError::ConfigError(
                "RESEND_API_KEY is not set".to_string(),
            ));
        }

        let mut templates = Handlebars::new();
        Self::register_templates(&mut templates)?;

        let sender =
            EmailSender::new_resend(config.resend_api_key.clone(), config.resend_api_url.clone())
                .with_max_retries(config.max_retries)
                .with_retry_delay(Duration::from_secs(1));

        Ok(Self {
            sender,
            config,
            templates: Arc::new(templates),
        })
    }

    fn register_templates(templates: &mut Handlebars) -> Result<(), EmailError> {
        let sources = [
            (
                "affiliate_application",
                include_str!("../../templates/email/affiliate_application.html"),
            ),
            (
                "affiliate_approved",
                include_str!("../../templates/email/affiliate_approved.html"),
            ),
            (
                "affiliate_rejected",
                include_str!("../../templates/email/affiliate_rejected.html"),
            ),
            (
                "affiliate_payout",
                include_str!("../../templates/email/affiliate_payout.html"),
            ),
        ];

        for (name, source) in sources {
            templates
                .register_template_string(name, source)
                .map_err(|e| EmailError::TemplateError(e.to_string()))?;
        }

        Ok(())
    }

    /// Render a notification into a ready-to-send message
    pub fn compose(&self, notification: &AffiliateNotification) -> Result<EmailMessage, EmailError> {
        let config = &self.config;
        let templates = self.templates.as_ref();

        match notification {
            AffiliateNotification::ApplicationReceived {
                email,
                name,
                applied_at,
            } => ApplicationReceivedEmailBuilder {
                to_email: email,
                affiliate_name: name,
                applied_at,
                config,
                templates,
            }
            .build(),
            AffiliateNotification::ApplicationApproved {
                email,
                name,
                affiliate_code,
                commission_rate,
                approved_at,
            } => ApprovalEmailBuilder {
                to_email: email,
                affiliate_name: name,
                affiliate_code,
                commission_rate: *commission_rate,
                approved_at,
                config,
                templates,
            }
            .build(),
            AffiliateNotification::ApplicationRejected {
                email,
                name,
                feedback,
                rejected_at,
            } => RejectionEmailBuilder {
                to_email: email,
                affiliate_name: name,
                feedback: feedback.as_deref(),
                rejected_at,
                config,
                templates,
            }
            .build(),
            AffiliateNotification::PayoutCompleted {
                email,
                name,
                amount,
                transaction_ref,
                paid_at,
            } => PayoutCompletedEmailBuilder {
                to_email: email,
                affiliate_name: name,
                amount: *amount,
                transaction_ref: transaction_ref.as_deref(),
                paid_at,
                config,
                templates,
            }
            .build(),
        }
    }
}

#[async_trait]
impl AffiliateNotifier for EmailService {
    #[instrument(skip(self, notification), fields(kind = notification.kind()))]
    async fn notify(&self, notification: AffiliateNotification) -> Result<(), EmailError> {
        let recipient = notification.recipient();
        if !recipient.contains('@') {
            return Err(EmailError::InvalidEmail(recipient.to_string()));
        }

        info!("Sending {} email to {}", notification.kind(), recipient);
        let message = self.compose(&notification)?;
        self.sender.send_with_retry(message).await
    }
}

/// Used when no email API key is configured: notifications are only logged
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyNotifier;

#[async_trait]
impl AffiliateNotifier for LogOnlyNotifier {
    async fn notify(&self, notification: AffiliateNotification) -> Result<(), EmailError> {
        warn!(
            kind = notification.kind(),
            recipient = notification.recipient(),
            "Email delivery not configured, notification dropped"
        );
        Ok(())
    }
}
