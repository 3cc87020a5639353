// Email Service Types - Shared types and structures for email module

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during email operations
#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Failed to send email: {0}")]
    SendError(String),

    #[error("Template rendering error: {0}")]
    TemplateError(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Generic email message structure that can be sent
#[derive(Debug, Clone, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub text: Option<String>,
    pub reply_to: Option<String>,
}

impl EmailMessage {
    pub fn new(from: String, to: Vec<String>, subject: String, html: String) -> Self {
        Self {
            from,
            to,
            subject,
            html,
            text: None,
            reply_to: None,
        }
    }

    pub fn with_text(mut self, text: String) -> Self {
        self.text = Some(text);
        self
    }

    pub fn with_reply_to(mut self, reply_to: String) -> Self {
        self.reply_to = Some(reply_to);
        self
    }
}

/// Trait that all email builders must implement
pub trait EmailBuilder {
    fn build(&self) -> Result<EmailMessage, EmailError>;
}

#[derive(Serialize)]
pub struct ApplicationEmailData {
    pub affiliate_name: String,
    pub application_date: String,
    pub app_name: String,
    pub support_email: String,
}

#[derive(Serialize)]
pub struct ApprovalEmailData {
    pub affiliate_name: String,
    pub affiliate_code: String,
    pub commission_rate: i32,
    pub approval_date: String,
    pub dashboard_url: String,
    pub app_name: String,
    pub support_email: String,
}

#[derive(Serialize)]
pub struct RejectionEmailData {
    pub affiliate_name: String,
    pub rejection_date: String,
    pub feedback: Option<String>,
    pub app_name: String,
    pub support_email: String,
}

#[derive(Serialize)]
pub struct PayoutEmailData {
    pub affiliate_name: String,
    /// Display amount in major units
    pub amount: String,
    pub payout_date: String,
    pub transaction_ref: Option<String>,
    pub app_name: String,
    pub support_email: String,
}

/// Resend API payload. Optional fields are omitted when `None`.
#[derive(Debug, Serialize)]
pub struct ResendEmailPayload {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl From<EmailMessage> for ResendEmailPayload {
    fn from(message: EmailMessage) -> Self {
        Self {
            from: message.from,
            to: message.to,
            subject: message.subject,
            html: message.html,
            text: message.text,
            reply_to: message.reply_to,
        }
    }
}
