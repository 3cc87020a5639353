// Email Builders - one builder per affiliate notification

use chrono::{DateTime, Utc};
use handlebars::Handlebars;
use tracing::instrument;

use super::types::{
    ApplicationEmailData, ApprovalEmailData, EmailBuilder, EmailError, EmailMessage,
    PayoutEmailData, RejectionEmailData,
};
use crate::app_config::EmailConfig;

fn sender_address(config: &EmailConfig) -> String {
    format!("{} <{}>", config.from_name, config.from_email)
}

fn format_date(at: &DateTime<Utc>) -> String {
    at.format("%B %-d, %Y").to_string()
}

/// Minor units to a display amount with thousands separators, e.g. `1234567` -> `12,345.67`
pub fn format_minor_units(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    let whole = (abs / 100).to_string();
    let cents = abs % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}{}.{:02}", sign, grouped, cents)
}

fn render<T: serde::Serialize>(
    templates: &Handlebars<'_>,
    name: &str,
    data: &T,
) -> Result<String, EmailError> {
    templates
        .render(name, data)
        .map_err(|e| EmailError::TemplateError(e.to_string()))
}

/// Confirmation sent when an application is received
pub struct ApplicationReceivedEmailBuilder<'a> {
    pub to_email: &'a str,
    pub affiliate_name: &'a str,
    pub applied_at: &'a DateTime<Utc>,
    pub config: &'a EmailConfig,
    pub templates: &'a Handlebars<'a>,
}

impl<'a> EmailBuilder for ApplicationReceivedEmailBuilder<'a> {
    #[instrument(skip(self))]
    fn build(&self) -> Result<EmailMessage, EmailError> {
        let data = ApplicationEmailData {
            affiliate_name: self.affiliate_name.to_string(),
            application_date: format_date(self.applied_at),
            app_name: self.config.from_name.clone(),
            support_email: self.config.support_email.clone(),
        };

        let html = render(self.templates, "affiliate_application", &data)?;

        let text = format!(
            "Hello {},\n\n\
            Thank you for applying to the {} affiliate program. \
            Your application was received on {} and is under review.\n\n\
            You will receive another email once a decision has been made.\n\n\
            The {} Team",
            data.affiliate_name, data.app_name, data.application_date, data.app_name
        );

        Ok(EmailMessage::new(
            sender_address(self.config),
            vec![self.to_email.to_string()],
            format!("Affiliate Application Received - {}", self.config.from_name),
            html,
        )
        .with_text(text)
        .with_reply_to(self.config.support_email.clone()))
    }
}

/// Approval with the affiliate code, rate and dashboard link
pub struct ApprovalEmailBuilder<'a> {
    pub to_email: &'a str,
    pub affiliate_name: &'a str,
    pub affiliate_code: &'a str,
    pub commission_rate: i32,
    pub approved_at: &'a DateTime<Utc>,
    pub config: &'a EmailConfig,
    pub templates: &'a Handlebars<'a>,
}

impl<'a> EmailBuilder for ApprovalEmailBuilder<'a> {
    #[instrument(skip(self))]
    fn build(&self) -> Result<EmailMessage, EmailError> {
        let data = ApprovalEmailData {
            affiliate_name: self.affiliate_name.to_string(),
            affiliate_code: self.affiliate_code.to_string(),
            commission_rate: self.commission_rate,
            approval_date: format_date(self.approved_at),
            dashboard_url: self.config.dashboard_url.clone(),
            app_name: self.config.from_name.clone(),
            support_email: self.config.support_email.clone(),
        };

        let html = render(self.templates, "affiliate_approved", &data)?;

        let text = format!(
            "Hello {},\n\n\
            Your affiliate application has been approved.\n\n\
            Affiliate code: {}\n\
            Commission rate: {}%\n\n\
            Open your dashboard: {}\n\n\
            The {} Team",
            data.affiliate_name,
            data.affiliate_code,
            data.commission_rate,
            data.dashboard_url,
            data.app_name
        );

        Ok(EmailMessage::new(
            sender_address(self.config),
            vec![self.to_email.to_string()],
            "Affiliate Application Approved - Start Earning Commissions".to_string(),
            html,
        )
        .with_text(text))
    }
}

pub struct RejectionEmailBuilder<'a> {
    pub to_email: &'a str,
    pub affiliate_name: &'a str,
    pub feedback: Option<&'a str>,
    pub rejected_at: &'a DateTime<Utc>,
    pub config: &'a EmailConfig,
    pub templates: &'a Handlebars<'a>,
}

impl<'a> EmailBuilder for RejectionEmailBuilder<'a> {
    #[instrument(skip(self))]
    fn build(&self) -> Result<EmailMessage, EmailError> {
        let data = RejectionEmailData {
            affiliate_name: self.affiliate_name.to_string(),
            rejection_date: format_date(self.rejected_at),
            feedback: self.feedback.map(str::to_string),
            app_name: self.config.from_name.clone(),
            support_email: self.config.support_email.clone(),
        };

        let html = render(self.templates, "affiliate_rejected", &data)?;

        let mut text = format!(
            "Hello {},\n\n\
            Thank you for your interest in the {} affiliate program. \
            We are unable to approve your application at this time.\n\n",
            data.affiliate_name, data.app_name
        );
        if let Some(feedback) = &data.feedback {
            text.push_str(&format!("Feedback from our team:\n{}\n\n", feedback));
        }
        text.push_str(&format!("The {} Team", data.app_name));

        Ok(EmailMessage::new(
            sender_address(self.config),
            vec![self.to_email.to_string()],
            "Affiliate Application Update".to_string(),
            html,
        )
        .with_text(text)
        .with_reply_to(self.config.support_email.clone()))
    }
}

pub struct PayoutCompletedEmailBuilder<'a> {
    pub to_email: &'a str,
    pub affiliate_name: &'a str,
    pub amount: i64,
    pub transaction_ref: Option<&'a str>,
    pub paid_at: &'a DateTime<Utc>,
    pub config: &'a EmailConfig,
    pub templates: &'a Handlebars<'a>,
}

impl<'a> EmailBuilder for PayoutCompletedEmailBuilder<'a> {
    #[instrument(skip(self))]
    fn build(&self) -> Result<EmailMessage, EmailError> {
        let data = PayoutEmailData {
            affiliate_name: self.affiliate_name.to_string(),
            amount: format_minor_units(self.amount),
            payout_date: format_date(self.paid_at),
            transaction_ref: self.transaction_ref.map(str::to_string),
            app_name: self.config.from_name.clone(),
            support_email: self.config.support_email.clone(),
        };

        let html = render(self.templates, "affiliate_payout", &data)?;

        let text = format!(
            "Hello {},\n\n\
            Your affiliate payout of {} was completed on {}.\n\
            Transaction reference: {}\n\n\
            The {} Team",
            data.affiliate_name,
            data.amount,
            data.payout_date,
            data.transaction_ref.as_deref().unwrap_or("n/a"),
            data.app_name
        );

        Ok(EmailMessage::new(
            sender_address(self.config),
            vec![self.to_email.to_string()],
            format!("Your affiliate payout of {} has been sent", data.amount),
            html,
        )
        .with_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_minor_units() {
        assert_eq!(format_minor_units(0), "0.00");
        assert_eq!(format_minor_units(5), "0.05");
        assert_eq!(format_minor_units(100_000), "1,000.00");
        assert_eq!(format_minor_units(1_234_567), "12,345.67");
        assert_eq!(format_minor_units(-250), "-2.50");
    }
}
