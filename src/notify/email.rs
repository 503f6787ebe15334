//! Email delivery over SMTP.

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};

use super::NotifyError;
use crate::config::EmailConfig;

#[async_trait]
pub trait EmailClient: Send + Sync {
    async fn send(
        &self,
        to: &[String],
        subject: &str,
        html: &str,
        text: Option<&str>,
    ) -> Result<(), NotifyError>;
}

/// SMTP sender. When credentials are missing it logs a warning and
/// no-ops instead of failing, so a half-configured install still
/// completes its pipelines.
pub struct SmtpEmailClient {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<String>,
}

impl SmtpEmailClient {
    pub fn new(config: &EmailConfig) -> anyhow::Result<Self> {
        let (transport, from) = match (&config.smtp_user, &config.smtp_pass) {
            (Some(user), Some(pass)) => {
                let transport =
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                        .port(config.smtp_port)
                        .credentials(Credentials::new(user.clone(), pass.clone()))
                        .build();
                let from = config.smtp_from.clone().or_else(|| Some(user.clone()));
                (Some(transport), from)
            }
            _ => {
                info!("SMTP credentials not set, email integrations will be skipped");
                (None, None)
            }
        };

        Ok(Self { transport, from })
    }
}

/// Strip tags for the plain-text alternative body.
fn strip_html(html: &str) -> String {
    let tags = regex::Regex::new(r"<[^>]*>").expect("static regex");
    tags.replace_all(html, "").to_string()
}

#[async_trait]
impl EmailClient for SmtpEmailClient {
    async fn send(
        &self,
        to: &[String],
        subject: &str,
        html: &str,
        text: Option<&str>,
    ) -> Result<(), NotifyError> {
        let Some(transport) = &self.transport else {
            warn!("Email not configured - SMTP credentials not provided");
            return Ok(());
        };

        let from: Mailbox = self
            .from
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(|e| NotifyError::Email(format!("Invalid from address: {}", e)))?;

        let mut builder = Message::builder().from(from).subject(subject);
        for recipient in to {
            let mailbox: Mailbox = recipient
                .parse()
                .map_err(|e| NotifyError::Email(format!("Invalid recipient {}: {}", recipient, e)))?;
            builder = builder.to(mailbox);
        }

        let plain = text.map(str::to_string).unwrap_or_else(|| strip_html(html));

        let message = builder
            .multipart(MultiPart::alternative_plain_html(plain, html.to_string()))
            .map_err(|e| NotifyError::Email(format!("Failed to build message: {}", e)))?;

        transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Email(e.to_string()))?;

        info!("Email sent to {} recipient(s)", to.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html() {
        let html = "<h2>Standup</h2><p><strong>Date:</strong> today</p>";
        assert_eq!(strip_html(html), "StandupDate: today");
    }

    #[tokio::test]
    async fn test_send_without_credentials_is_noop() {
        let client = SmtpEmailClient::new(&EmailConfig::default()).unwrap();
        let result = client
            .send(&["team@example.com".to_string()], "Subject", "<p>hi</p>", None)
            .await;
        assert!(result.is_ok());
    }
}
