//! Outbound notification collaborators (Slack Web API, SMTP email).

pub mod email;
pub mod slack;

use thiserror::Error;

pub use email::{EmailClient, SmtpEmailClient};
pub use slack::{SlackClient, SlackWebApi};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Slack API error: {0}")]
    Slack(String),
    #[error("Email delivery failed: {0}")]
    Email(String),
    #[error("Delivery not configured: {0}")]
    NotConfigured(String),
}
