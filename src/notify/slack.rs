//! Slack message delivery via the Web API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::NotifyError;

#[async_trait]
pub trait SlackClient: Send + Sync {
    /// Post a message, returning the message timestamp.
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        blocks: Option<Value>,
    ) -> Result<String, NotifyError>;
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    ts: Option<String>,
    error: Option<String>,
}

/// `chat.postMessage` client. Fails with `NotConfigured` when no bot
/// token is present.
pub struct SlackWebApi {
    client: reqwest::Client,
    bot_token: Option<String>,
    base_url: String,
}

impl SlackWebApi {
    pub fn new(bot_token: Option<String>) -> Self {
        if bot_token.is_none() {
            info!("Slack bot token not set, Slack integrations will be skipped");
        }

        Self {
            client: reqwest::Client::new(),
            bot_token,
            base_url: "https://slack.com/api".to_string(),
        }
    }
}

#[async_trait]
impl SlackClient for SlackWebApi {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        blocks: Option<Value>,
    ) -> Result<String, NotifyError> {
        let token = self.bot_token.as_ref().ok_or_else(|| {
            NotifyError::NotConfigured("Slack bot token not provided".to_string())
        })?;

        let mut body = json!({
            "channel": channel,
            "text": text,
        });
        if let Some(blocks) = blocks {
            body["blocks"] = blocks;
        }

        debug!("Posting Slack message to channel {}", channel);

        let response = self
            .client
            .post(format!("{}/chat.postMessage", self.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let parsed: PostMessageResponse = response
            .json()
            .await
            .map_err(|e| NotifyError::Slack(format!("Invalid response: {}", e)))?;

        if !parsed.ok {
            return Err(NotifyError::Slack(
                parsed.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        Ok(parsed.ts.unwrap_or_default())
    }
}
