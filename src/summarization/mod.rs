//! Transcript summarization collaborator.
//!
//! Sends the transcript to a chat-completion model asking for a
//! JSON-structured summary, then normalizes whatever comes back: the
//! model occasionally returns a list where a string was requested, or
//! non-text entries inside the lists, and none of that may leak into the
//! persisted record.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

const FALLBACK_SUMMARY: &str = "No summary available";

/// Placeholder produced by stringifying a non-text object upstream;
/// treated the same as a non-string entry.
const OBJECT_PLACEHOLDER: &str = "[object Object]";

const SYSTEM_PROMPT: &str = "You are an expert meeting summarizer. Analyze the meeting \
transcription and provide a structured summary in JSON format with the following fields:\n\
- summary: A concise bullet-point summary of the main topics discussed\n\
- keyDecisions: An array of key decisions made during the meeting\n\
- actionItems: An array of specific action items with assignees if mentioned\n\n\
Respond with valid JSON only.";

#[derive(Debug, Error)]
pub enum SummarizationError {
    #[error("Summarization request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Summarization API returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Failed to parse summarization response: {0}")]
    InvalidResponse(String),
    #[error("Summarization provider not configured: {0}")]
    NotConfigured(String),
}

/// Normalized summarization output.
#[derive(Debug, Clone, PartialEq)]
pub struct MeetingSummary {
    pub summary: String,
    pub key_decisions: Vec<String>,
    pub action_items: Vec<String>,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, transcript: &str) -> Result<MeetingSummary, SummarizationError>;
}

/// Coerce the model's JSON payload into a `MeetingSummary`.
///
/// A non-string `summary` is discarded in favor of a fixed fallback;
/// list fields keep only genuine text entries.
pub fn normalize_summary(payload: &Value) -> MeetingSummary {
    let summary = match payload.get("summary") {
        Some(Value::String(text)) if !text.is_empty() => text.clone(),
        Some(other) if !other.is_null() => {
            warn!("Discarding non-string summary payload: {}", other);
            FALLBACK_SUMMARY.to_string()
        }
        _ => FALLBACK_SUMMARY.to_string(),
    };

    MeetingSummary {
        summary,
        key_decisions: string_entries(payload.get("keyDecisions")),
        action_items: string_entries(payload.get("actionItems")),
    }
}

fn string_entries(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(text) if text != OBJECT_PLACEHOLDER => Some(text.clone()),
            _ => None,
        })
        .collect()
}

// --- OpenAI chat completions wire types ---

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat<'a>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    r#type: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// OpenAI chat-completion summarizer.
pub struct OpenAiSummarizer {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiSummarizer {
    pub fn new(api_key: String, endpoint: Option<String>, model: String) -> Self {
        let base_url = endpoint.unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        info!("Initialized OpenAI summarizer (model: {})", model);

        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model,
        }
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, transcript: &str) -> Result<MeetingSummary, SummarizationError> {
        info!("Summarizing transcript ({} chars)", transcript.len());

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!(
                        "Please analyze this meeting transcription and provide a structured summary:\n\n{}",
                        transcript
                    ),
                },
            ],
            response_format: ResponseFormat {
                r#type: "json_object",
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("Summarization API failed with status {}: {}", status, body);
            return Err(SummarizationError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| SummarizationError::InvalidResponse(e.to_string()))?;

        let content = parsed
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .unwrap_or("{}");

        let payload: Value = serde_json::from_str(content)
            .map_err(|e| SummarizationError::InvalidResponse(e.to_string()))?;

        debug!("Summarization response parsed, normalizing");

        Ok(normalize_summary(&payload))
    }
}
