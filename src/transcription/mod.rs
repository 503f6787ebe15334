//! Speech-to-text collaborator.
//!
//! Opaque external call: audio file in, transcript text out. The pipeline
//! only sees the `Transcriber` trait; the production implementation talks
//! to the OpenAI audio transcriptions endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("Failed to read audio file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Transcription request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Transcription API returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Failed to parse transcription response: {0}")]
    InvalidResponse(String),
    #[error("Transcription provider not configured: {0}")]
    NotConfigured(String),
}

/// A completed transcription.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub text: String,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript, TranscriptionError>;
}

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
}

/// OpenAI Whisper over HTTP.
pub struct OpenAiTranscriber {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiTranscriber {
    pub fn new(api_key: String, endpoint: Option<String>, model: String) -> Self {
        let base_url = endpoint.unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        info!("Initialized OpenAI transcriber (model: {})", model);

        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model,
        }
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript, TranscriptionError> {
        info!("Transcribing audio file: {:?}", audio_path);

        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());

        let audio_data = tokio::fs::read(audio_path).await?;

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio_data).file_name(file_name),
            )
            .text("model", self.model.clone());

        debug!("Uploading audio to {}/audio/transcriptions", self.base_url);

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("Transcription API failed with status {}: {}", status, body);
            return Err(TranscriptionError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: WhisperResponse = serde_json::from_str(&body)
            .map_err(|e| TranscriptionError::InvalidResponse(e.to_string()))?;

        debug!("Transcription complete: {} chars", parsed.text.len());

        Ok(Transcript { text: parsed.text })
    }
}
