//! Service wiring.
//!
//! Builds the collaborators from configuration, injects them into the
//! pipeline, and runs the API server. Collaborators are constructed once
//! here and passed down as trait objects, never reached for as globals.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::api::ApiServer;
use crate::config::Config;
use crate::db::Db;
use crate::meeting::{Notifier, Pipeline};
use crate::notify::{SlackWebApi, SmtpEmailClient};
use crate::summarization::OpenAiSummarizer;
use crate::transcription::OpenAiTranscriber;

pub async fn run_service() -> Result<()> {
    info!("Starting recap service");

    let config = Config::load()?;
    let db = Db::open()?;

    let uploads_dir = crate::global::uploads_dir()?;
    std::fs::create_dir_all(&uploads_dir).context("Failed to create uploads directory")?;

    let api_key = config
        .openai
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .context("OpenAI API key must be set (config [openai].api_key or OPENAI_API_KEY)")?;

    let transcriber = Arc::new(OpenAiTranscriber::new(
        api_key.clone(),
        config.openai.api_endpoint.clone(),
        config.openai.transcription_model.clone(),
    ));

    let summarizer = Arc::new(OpenAiSummarizer::new(
        api_key,
        config.openai.api_endpoint.clone(),
        config.openai.summary_model.clone(),
    ));

    let slack = Arc::new(SlackWebApi::new(
        config
            .slack
            .bot_token
            .clone()
            .or_else(|| std::env::var("SLACK_BOT_TOKEN").ok()),
    ));
    let email = Arc::new(SmtpEmailClient::new(&config.email)?);
    let notifier = Arc::new(Notifier::new(slack, email));

    let pipeline = Arc::new(Pipeline::new(db.clone(), transcriber, summarizer, notifier));

    info!("recap is ready, uploads land in {:?}", uploads_dir);

    let api_server = ApiServer::new(db, pipeline, config.server.port);
    api_server.start().await
}
