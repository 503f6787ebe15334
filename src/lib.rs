pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod global;
pub mod meeting;
pub mod notify;
pub mod summarization;
pub mod transcription;
