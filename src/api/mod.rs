//! REST API server for recap.
//!
//! Provides HTTP endpoints for:
//! - Meeting upload intake and status polling
//! - Meeting listing, search, and deletion
//! - Integration (Slack/email) configuration

pub mod error;
pub mod routes;

use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;

use crate::db::Db;
use crate::meeting::Pipeline;

pub use routes::integrations::IntegrationState;
pub use routes::meetings::MeetingState;

pub struct ApiServer {
    port: u16,
    meeting_state: MeetingState,
    integration_state: IntegrationState,
}

impl ApiServer {
    pub fn new(db: Db, pipeline: Arc<Pipeline>, port: u16) -> Self {
        Self {
            port,
            meeting_state: MeetingState {
                db: db.clone(),
                pipeline,
            },
            integration_state: IntegrationState { db },
        }
    }

    pub async fn start(self) -> Result<()> {
        let app = Router::new()
            .route("/", get(status))
            .route("/version", get(version))
            .merge(routes::meetings::router(self.meeting_state))
            .merge(routes::integrations::router(self.integration_state))
            .layer(ServiceBuilder::new());

        let listener = tokio::net::TcpListener::bind(&format!("127.0.0.1:{}", self.port)).await?;

        info!("API server listening on http://127.0.0.1:{}", self.port);
        info!("Endpoints:");
        info!("  GET    /                 - Service info");
        info!("  GET    /version          - Version info");
        info!("  POST   /meetings         - Create meeting, start processing");
        info!("  GET    /meetings         - List meetings (?search=)");
        info!("  GET    /meetings/:id     - Get meeting (poll for status)");
        info!("  DELETE /meetings/:id     - Delete meeting");
        info!("  GET    /integrations     - List integrations");
        info!("  POST   /integrations     - Create integration");
        info!("  PUT    /integrations/:id - Update integration");
        info!("  DELETE /integrations/:id - Delete integration");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "recap",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "recap"
    }))
}
