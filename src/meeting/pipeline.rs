//! Upload-processing pipeline.
//!
//! Drives one meeting from `uploading` to a terminal state:
//! transcribe → summarize → notify → cleanup, persisting the status at
//! every step. Collaborators are injected via constructor — no concrete
//! types hardcoded — so the whole machine runs against fakes in tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::db::{Db, IntegrationRepository, MeetingRepository};
use crate::meeting::notify::Notifier;
use crate::meeting::status::MeetingStatus;
use crate::summarization::Summarizer;
use crate::transcription::Transcriber;

/// Per-meeting locks. Serializes double-invocation of `process` for the
/// same meeting id; distinct meetings stay independent.
#[derive(Clone, Default)]
pub struct PipelineLocks {
    inner: Arc<StdMutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl PipelineLocks {
    pub fn for_meeting(&self, meeting_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.inner.lock().expect("lock map poisoned");
        locks
            .entry(meeting_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

pub struct Pipeline {
    db: Db,
    transcriber: Arc<dyn Transcriber>,
    summarizer: Arc<dyn Summarizer>,
    notifier: Arc<Notifier>,
    locks: PipelineLocks,
}

impl Pipeline {
    pub fn new(
        db: Db,
        transcriber: Arc<dyn Transcriber>,
        summarizer: Arc<dyn Summarizer>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            db,
            transcriber,
            summarizer,
            notifier,
            locks: PipelineLocks::default(),
        }
    }

    /// Run the full pipeline for one uploaded meeting.
    ///
    /// Spawned as a detached task by the upload route; the HTTP response
    /// does not wait for it. Clients observe progress by polling the
    /// persisted status.
    pub async fn process(&self, meeting_id: i64, owner_id: &str, audio_path: PathBuf) {
        let lock = self.locks.for_meeting(meeting_id);
        let _guard = lock.lock().await;

        // Terminal statuses never change; a second invocation against an
        // already-finished meeting is a no-op.
        match self
            .db
            .with(|conn| MeetingRepository::get(conn, meeting_id, owner_id))
            .await
        {
            Ok(Some(meeting)) if meeting.status.is_terminal() => {
                warn!(
                    "Meeting {}: already {}, skipping pipeline run",
                    meeting_id, meeting.status
                );
                return;
            }
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!("Meeting {}: not found for owner, skipping pipeline run", meeting_id);
                return;
            }
            Err(e) => {
                error!("Meeting {}: failed to load before processing: {:#}", meeting_id, e);
                return;
            }
        }

        info!("Meeting {}: processing started ({:?})", meeting_id, audio_path);

        // Phase: transcribing
        if let Err(e) = self
            .db
            .with(|conn| MeetingRepository::set_status(conn, meeting_id, MeetingStatus::Transcribing))
            .await
        {
            error!("Meeting {}: failed to persist transcribing status: {:#}", meeting_id, e);
            self.mark_failed(meeting_id).await;
            return;
        }

        let transcript = match self.transcriber.transcribe(&audio_path).await {
            Ok(transcript) => transcript,
            Err(e) => {
                // Audio file is retained for diagnosis on failure.
                error!("Meeting {}: transcription failed: {}", meeting_id, e);
                self.mark_failed(meeting_id).await;
                return;
            }
        };

        // Phase: summarizing (transcript + status land in one update)
        if let Err(e) = self
            .db
            .with(|conn| MeetingRepository::set_transcription(conn, meeting_id, &transcript.text))
            .await
        {
            error!("Meeting {}: failed to persist transcription: {:#}", meeting_id, e);
            self.mark_failed(meeting_id).await;
            return;
        }

        info!(
            "Meeting {}: transcription complete ({} chars)",
            meeting_id,
            transcript.text.len()
        );

        let summary = match self.summarizer.summarize(&transcript.text).await {
            Ok(summary) => summary,
            Err(e) => {
                error!("Meeting {}: summarization failed: {}", meeting_id, e);
                self.mark_failed(meeting_id).await;
                return;
            }
        };

        // Phase: completed (summary fields + status in one update)
        if let Err(e) = self
            .db
            .with(|conn| {
                MeetingRepository::complete(
                    conn,
                    meeting_id,
                    &summary.summary,
                    &summary.key_decisions,
                    &summary.action_items,
                )
            })
            .await
        {
            error!("Meeting {}: failed to persist summary: {:#}", meeting_id, e);
            self.mark_failed(meeting_id).await;
            return;
        }

        info!("Meeting {}: summarization complete", meeting_id);

        // Best-effort from here on: the meeting is completed and nothing
        // below may flip it back to failed.
        self.send_notifications(meeting_id, owner_id).await;
        self.cleanup_artifact(meeting_id, &audio_path).await;

        info!("Meeting {}: processing finished", meeting_id);
    }

    async fn mark_failed(&self, meeting_id: i64) {
        if let Err(e) = self
            .db
            .with(|conn| MeetingRepository::fail(conn, meeting_id))
            .await
        {
            error!("Meeting {}: failed to persist failed status: {:#}", meeting_id, e);
        }
    }

    async fn send_notifications(&self, meeting_id: i64, owner_id: &str) {
        let meeting = match self
            .db
            .with(|conn| MeetingRepository::get(conn, meeting_id, owner_id))
            .await
        {
            Ok(Some(meeting)) => meeting,
            Ok(None) => {
                warn!("Meeting {}: gone before notification fan-out", meeting_id);
                return;
            }
            Err(e) => {
                warn!("Meeting {}: failed to re-fetch for notifications: {:#}", meeting_id, e);
                return;
            }
        };

        let integrations = match self
            .db
            .with(|conn| IntegrationRepository::list_by_owner(conn, owner_id))
            .await
        {
            Ok(integrations) => integrations,
            Err(e) => {
                warn!("Meeting {}: failed to load integrations: {:#}", meeting_id, e);
                return;
            }
        };

        self.notifier.send_all(&meeting, &integrations).await;
    }

    async fn cleanup_artifact(&self, meeting_id: i64, audio_path: &Path) {
        if !audio_path.exists() {
            return;
        }

        if let Err(e) = tokio::fs::remove_file(audio_path).await {
            warn!("Meeting {}: failed to delete audio artifact: {}", meeting_id, e);
            return;
        }

        if let Err(e) = self
            .db
            .with(|conn| MeetingRepository::clear_audio_path(conn, meeting_id))
            .await
        {
            warn!("Meeting {}: failed to clear audio path: {:#}", meeting_id, e);
        }
    }
}
