//! Meeting processing module.
//!
//! Owns the upload-to-summary pipeline: the status state machine, the
//! orchestrator that drives it, and the notification fan-out that runs
//! after a meeting completes.

pub mod notify;
pub mod pipeline;
pub mod status;

pub use notify::Notifier;
pub use pipeline::{Pipeline, PipelineLocks};
pub use status::MeetingStatus;
