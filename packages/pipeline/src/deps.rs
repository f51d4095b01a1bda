//! Worker dependencies handed to every handler.
//!
//! All external services sit behind trait objects so tests can swap in
//! stubs; handler-owned files under `work_dir` are keyed by subject so
//! concurrent worker processes never collide.

use std::path::PathBuf;
use std::sync::Arc;

use crate::collaborators::{RemoteStorage, ScreenshotCapture, VideoComposer};
use crate::config::LeasePolicy;
use crate::tasks::PgTaskStore;

/// Dependencies accessible to task handlers.
#[derive(Clone)]
pub struct WorkerDeps {
    /// The shared task store. Handlers may enqueue follow-up tasks and
    /// read recorded results; status transitions stay off-limits.
    pub store: PgTaskStore,
    pub screenshots: Arc<dyn ScreenshotCapture>,
    pub composer: Arc<dyn VideoComposer>,
    pub storage: Arc<dyn RemoteStorage>,
    /// Scratch directory for screenshots and rendered output.
    pub work_dir: PathBuf,
    /// Per-type lease durations, applied to handler-enqueued tasks.
    pub leases: LeasePolicy,
}
