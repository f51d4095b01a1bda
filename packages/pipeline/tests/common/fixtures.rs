//! Shared fixtures: spec shortcuts and stub collaborators.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use pipeline_core::collaborators::{RemoteStorage, ScreenshotCapture, VideoComposer};
use pipeline_core::config::LeasePolicy;
use pipeline_core::deps::WorkerDeps;
use pipeline_core::tasks::{PgTaskStore, TaskSpec};

/// A plain pending spec with defaults.
pub fn spec(subject_id: Uuid, task_type: &str) -> TaskSpec {
    TaskSpec::builder()
        .subject_id(subject_id)
        .task_type(task_type)
        .build()
}

/// Screenshot stub that records requested URLs; optionally refuses
/// every capture.
#[derive(Default)]
pub struct StubScreenshots {
    pub fail: bool,
    pub calls: Mutex<Vec<String>>,
}

impl StubScreenshots {
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ScreenshotCapture for StubScreenshots {
    async fn capture(&self, url: &str, _output: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.fail {
            bail!("capture refused by target");
        }
        Ok(())
    }
}

/// Composer stub that records the preset used per call.
#[derive(Default)]
pub struct StubComposer {
    pub fail: bool,
    pub calls: Mutex<Vec<String>>,
}

#[async_trait]
impl VideoComposer for StubComposer {
    async fn compose(
        &self,
        preset: &str,
        _website_shot: &Path,
        _ads_shot: Option<&Path>,
        _output: &Path,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(preset.to_string());
        if self.fail {
            bail!("compositor unavailable");
        }
        Ok(())
    }
}

/// Storage stub that records uploads and hands back a deterministic link.
#[derive(Default)]
pub struct StubStorage {
    pub calls: Mutex<Vec<(PathBuf, String)>>,
}

#[async_trait]
impl RemoteStorage for StubStorage {
    async fn upload(&self, local_path: &Path, title: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((local_path.to_path_buf(), title.to_string()));
        Ok(format!("https://drive.example/{}", title.replace(' ', "-")))
    }
}

/// Worker dependencies wired to the given store and stubs.
pub fn stub_deps(
    store: &PgTaskStore,
    screenshots: Arc<StubScreenshots>,
    composer: Arc<StubComposer>,
    storage: Arc<StubStorage>,
) -> Arc<WorkerDeps> {
    Arc::new(WorkerDeps {
        store: store.clone(),
        screenshots,
        composer,
        storage,
        work_dir: std::env::temp_dir(),
        leases: LeasePolicy::default(),
    })
}
