//! Render handler: screenshots the lead's pages and composes the video.
//!
//! On success it enqueues the follow-up upload task for the same subject,
//! carrying the rendered file path, at high priority so finished renders
//! drain promptly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::UPLOAD;
use crate::deps::WorkerDeps;
use crate::tasks::{TaskError, TaskPriority, TaskSpec};

/// Payload for a `render` task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderRequest {
    /// The lead's website; its screenshot anchors the video.
    pub website_url: String,
    /// Optional ads landing page, captured best-effort.
    #[serde(default)]
    pub ads_url: Option<String>,
    /// Composition preset name, chosen upstream per niche.
    pub preset: String,
    /// Title for the eventual upload, passed through.
    #[serde(default)]
    pub title: Option<String>,
}

pub async fn run(
    subject_id: Uuid,
    request: RenderRequest,
    deps: Arc<WorkerDeps>,
) -> Result<serde_json::Value, TaskError> {
    let website_shot = deps.work_dir.join(format!("website_{subject_id}.png"));
    deps.screenshots
        .capture(&request.website_url, &website_shot)
        .await
        .map_err(|e| {
            // A blocked or broken page will not unblock itself on retry.
            TaskError::non_retryable(format!(
                "website screenshot failed ({e:#}); the page likely blocked capture"
            ))
        })?;

    let ads_shot = match &request.ads_url {
        Some(ads_url) => {
            let path = deps.work_dir.join(format!("ads_{subject_id}.png"));
            match deps.screenshots.capture(ads_url, &path).await {
                Ok(()) => Some(path),
                Err(e) => {
                    warn!(
                        subject_id = %subject_id,
                        error = %format!("{e:#}"),
                        "ads screenshot failed, rendering without it"
                    );
                    None
                }
            }
        }
        None => None,
    };

    let output = deps.work_dir.join(format!("video_{subject_id}.mp4"));
    deps.composer
        .compose(&request.preset, &website_shot, ads_shot.as_deref(), &output)
        .await?;

    info!(subject_id = %subject_id, output = %output.display(), "video composed");

    let upload = TaskSpec::builder()
        .subject_id(subject_id)
        .task_type(UPLOAD)
        .payload(json!({
            "rendered_file": &output,
            "title": request.title,
        }))
        .priority(TaskPriority::High)
        .lease_seconds(deps.leases.for_type(UPLOAD))
        .build();
    deps.store
        .create_if_absent(upload)
        .await
        .map_err(TaskError::from)?;

    Ok(json!({
        "output_file": output,
        "preset": request.preset,
    }))
}
