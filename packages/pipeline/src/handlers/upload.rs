//! Upload handler: pushes a rendered video to cloud storage.
//!
//! The payload normally carries the rendered file path from the render
//! handler; when it does not, the handler falls back to the subject's
//! completed render task and reuses its recorded output.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::RENDER;
use crate::deps::WorkerDeps;
use crate::tasks::TaskError;

/// Payload for an `upload` task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    /// Local path of the rendered video. Optional: recovered from the
    /// completed render when absent.
    #[serde(default)]
    pub rendered_file: Option<PathBuf>,
    /// Display title for the uploaded file.
    #[serde(default)]
    pub title: Option<String>,
}

pub async fn run(
    subject_id: Uuid,
    request: UploadRequest,
    deps: Arc<WorkerDeps>,
) -> Result<serde_json::Value, TaskError> {
    let rendered_file = match request.rendered_file {
        Some(path) => path,
        None => {
            let render_task = deps
                .store
                .find_completed(subject_id, RENDER)
                .await
                .map_err(TaskError::from)?;

            render_task
                .and_then(|task| task.result)
                .and_then(|result| {
                    result
                        .get("output_file")
                        .and_then(|v| v.as_str())
                        .map(PathBuf::from)
                })
                .ok_or_else(|| {
                    TaskError::non_retryable("no rendered file recorded for this subject")
                })?
        }
    };

    let title = request
        .title
        .unwrap_or_else(|| format!("{} | {}", subject_id, Utc::now().format("%B %Y")));

    let share_link = deps.storage.upload(&rendered_file, &title).await?;

    info!(subject_id = %subject_id, share_link = %share_link, "video uploaded");

    Ok(json!({ "share_link": share_link }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_parses_from_empty_object() {
        let request: UploadRequest = serde_json::from_value(json!({})).unwrap();
        assert!(request.rendered_file.is_none());
        assert!(request.title.is_none());
    }

    #[test]
    fn payload_carries_rendered_file() {
        let request: UploadRequest = serde_json::from_value(json!({
            "rendered_file": "work/video_abc.mp4",
        }))
        .unwrap();
        assert_eq!(
            request.rendered_file,
            Some(PathBuf::from("work/video_abc.mp4"))
        );
    }
}
