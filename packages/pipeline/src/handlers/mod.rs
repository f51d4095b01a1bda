//! Task handlers for the lead-video pipeline.
//!
//! Each task type maps to one handler registered at startup. Handlers do
//! the side-effecting work through the collaborator traits and report an
//! outcome; the queue machinery in [`crate::tasks`] owns every status
//! transition.

pub mod render;
pub mod upload;

use crate::tasks::HandlerRegistry;

pub use render::RenderRequest;
pub use upload::UploadRequest;

/// Task type for composing a lead's video.
pub const RENDER: &str = "render";

/// Task type for pushing a rendered video to cloud storage.
pub const UPLOAD: &str = "upload";

/// The task types a worker claims by default, in business-priority order:
/// renders first, since uploads only exist once a render has finished.
pub fn candidate_types() -> Vec<String> {
    vec![RENDER.to_string(), UPLOAD.to_string()]
}

/// Build the registry with every pipeline handler installed.
pub fn build_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register::<RenderRequest, _, _>(RENDER, render::run);
    registry.register::<UploadRequest, _, _>(UPLOAD, upload::run);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_all_pipeline_types() {
        let registry = build_registry();
        for task_type in candidate_types() {
            assert!(registry.is_registered(&task_type));
        }
    }
}
