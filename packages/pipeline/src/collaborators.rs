//! External collaborator interfaces (using traits for testability).
//!
//! The actual screenshotting, video composition, and cloud upload live
//! outside this crate; handlers consume them as black boxes that either
//! produce their artifact or fail. The shipped implementations shell out
//! to whatever tool the deployment configures.

use std::path::Path;
use std::process::Stdio;

use anyhow::{ensure, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

// =============================================================================
// Traits
// =============================================================================

/// Captures a page screenshot to a local file.
#[async_trait]
pub trait ScreenshotCapture: Send + Sync {
    async fn capture(&self, url: &str, output: &Path) -> Result<()>;
}

/// Composes the final video from a preset and captured inputs.
#[async_trait]
pub trait VideoComposer: Send + Sync {
    async fn compose(
        &self,
        preset: &str,
        website_shot: &Path,
        ads_shot: Option<&Path>,
        output: &Path,
    ) -> Result<()>;
}

/// Uploads a local file and returns a shareable link.
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    async fn upload(&self, local_path: &Path, title: &str) -> Result<String>;
}

// =============================================================================
// Subprocess-backed implementations
// =============================================================================

/// Screenshot capture that invokes a configured command as
/// `<program> <url> <output-path>`.
pub struct CommandScreenshot {
    program: String,
}

impl CommandScreenshot {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl ScreenshotCapture for CommandScreenshot {
    async fn capture(&self, url: &str, output: &Path) -> Result<()> {
        let status = Command::new(&self.program)
            .arg(url)
            .arg(output)
            .status()
            .await
            .with_context(|| format!("failed to spawn {}", self.program))?;

        ensure!(status.success(), "{} exited with {}", self.program, status);
        Ok(())
    }
}

/// Video composition that invokes a configured command as
/// `<program> <preset> <website-shot> [ads-shot] <output-path>`.
pub struct CommandComposer {
    program: String,
}

impl CommandComposer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl VideoComposer for CommandComposer {
    async fn compose(
        &self,
        preset: &str,
        website_shot: &Path,
        ads_shot: Option<&Path>,
        output: &Path,
    ) -> Result<()> {
        let mut command = Command::new(&self.program);
        command.arg(preset).arg(website_shot);
        if let Some(ads) = ads_shot {
            command.arg(ads);
        }
        command.arg(output);

        let status = command
            .status()
            .await
            .with_context(|| format!("failed to spawn {}", self.program))?;

        ensure!(status.success(), "{} exited with {}", self.program, status);
        Ok(())
    }
}

/// Upload that invokes a configured command as `<program> <path> <title>`
/// and reads the share link from its stdout.
pub struct CommandUploader {
    program: String,
}

impl CommandUploader {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl RemoteStorage for CommandUploader {
    async fn upload(&self, local_path: &Path, title: &str) -> Result<String> {
        let output = Command::new(&self.program)
            .arg(local_path)
            .arg(title)
            .stdout(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("failed to spawn {}", self.program))?;

        ensure!(
            output.status.success(),
            "{} exited with {}",
            self.program,
            output.status
        );

        let link = String::from_utf8(output.stdout)
            .context("upload command produced non-utf8 output")?
            .trim()
            .to_string();
        ensure!(!link.is_empty(), "upload command produced no share link");

        Ok(link)
    }
}
