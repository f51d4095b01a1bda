use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

use crate::handlers::{RENDER, UPLOAD};
use crate::tasks::DEFAULT_LEASE_SECONDS;

/// Per-type lease durations. Renders can legitimately run for a long
/// time; uploads should not, so an abandoned upload is recovered sooner.
#[derive(Debug, Clone, Copy)]
pub struct LeasePolicy {
    pub render_secs: i64,
    pub upload_secs: i64,
}

impl Default for LeasePolicy {
    fn default() -> Self {
        Self {
            render_secs: 3600,
            upload_secs: 900,
        }
    }
}

impl LeasePolicy {
    /// Lease duration for a task type; unknown types get the default.
    pub fn for_type(&self, task_type: &str) -> i64 {
        match task_type {
            RENDER => self.render_secs,
            UPLOAD => self.upload_secs,
            _ => DEFAULT_LEASE_SECONDS,
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub poll_interval: Duration,
    pub sweep_interval: Duration,
    pub max_attempts: i32,
    pub leases: LeasePolicy,
    pub screenshot_cmd: String,
    pub compose_cmd: String,
    pub upload_cmd: String,
    pub work_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            poll_interval: Duration::from_secs(
                env::var("WORKER_POLL_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .context("WORKER_POLL_SECS must be a valid number")?,
            ),
            sweep_interval: Duration::from_secs(
                env::var("SWEEP_INTERVAL_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .context("SWEEP_INTERVAL_SECS must be a valid number")?,
            ),
            max_attempts: env::var("MAX_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("MAX_ATTEMPTS must be a valid number")?,
            leases: LeasePolicy {
                render_secs: env::var("RENDER_LEASE_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .context("RENDER_LEASE_SECS must be a valid number")?,
                upload_secs: env::var("UPLOAD_LEASE_SECS")
                    .unwrap_or_else(|_| "900".to_string())
                    .parse()
                    .context("UPLOAD_LEASE_SECS must be a valid number")?,
            },
            screenshot_cmd: env::var("SCREENSHOT_CMD").context("SCREENSHOT_CMD must be set")?,
            compose_cmd: env::var("COMPOSE_CMD").context("COMPOSE_CMD must be set")?,
            upload_cmd: env::var("UPLOAD_CMD").context("UPLOAD_CMD must be set")?,
            work_dir: env::var("WORK_DIR")
                .unwrap_or_else(|_| "work".to_string())
                .into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_policy_resolves_per_type() {
        let leases = LeasePolicy {
            render_secs: 100,
            upload_secs: 20,
        };
        assert_eq!(leases.for_type(RENDER), 100);
        assert_eq!(leases.for_type(UPLOAD), 20);
        assert_eq!(leases.for_type("email_find"), DEFAULT_LEASE_SECONDS);
    }
}
