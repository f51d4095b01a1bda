//! Worker loop for processing queued tasks.
//!
//! Each worker process runs one of these loops:
//!
//! ```text
//! Worker
//!     │
//!     ├─► Sweep expired leases (periodic)
//!     ├─► Claim next eligible task (store handles mutual exclusion)
//!     ├─► Execute via HandlerRegistry (no store lock held)
//!     └─► Release with the outcome
//! ```
//!
//! Multiple processes run this loop against the same store with no other
//! coordination; adding a process adds throughput. Store errors are logged
//! and backed off, never fatal - a crashed worker's tasks are exactly what
//! the lease sweep exists to recover, and an unnecessary exit only adds
//! recovery latency.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::registry::SharedHandlerRegistry;
use super::store::PgTaskStore;
use super::Outcome;
use crate::deps::WorkerDeps;
use crate::handlers;

/// Configuration for one worker instance.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Lease identifier for this instance; stamped on every claim.
    pub worker_id: String,
    /// Task types this instance will claim, in business-priority order.
    pub candidate_types: Vec<String>,
    /// How long to wait when no tasks are available.
    pub poll_interval: Duration,
    /// How often to sweep for expired leases.
    pub sweep_interval: Duration,
    /// How long to wait after a store error before retrying.
    pub error_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("worker-{}", Uuid::new_v4()),
            candidate_types: handlers::candidate_types(),
            poll_interval: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(300),
            error_backoff: Duration::from_secs(1),
        }
    }
}

impl WorkerConfig {
    /// Create a new config with a specific worker ID.
    pub fn with_worker_id(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }
}

/// Long-running service that claims and executes tasks.
pub struct Worker {
    store: PgTaskStore,
    registry: SharedHandlerRegistry,
    deps: Arc<WorkerDeps>,
    config: WorkerConfig,
    shutdown: Arc<AtomicBool>,
}

impl Worker {
    /// Create a new worker with default configuration.
    pub fn new(store: PgTaskStore, registry: SharedHandlerRegistry, deps: Arc<WorkerDeps>) -> Self {
        Self::with_config(store, registry, deps, WorkerConfig::default())
    }

    /// Create with custom configuration.
    pub fn with_config(
        store: PgTaskStore,
        registry: SharedHandlerRegistry,
        deps: Arc<WorkerDeps>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            registry,
            deps,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a shutdown handle for graceful shutdown.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Request shutdown of the worker.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Claim and process at most one task.
    ///
    /// Returns whether a task was processed. Execution happens with no
    /// store lock held; the lease recorded at claim time is the only
    /// concurrency control, so a task can run for minutes without
    /// blocking any other worker.
    pub async fn poll_once(&self) -> Result<bool> {
        let Some(task) = self
            .store
            .claim(&self.config.candidate_types, &self.config.worker_id)
            .await?
        else {
            return Ok(false);
        };

        let started = Instant::now();
        let outcome = self.registry.execute(&task, self.deps.clone()).await;

        match &outcome {
            Outcome::Success(_) => {
                info!(
                    task_id = %task.id,
                    task_type = %task.task_type,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "task succeeded"
                );
            }
            Outcome::Failure(e) => {
                warn!(
                    task_id = %task.id,
                    task_type = %task.task_type,
                    attempt = task.attempt_count,
                    error = %e,
                    "task failed"
                );
            }
        }

        let recorded = self
            .store
            .release(task.id, &self.config.worker_id, &outcome)
            .await?;

        if !recorded {
            // The lease expired mid-execution and a sweep already moved the
            // task on; the conditional release kept us from clobbering it.
            warn!(
                task_id = %task.id,
                worker_id = %self.config.worker_id,
                "lease lost before release; outcome discarded"
            );
        }

        Ok(true)
    }

    /// Run the worker until shutdown is requested.
    pub async fn run(self) -> Result<()> {
        info!(
            worker_id = %self.config.worker_id,
            candidate_types = ?self.config.candidate_types,
            "worker starting"
        );

        let mut last_sweep: Option<Instant> = None;

        loop {
            if self.is_shutdown_requested() {
                break;
            }

            // Periodic branch: recover tasks whose owners went away.
            let sweep_due = last_sweep
                .map(|at| at.elapsed() >= self.config.sweep_interval)
                .unwrap_or(true);
            if sweep_due {
                match self.store.reap_expired().await {
                    Ok(0) => {}
                    Ok(reaped) => info!(reaped, "recovered tasks with expired leases"),
                    Err(e) => error!(error = %e, "lease sweep failed"),
                }
                last_sweep = Some(Instant::now());
            }

            match self.poll_once().await {
                Ok(true) => {
                    // Drain: immediately look for the next task.
                }
                Ok(false) => {
                    debug!(worker_id = %self.config.worker_id, "no pending tasks");
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                Err(e) => {
                    error!(error = %e, "worker iteration failed");
                    tokio::time::sleep(self.config.error_backoff).await;
                }
            }
        }

        info!(worker_id = %self.config.worker_id, "worker stopped");
        Ok(())
    }

    /// Run until a shutdown signal is received.
    ///
    /// Convenience method that listens for Ctrl+C. Stopping at any point
    /// is safe: an in-flight task simply becomes eligible for the sweep
    /// once its lease expires.
    pub async fn run_until_shutdown(self) -> Result<()> {
        let shutdown = self.shutdown_handle();

        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("received shutdown signal");
            shutdown.store(true, Ordering::SeqCst);
        });

        self.run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = WorkerConfig::default();
        assert!(config.worker_id.starts_with("worker-"));
        assert_eq!(config.candidate_types, vec!["render", "upload"]);
    }

    #[test]
    fn config_with_worker_id() {
        let config = WorkerConfig::with_worker_id("my-worker");
        assert_eq!(config.worker_id, "my-worker");
    }
}
