//! Task queue infrastructure for background processing.
//!
//! This module provides the durable work queue shared by every worker
//! process:
//! - [`PgTaskStore`] - database-backed store with atomic claim/release/reap
//! - [`HandlerRegistry`] - maps task types to their handlers
//! - [`Worker`] - long-running loop that polls, claims, and executes
//! - [`Task`] - task model with CRUD operations
//!
//! # Architecture
//!
//! ```text
//! Ingestion calls store.create(spec)
//!     │
//!     └─► Insert to DB (pending)
//!
//! Worker (one per process, any number of processes)
//!     │
//!     ├─► store.claim() - atomic, at most one winner per task
//!     ├─► registry.execute() - dispatch to the type's handler
//!     ├─► store.release() - record outcome, apply retry policy
//!     └─► store.reap_expired() - periodic recovery of dead leases
//! ```
//!
//! Handlers for concrete task types live in [`crate::handlers`]; this
//! module only provides the queue machinery.

mod outcome;
mod record;
mod registry;
mod store;
mod task;
mod worker;

pub use outcome::{ErrorKind, Outcome, TaskError};
pub use record::Record;
pub use registry::{HandlerRegistry, SharedHandlerRegistry};
pub use store::{EnqueueResult, PgTaskStore, TaskStatusView};
pub use task::{Task, TaskPriority, TaskSpec, TaskStatus, DEFAULT_LEASE_SECONDS};
pub use worker::{Worker, WorkerConfig};
