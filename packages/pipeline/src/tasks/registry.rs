//! Handler registry for dispatching claimed tasks.
//!
//! The registry maps task type strings (e.g., "render") to handlers that
//! deserialize the task's payload and execute the work. Handlers are pure
//! functions of (subject, payload) plus the collaborator dependencies;
//! they never touch task status - every transition flows back through the
//! store's `release`, keeping the state machine in one place.
//!
//! Dispatch converts every handler misbehavior into a failure outcome:
//! unknown types, bad payloads, returned errors, and panics. A broken
//! task must never take the worker loop down with it.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use serde::de::DeserializeOwned;
use std::panic::AssertUnwindSafe;
use uuid::Uuid;

use super::outcome::{Outcome, TaskError};
use super::task::Task;
use crate::deps::WorkerDeps;

/// Type alias for the async handler function.
///
/// Handlers receive the subject id, the raw payload, and the shared
/// dependencies, and produce the result value recorded on success.
type BoxedHandler = Box<
    dyn Fn(
            Uuid,
            serde_json::Value,
            Arc<WorkerDeps>,
        ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, TaskError>> + Send>>
        + Send
        + Sync,
>;

struct Registration {
    handler: BoxedHandler,
}

/// Registry that maps task type strings to handlers.
///
/// Each task type registers at startup. Adding an enrichment type means
/// registering one more handler, not touching the worker loop.
#[derive(Default)]
pub struct HandlerRegistry {
    registrations: HashMap<&'static str, Registration>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            registrations: HashMap::new(),
        }
    }

    /// Register a task type with its handler.
    ///
    /// The handler is an async function that receives the deserialized
    /// payload; a payload that does not parse fails the task permanently,
    /// since retrying malformed input cannot help.
    pub fn register<P, F, Fut>(&mut self, task_type: &'static str, handler: F)
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(Uuid, P, Arc<WorkerDeps>) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<serde_json::Value, TaskError>> + Send + 'static,
    {
        let boxed: BoxedHandler = Box::new(move |subject_id, value, deps| {
            let handler = handler.clone();
            Box::pin(async move {
                let payload: P = serde_json::from_value(value).map_err(|e| {
                    TaskError::non_retryable(format!("invalid {task_type} payload: {e}"))
                })?;
                handler(subject_id, payload, deps).await
            })
        });

        self.registrations
            .insert(task_type, Registration { handler: boxed });
    }

    /// Execute a claimed task and report its outcome.
    ///
    /// Never returns an error and never unwinds: a panicking handler is
    /// caught at this boundary and recorded as a retryable failure.
    pub async fn execute(&self, task: &Task, deps: Arc<WorkerDeps>) -> Outcome {
        let Some(registration) = self.registrations.get(task.task_type.as_str()) else {
            return Outcome::failure(TaskError::non_retryable(format!(
                "no handler registered for task type {}",
                task.task_type
            )));
        };

        let payload = task.payload.clone().unwrap_or(serde_json::Value::Null);
        let future = (registration.handler)(task.subject_id, payload, deps);

        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(result)) => Outcome::success(result),
            Ok(Err(error)) => Outcome::failure(error),
            Err(_) => Outcome::failure(TaskError::retryable(format!(
                "handler for {} panicked",
                task.task_type
            ))),
        }
    }

    /// Check if a task type is registered.
    pub fn is_registered(&self, task_type: &str) -> bool {
        self.registrations.contains_key(task_type)
    }

    /// Get all registered task types.
    pub fn registered_types(&self) -> Vec<&'static str> {
        self.registrations.keys().copied().collect()
    }
}

/// Thread-safe registry wrapped in Arc.
pub type SharedHandlerRegistry = Arc<HandlerRegistry>;
