//! PostgreSQL-backed task store.
//!
//! All cross-worker coordination goes through this type, and every
//! coordinating operation (claim, release, reap) is a single conditional
//! UPDATE. Nothing here reads task state and writes it back in a second
//! statement, so there is no window for another worker to interleave.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

use super::outcome::Outcome;
use super::record::Record;
use super::task::{Task, TaskSpec, TaskStatus};

/// Result type for enqueue operations that handles dedupe.
#[derive(Debug, Clone)]
pub enum EnqueueResult {
    /// Task was enqueued, returns new task ID.
    Created(Uuid),
    /// A live task of the same kind already exists for the subject.
    Skipped,
}

impl EnqueueResult {
    /// Returns true if this enqueue created a new task.
    pub fn is_created(&self) -> bool {
        matches!(self, EnqueueResult::Created(_))
    }
}

/// Per-subject status row served to the front end.
#[derive(FromRow, Debug, Clone, Serialize)]
pub struct TaskStatusView {
    pub task_type: String,
    pub status: TaskStatus,
    pub result: Option<serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

const TASK_COLUMNS: &str = "id, subject_id, task_type, status, priority, payload, result, \
     attempt_count, max_attempts, owner_lease, claimed_at, lease_seconds, \
     created_at, updated_at";

/// PostgreSQL-backed task store shared by every worker process.
#[derive(Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Insert a new pending task.
    pub async fn create(&self, spec: TaskSpec) -> Result<Task> {
        Task::from_spec(spec).insert(&self.pool).await
    }

    /// Insert a new pending task unless a live one of the same
    /// (subject, type) already exists. "Live" means pending, in progress,
    /// or completed; a terminally failed task does not block re-enqueueing.
    ///
    /// The existence check and the insert are one statement, so two
    /// concurrent ingestion calls cannot both create the task.
    pub async fn create_if_absent(&self, spec: TaskSpec) -> Result<EnqueueResult> {
        let task = Task::from_spec(spec);

        let inserted = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO tasks (
                id, subject_id, task_type, status, priority, payload, result,
                attempt_count, max_attempts, owner_lease, claimed_at, lease_seconds,
                created_at, updated_at
            )
            SELECT $1::uuid, $2::uuid, $3::text, $4::task_status, $5::int4,
                   $6::jsonb, $7::jsonb, $8::int4, $9::int4, $10::text,
                   $11::timestamptz, $12::int8, $13::timestamptz, $14::timestamptz
            WHERE NOT EXISTS (
                SELECT 1 FROM tasks
                WHERE subject_id = $2
                  AND task_type = $3
                  AND status IN ('pending', 'in_progress', 'completed')
            )
            RETURNING id
            "#,
        )
        .bind(task.id)
        .bind(task.subject_id)
        .bind(&task.task_type)
        .bind(task.status)
        .bind(task.priority)
        .bind(&task.payload)
        .bind(&task.result)
        .bind(task.attempt_count)
        .bind(task.max_attempts)
        .bind(&task.owner_lease)
        .bind(task.claimed_at)
        .bind(task.lease_seconds)
        .bind(task.created_at)
        .bind(task.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match inserted {
            Some(id) => EnqueueResult::Created(id),
            None => EnqueueResult::Skipped,
        })
    }

    // ========================================================================
    // Lease management
    // ========================================================================

    /// Atomically claim the next eligible task for this worker.
    ///
    /// Eligible: pending, of a candidate type, with attempts remaining.
    /// Ordered by priority (highest first), then creation time (FIFO within
    /// a tier). Uses FOR UPDATE SKIP LOCKED so N concurrent claimants can
    /// never be handed the same row; the claim itself increments the
    /// attempt counter.
    pub async fn claim(
        &self,
        candidate_types: &[String],
        worker_lease_id: &str,
    ) -> Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(&format!(
            r#"
            WITH next_task AS (
                SELECT id
                FROM tasks
                WHERE status = 'pending'
                  AND task_type = ANY($1)
                  AND attempt_count < max_attempts
                ORDER BY priority DESC, created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE tasks
            SET
                status = 'in_progress',
                owner_lease = $2,
                claimed_at = NOW(),
                attempt_count = attempt_count + 1,
                updated_at = NOW()
            WHERE id IN (SELECT id FROM next_task)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(candidate_types.to_vec())
        .bind(worker_lease_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(task) = &task {
            debug!(
                task_id = %task.id,
                task_type = %task.task_type,
                attempt = task.attempt_count,
                "claimed task"
            );
        }

        Ok(task)
    }

    /// Record the outcome of an executed task and drop its lease.
    ///
    /// The update is keyed on (id, owner_lease, in_progress): a release
    /// from a worker whose lease was already reaped matches nothing, so a
    /// stale outcome can never overwrite a result the current owner
    /// recorded. Returns whether the outcome was recorded, and is
    /// idempotent - a second call for the same claim is a no-op.
    ///
    /// Success makes the task terminal with its result. A retryable
    /// failure re-queues the task while attempts remain; a non-retryable
    /// one (or an exhausted budget) fails it terminally with the error
    /// detail as its result.
    pub async fn release(
        &self,
        task_id: Uuid,
        worker_lease_id: &str,
        outcome: &Outcome,
    ) -> Result<bool> {
        let rows_affected = match outcome {
            Outcome::Success(result) => {
                sqlx::query(
                    r#"
                    UPDATE tasks
                    SET status = 'completed',
                        result = $3,
                        owner_lease = NULL,
                        updated_at = NOW()
                    WHERE id = $1 AND owner_lease = $2 AND status = 'in_progress'
                    "#,
                )
                .bind(task_id)
                .bind(worker_lease_id)
                .bind(result)
                .execute(&self.pool)
                .await?
                .rows_affected()
            }
            Outcome::Failure(error) => {
                sqlx::query(
                    r#"
                    UPDATE tasks
                    SET status = CASE
                            WHEN $4 OR attempt_count >= max_attempts
                                THEN 'failed'::task_status
                            ELSE 'pending'::task_status
                        END,
                        result = $3,
                        owner_lease = NULL,
                        claimed_at = NULL,
                        updated_at = NOW()
                    WHERE id = $1 AND owner_lease = $2 AND status = 'in_progress'
                    "#,
                )
                .bind(task_id)
                .bind(worker_lease_id)
                .bind(serde_json::json!({ "error": error.message }))
                .bind(!error.kind.should_retry())
                .execute(&self.pool)
                .await?
                .rows_affected()
            }
        };

        Ok(rows_affected > 0)
    }

    // ========================================================================
    // Stuck-task recovery
    // ========================================================================

    /// Return every task whose lease has expired to the queue.
    ///
    /// A single conditional UPDATE: rows still in progress past their
    /// per-task lease deadline lose their lease and become pending again,
    /// or failed when the budget is spent (the crashed attempt was already
    /// charged at claim time). Because the expiry check and the transition
    /// are one statement, a reap can never clobber a completion the
    /// rightful owner races in - once `release` lands, the row is no
    /// longer in progress and the reap skips it.
    ///
    /// Returns the number of reaped tasks.
    pub async fn reap_expired(&self) -> Result<u64> {
        let reaped = sqlx::query(
            r#"
            UPDATE tasks
            SET status = CASE
                    WHEN attempt_count >= max_attempts
                        THEN 'failed'::task_status
                    ELSE 'pending'::task_status
                END,
                result = CASE
                    WHEN attempt_count >= max_attempts
                        THEN jsonb_build_object(
                            'error', 'lease expired',
                            'attempts', attempt_count
                        )
                    ELSE result
                END,
                owner_lease = NULL,
                claimed_at = NULL,
                updated_at = NOW()
            WHERE status = 'in_progress'
              AND claimed_at + (lease_seconds * interval '1 second') < NOW()
            "#,
        )
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(reaped)
    }

    // ========================================================================
    // Status interface
    // ========================================================================

    /// The latest durably recorded status for a subject, if it has any
    /// tasks. What the front end polls while a video works its way through
    /// the queue.
    pub async fn latest_status(&self, subject_id: Uuid) -> Result<Option<TaskStatusView>> {
        let view = sqlx::query_as::<_, TaskStatusView>(
            r#"
            SELECT task_type, status, result, updated_at
            FROM tasks
            WHERE subject_id = $1
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(view)
    }

    /// Every task recorded for a subject, oldest first.
    pub async fn statuses_for_subject(&self, subject_id: Uuid) -> Result<Vec<TaskStatusView>> {
        let views = sqlx::query_as::<_, TaskStatusView>(
            r#"
            SELECT task_type, status, result, updated_at
            FROM tasks
            WHERE subject_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(views)
    }

    /// The most recent completed task of a given type for a subject.
    /// Used by the upload handler to recover the rendered file path when
    /// its own payload does not carry one.
    pub async fn find_completed(&self, subject_id: Uuid, task_type: &str) -> Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(&format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM tasks
            WHERE subject_id = $1
              AND task_type = $2
              AND status = 'completed'
            ORDER BY updated_at DESC
            LIMIT 1
            "#
        ))
        .bind(subject_id)
        .bind(task_type)
        .fetch_optional(&self.pool)
        .await?;

        Ok(task)
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Operator override: put every terminally failed task back in the
    /// queue with a fresh attempt budget. Returns the number requeued.
    pub async fn reset_failed(&self) -> Result<u64> {
        let reset = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'pending',
                attempt_count = 0,
                owner_lease = NULL,
                claimed_at = NULL,
                updated_at = NOW()
            WHERE status = 'failed'
            "#,
        )
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(reset)
    }

    /// Delete every task recorded for a subject. Returns the number removed.
    pub async fn clear_subject(&self, subject_id: Uuid) -> Result<u64> {
        let deleted = sqlx::query("DELETE FROM tasks WHERE subject_id = $1")
            .bind(subject_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}
