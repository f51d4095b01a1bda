//! Task model for background processing.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use typed_builder::TypedBuilder;
use uuid::Uuid;

use super::record::Record;

/// Default lease duration when no per-type policy applies.
pub const DEFAULT_LEASE_SECONDS: i64 = 3600;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Whether the task has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Two-tier claim priority. Stored as a plain integer so the claim
/// query can order on it directly; higher values are claimed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    High,
    #[default]
    Normal,
}

impl TaskPriority {
    pub fn as_i32(&self) -> i32 {
        match self {
            TaskPriority::High => 5,
            TaskPriority::Normal => 1,
        }
    }
}

impl From<TaskPriority> for i32 {
    fn from(priority: TaskPriority) -> Self {
        priority.as_i32()
    }
}

// ============================================================================
// Task Model
// ============================================================================

/// Everything needed to enqueue a task. Built by ingestion callers
/// (CSV import, automation triggers) and by handlers chaining follow-up work.
#[derive(Clone, Debug, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct TaskSpec {
    pub subject_id: Uuid,
    pub task_type: String,
    #[builder(default, setter(strip_option))]
    pub payload: Option<serde_json::Value>,
    #[builder(default = TaskPriority::Normal.as_i32())]
    pub priority: i32,
    #[builder(default = 3)]
    pub max_attempts: i32,
    #[builder(default = DEFAULT_LEASE_SECONDS)]
    pub lease_seconds: i64,
}

#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,

    // Core identity
    pub subject_id: Uuid,
    pub task_type: String,

    // State
    pub status: TaskStatus,
    pub priority: i32,

    // Payload and outcome
    pub payload: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,

    // Retry budget
    pub attempt_count: i32,
    pub max_attempts: i32,

    // Lease management
    pub owner_lease: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub lease_seconds: i64,

    // Timestamps
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Build a fresh pending task from a spec.
    pub fn from_spec(spec: TaskSpec) -> Self {
        Self {
            id: Uuid::now_v7(),
            subject_id: spec.subject_id,
            task_type: spec.task_type,
            status: TaskStatus::Pending,
            priority: spec.priority,
            payload: spec.payload,
            result: None,
            attempt_count: 0,
            max_attempts: spec.max_attempts,
            owner_lease: None,
            claimed_at: None,
            lease_seconds: spec.lease_seconds,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Whether this task is eligible for claiming. The claim query applies
    /// the same conditions in SQL; this exists for callers holding a row.
    pub fn is_ready(&self) -> bool {
        self.status == TaskStatus::Pending && self.attempt_count < self.max_attempts
    }

    /// When the current lease stops being trusted, if the task is leased.
    pub fn lease_deadline(&self) -> Option<DateTime<Utc>> {
        self.claimed_at
            .map(|claimed| claimed + chrono::Duration::seconds(self.lease_seconds))
    }
}

#[async_trait::async_trait]
impl Record for Task {
    const TABLE: &'static str = "tasks";
    type Id = Uuid;

    async fn find_by_id(id: Uuid, db: &sqlx::PgPool) -> Result<Self> {
        let task = sqlx::query_as::<_, Self>(
            r#"
            SELECT id, subject_id, task_type, status, priority, payload, result,
                   attempt_count, max_attempts, owner_lease, claimed_at, lease_seconds,
                   created_at, updated_at
            FROM tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_one(db)
        .await?;

        Ok(task)
    }

    async fn insert(&self, db: &sqlx::PgPool) -> Result<Self> {
        let task = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO tasks (
                id, subject_id, task_type, status, priority, payload, result,
                attempt_count, max_attempts, owner_lease, claimed_at, lease_seconds,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id, subject_id, task_type, status, priority, payload, result,
                      attempt_count, max_attempts, owner_lease, claimed_at, lease_seconds,
                      created_at, updated_at
            "#,
        )
        .bind(self.id)
        .bind(self.subject_id)
        .bind(&self.task_type)
        .bind(self.status)
        .bind(self.priority)
        .bind(&self.payload)
        .bind(&self.result)
        .bind(self.attempt_count)
        .bind(self.max_attempts)
        .bind(&self.owner_lease)
        .bind(self.claimed_at)
        .bind(self.lease_seconds)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(db)
        .await?;

        Ok(task)
    }

    async fn delete(&self, db: &sqlx::PgPool) -> Result<()> {
        sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(self.id)
            .execute(db)
            .await?;

        Ok(())
    }
}
