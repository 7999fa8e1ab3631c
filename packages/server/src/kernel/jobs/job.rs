//! Job model for background step execution.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use typed_builder::TypedBuilder;
use uuid::Uuid;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    DeadLetter,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_priority", rename_all = "snake_case")]
pub enum JobPriority {
    Critical,
    High,
    #[default]
    Normal,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "error_kind", rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transient error - will retry if attempts remain
    #[default]
    Retryable,
    /// Permanent error - will not retry
    NonRetryable,
    /// Job was cancelled by user/system
    Cancelled,
    /// Job was interrupted by graceful shutdown - will retry
    Shutdown,
}

impl ErrorKind {
    /// Whether this error kind should trigger a retry
    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorKind::Retryable | ErrorKind::Shutdown)
    }
}

// ============================================================================
// Job Model
// ============================================================================

const JOB_COLUMNS: &str = r#"
    id, job_type, args, status, priority, next_run_at, last_run_at, max_retries,
    retry_count, attempt, root_job_id, lease_expires_at, worker_id, error_message,
    error_kind, dead_lettered_at, idempotency_key, created_at, updated_at
"#;

#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Job {
    #[builder(default = Uuid::now_v7())]
    pub id: Uuid,

    pub job_type: String,

    // Payload
    #[builder(default, setter(strip_option))]
    pub args: Option<serde_json::Value>,

    // State
    #[builder(default)]
    pub status: JobStatus,
    #[builder(default)]
    pub priority: JobPriority,

    // Scheduling
    #[builder(default, setter(strip_option))]
    pub next_run_at: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub last_run_at: Option<DateTime<Utc>>,

    // Retry chain
    #[builder(default = 3)]
    pub max_retries: i32,
    #[builder(default = 0)]
    pub retry_count: i32,
    #[builder(default = 1)]
    pub attempt: i32,
    #[builder(default, setter(strip_option))]
    pub root_job_id: Option<Uuid>,

    // Lease management
    #[builder(default, setter(strip_option))]
    pub lease_expires_at: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub worker_id: Option<String>,

    // Error tracking
    #[builder(default, setter(strip_option))]
    pub error_message: Option<String>,
    #[builder(default, setter(strip_option))]
    pub error_kind: Option<ErrorKind>,
    #[builder(default, setter(strip_option))]
    pub dead_lettered_at: Option<DateTime<Utc>>,

    // Command-level idempotency
    #[builder(default, setter(strip_option))]
    pub idempotency_key: Option<String>,

    // Timestamps
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Check if the job is ready to run
    pub fn is_ready(&self) -> bool {
        if self.status != JobStatus::Pending || self.retry_count >= self.max_retries {
            return false;
        }

        match self.next_run_at {
            None => true,
            Some(next_run) => next_run <= Utc::now(),
        }
    }

    /// Whether a retry created now would still be claimable.
    ///
    /// A retry carries `retry_count + 1`, and nothing past `max_retries` is
    /// ever claimed, so the last attempt dead-letters instead of leaving an
    /// unclaimable pending row holding the idempotency key.
    pub fn can_retry(&self) -> bool {
        self.retry_count + 1 < self.max_retries
    }

    /// Create a retry job from a failed job
    pub fn create_retry(&self, scheduled_for: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            job_type: self.job_type.clone(),
            args: self.args.clone(),
            status: JobStatus::Pending,
            priority: self.priority,
            next_run_at: Some(scheduled_for),
            last_run_at: None,
            max_retries: self.max_retries,
            retry_count: self.retry_count + 1,
            attempt: self.attempt + 1,
            root_job_id: self.root_job_id.or(Some(self.id)),
            lease_expires_at: None,
            worker_id: None,
            error_message: None,
            error_kind: None,
            dead_lettered_at: None,
            idempotency_key: self.idempotency_key.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        let sql = format!(
            r#"
            INSERT INTO jobs (
                id, job_type, args, status, priority, next_run_at, last_run_at, max_retries,
                retry_count, attempt, root_job_id, idempotency_key, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {JOB_COLUMNS}
            "#
        );

        let job = sqlx::query_as::<_, Self>(&sql)
            .bind(self.id)
            .bind(&self.job_type)
            .bind(&self.args)
            .bind(self.status)
            .bind(self.priority)
            .bind(self.next_run_at)
            .bind(self.last_run_at)
            .bind(self.max_retries)
            .bind(self.retry_count)
            .bind(self.attempt)
            .bind(self.root_job_id)
            .bind(&self.idempotency_key)
            .bind(self.created_at)
            .bind(self.updated_at)
            .fetch_one(pool)
            .await?;

        Ok(job)
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Self> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1");
        let job = sqlx::query_as::<_, Self>(&sql)
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(job)
    }

    /// Find a pending or running job carrying the given idempotency key
    pub async fn find_active_by_idempotency_key(key: &str, pool: &PgPool) -> Result<Option<Self>> {
        let sql = format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM jobs
            WHERE idempotency_key = $1
              AND status IN ('pending', 'running')
            LIMIT 1
            "#
        );
        let job = sqlx::query_as::<_, Self>(&sql)
            .bind(key)
            .fetch_optional(pool)
            .await?;
        Ok(job)
    }

    /// Claim jobs atomically using FOR UPDATE SKIP LOCKED.
    ///
    /// Running jobs whose lease expired are claimed again, which is what makes
    /// delivery at-least-once.
    pub async fn claim_jobs(
        limit: i64,
        worker_id: &str,
        lease_duration_ms: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let sql = format!(
            r#"
            WITH next_jobs AS (
                SELECT id
                FROM jobs
                WHERE
                    (status = 'pending' AND (next_run_at IS NULL OR next_run_at <= NOW()) AND retry_count < max_retries)
                    OR (status = 'running' AND lease_expires_at < NOW())
                ORDER BY priority, COALESCE(next_run_at, created_at)
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET
                status = 'running',
                last_run_at = NOW(),
                lease_expires_at = NOW() + ($2 || ' milliseconds')::INTERVAL,
                worker_id = $3,
                updated_at = NOW()
            WHERE id IN (SELECT id FROM next_jobs)
            RETURNING {JOB_COLUMNS}
            "#
        );

        let jobs = sqlx::query_as::<_, Self>(&sql)
            .bind(limit)
            .bind(lease_duration_ms.to_string())
            .bind(worker_id)
            .fetch_all(pool)
            .await?;

        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_pending_normal() {
        let job = Job::builder().job_type("slack_sync_users").build();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.priority, JobPriority::Normal);
        assert_eq!(job.max_retries, 3);
        assert!(job.is_ready());
    }

    #[test]
    fn future_job_is_not_ready() {
        let job = Job::builder()
            .job_type("slack_sync_users")
            .next_run_at(Utc::now() + chrono::Duration::minutes(5))
            .build();
        assert!(!job.is_ready());
    }

    #[test]
    fn retry_links_back_to_root() {
        let job = Job::builder()
            .job_type("slack_collect_messages")
            .idempotency_key("messages:T1:C1:-")
            .build();
        let retry = job.create_retry(Utc::now());

        assert_ne!(retry.id, job.id);
        assert_eq!(retry.root_job_id, Some(job.id));
        assert_eq!(retry.retry_count, 1);
        assert_eq!(retry.attempt, 2);
        assert_eq!(retry.idempotency_key, job.idempotency_key);

        let second = retry.create_retry(Utc::now());
        assert_eq!(second.root_job_id, Some(job.id));
    }

    #[test]
    fn last_attempt_cannot_retry() {
        let job = Job::builder().job_type("slack_sync_users").build();
        assert!(job.can_retry());

        let second = job.create_retry(Utc::now());
        assert!(second.can_retry());

        let third = second.create_retry(Utc::now());
        assert_eq!(third.retry_count, 2);
        assert!(!third.can_retry());
    }

    #[test]
    fn only_io_style_failures_retry() {
        assert!(ErrorKind::Retryable.should_retry());
        assert!(ErrorKind::Shutdown.should_retry());
        assert!(!ErrorKind::NonRetryable.should_retry());
        assert!(!ErrorKind::Cancelled.should_retry());
    }
}
