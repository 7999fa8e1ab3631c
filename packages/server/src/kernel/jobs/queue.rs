//! PostgreSQL-backed job queue implementation.
//!
//! Sync steps never loop in-process: each step that needs a continuation
//! enqueues a new job carrying its cursor, and the queue's redelivery is the
//! only retry path.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::job::{ErrorKind, Job, JobPriority};

/// Result type for enqueue operations that handles idempotency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    /// Command was enqueued, returns new job ID
    Created(Uuid),
    /// Command already exists (idempotency hit), returns existing job ID
    Duplicate(Uuid),
}

impl EnqueueResult {
    /// Get the job ID regardless of whether it was created or duplicate
    pub fn job_id(&self) -> Uuid {
        match self {
            EnqueueResult::Created(id) | EnqueueResult::Duplicate(id) => *id,
        }
    }

    /// Returns true if this was a newly created job
    pub fn is_created(&self) -> bool {
        matches!(self, EnqueueResult::Created(_))
    }
}

/// A claimed job ready for execution.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: Uuid,
    pub job: Job,
}

impl ClaimedJob {
    pub fn new(job: Job) -> Self {
        Self { id: job.id, job }
    }

    /// Deserialize the command payload.
    pub fn deserialize<C: DeserializeOwned>(&self) -> Result<C> {
        let args = self
            .job
            .args
            .as_ref()
            .ok_or_else(|| anyhow!("job {} has no args", self.id))?;
        serde_json::from_value(args.clone())
            .map_err(|e| anyhow!("failed to deserialize command: {}", e))
    }

    /// Get the command type (job_type)
    pub fn command_type(&self) -> &str {
        &self.job.job_type
    }
}

/// Metadata for command serialization.
///
/// Commands implement this trait to provide type information
/// and optional idempotency keys.
pub trait CommandMeta {
    /// The command type name (used as job_type).
    fn command_type(&self) -> &'static str;

    /// Optional idempotency key.
    ///
    /// If provided, ensures only one pending/running job exists with this key.
    fn idempotency_key(&self) -> Option<String> {
        None
    }

    fn priority(&self) -> JobPriority {
        JobPriority::Normal
    }

    /// Maximum retries for this command.
    fn max_retries(&self) -> i32 {
        3
    }
}

/// Serialized form of a command, ready to be stored.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub job_type: &'static str,
    pub args: serde_json::Value,
    pub idempotency_key: Option<String>,
    pub priority: JobPriority,
    pub max_retries: i32,
}

impl JobSpec {
    pub fn from_command<C>(command: &C) -> Result<Self>
    where
        C: Serialize + CommandMeta,
    {
        Ok(Self {
            job_type: command.command_type(),
            args: serde_json::to_value(command)?,
            idempotency_key: command.idempotency_key(),
            priority: command.priority(),
            max_retries: command.max_retries(),
        })
    }

    pub(crate) fn into_job(self) -> Job {
        let mut job = Job::builder()
            .job_type(self.job_type)
            .args(self.args)
            .priority(self.priority)
            .max_retries(self.max_retries)
            .build();
        job.idempotency_key = self.idempotency_key;
        job
    }
}

/// Trait for job queue operations.
///
/// Object safe so it can live in `ServerDeps` as `Arc<dyn JobQueue>`; typed
/// enqueueing goes through [`JobQueueExt`].
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Store a serialized command.
    ///
    /// If the spec carries an idempotency key and a matching pending/running
    /// job exists, returns `EnqueueResult::Duplicate` with the existing job ID.
    async fn enqueue_spec(&self, spec: JobSpec) -> Result<EnqueueResult>;

    /// Claim up to `limit` jobs for processing.
    async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<ClaimedJob>>;

    async fn mark_succeeded(&self, job_id: Uuid) -> Result<()>;

    /// Mark a job as failed with an error.
    ///
    /// If the error kind retries and attempts remain, a retry job is queued
    /// with exponential backoff. Otherwise the job is dead-lettered.
    async fn mark_failed(&self, job_id: Uuid, error: &str, kind: ErrorKind) -> Result<()>;
}

/// Typed enqueue for any [`JobQueue`].
#[async_trait]
pub trait JobQueueExt {
    async fn enqueue<C>(&self, command: C) -> Result<EnqueueResult>
    where
        C: Serialize + CommandMeta + Send + Sync + 'static;
}

#[async_trait]
impl<Q: JobQueue + ?Sized> JobQueueExt for Q {
    async fn enqueue<C>(&self, command: C) -> Result<EnqueueResult>
    where
        C: Serialize + CommandMeta + Send + Sync + 'static,
    {
        let spec = JobSpec::from_command(&command)?;
        self.enqueue_spec(spec).await
    }
}

/// Delay before retry number `retry_count + 1`, capped at one hour.
pub fn retry_backoff(retry_count: i32) -> chrono::Duration {
    let secs = 2i64.pow(retry_count.clamp(0, 12) as u32).min(3600);
    chrono::Duration::seconds(secs)
}

/// PostgreSQL-backed job queue implementation.
pub struct PostgresJobQueue {
    pool: PgPool,
    lease_ms: i64,
}

impl PostgresJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lease_ms: 60_000,
        }
    }
}

#[async_trait]
impl JobQueue for PostgresJobQueue {
    async fn enqueue_spec(&self, spec: JobSpec) -> Result<EnqueueResult> {
        if let Some(key) = &spec.idempotency_key {
            if let Some(existing) = Job::find_active_by_idempotency_key(key, &self.pool).await? {
                debug!(
                    job_id = %existing.id,
                    idempotency_key = %key,
                    "found existing job with idempotency key"
                );
                return Ok(EnqueueResult::Duplicate(existing.id));
            }
        }

        let job_type = spec.job_type;
        let inserted = spec.into_job().insert(&self.pool).await?;

        debug!(job_id = %inserted.id, job_type, "enqueued job");
        Ok(EnqueueResult::Created(inserted.id))
    }

    async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<ClaimedJob>> {
        let jobs = Job::claim_jobs(limit, worker_id, self.lease_ms, &self.pool).await?;
        Ok(jobs.into_iter().map(ClaimedJob::new).collect())
    }

    async fn mark_succeeded(&self, job_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'succeeded',
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str, kind: ErrorKind) -> Result<()> {
        let job = Job::find_by_id(job_id, &self.pool).await?;

        if kind.should_retry() && job.can_retry() {
            let retry_at = Utc::now() + retry_backoff(job.retry_count);

            // Close out the original first so the retry doesn't collide with
            // it on the idempotency key.
            sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'failed',
                    error_message = $1,
                    error_kind = $2,
                    lease_expires_at = NULL,
                    updated_at = NOW()
                WHERE id = $3
                "#,
            )
            .bind(error)
            .bind(kind)
            .bind(job_id)
            .execute(&self.pool)
            .await?;

            job.create_retry(retry_at).insert(&self.pool).await?;
        } else {
            sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'dead_letter',
                    error_message = $1,
                    error_kind = $2,
                    dead_lettered_at = NOW(),
                    lease_expires_at = NULL,
                    updated_at = NOW()
                WHERE id = $3
                "#,
            )
            .bind(error)
            .bind(kind)
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }
}
