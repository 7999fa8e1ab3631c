//! Job runner service for processing background jobs.
//!
//! ```text
//! JobRunner
//!     │
//!     ├─► Poll DB (claim jobs via JobQueue)
//!     ├─► Execute via JobRegistry (deserialize + call handler)
//!     └─► Mark succeeded/failed (JobQueue handles retries)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::queue::{ClaimedJob, JobQueue};
use super::registry::SharedJobRegistry;
use super::ErrorKind;
use crate::common::SyncError;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone)]
pub struct JobRunnerConfig {
    /// Maximum number of jobs to claim at once
    pub batch_size: i64,
    /// How long to wait when no jobs are available
    pub poll_interval: Duration,
    pub worker_id: String,
}

impl Default for JobRunnerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            poll_interval: Duration::from_secs(5),
            worker_id: format!("runner-{}", Uuid::new_v4()),
        }
    }
}

/// Background service that processes jobs from the queue.
///
/// Retries are handled by the queue's `mark_failed` implementation; the
/// runner only classifies the failure.
pub struct JobRunner {
    job_queue: Arc<dyn JobQueue>,
    registry: SharedJobRegistry,
    deps: Arc<ServerDeps>,
    config: JobRunnerConfig,
    shutdown: Arc<AtomicBool>,
}

impl JobRunner {
    pub fn new(
        job_queue: Arc<dyn JobQueue>,
        registry: SharedJobRegistry,
        deps: Arc<ServerDeps>,
    ) -> Self {
        Self::with_config(job_queue, registry, deps, JobRunnerConfig::default())
    }

    pub fn with_config(
        job_queue: Arc<dyn JobQueue>,
        registry: SharedJobRegistry,
        deps: Arc<ServerDeps>,
        config: JobRunnerConfig,
    ) -> Self {
        Self {
            job_queue,
            registry,
            deps,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Call `store(true, Ordering::SeqCst)` on the returned handle to stop the loop.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Run the job runner until shutdown is requested.
    pub async fn run(self) -> Result<()> {
        info!(
            worker_id = %self.config.worker_id,
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "job runner starting"
        );

        while !self.is_shutdown_requested() {
            match self.run_once().await {
                Ok(0) => tokio::time::sleep(self.config.poll_interval).await,
                Ok(count) => debug!(count, "processed jobs"),
                Err(e) => {
                    error!(error = %e, "failed to claim jobs");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        info!(worker_id = %self.config.worker_id, "job runner stopped");
        Ok(())
    }

    /// Claim one batch and execute it. Returns the number of jobs claimed.
    pub async fn run_once(&self) -> Result<usize> {
        let jobs = self
            .job_queue
            .claim(&self.config.worker_id, self.config.batch_size)
            .await?;

        let count = jobs.len();
        for job in jobs {
            if self.is_shutdown_requested() {
                break;
            }
            self.execute(job).await;
        }

        Ok(count)
    }

    async fn execute(&self, job: ClaimedJob) {
        let job_id = job.id;
        let job_type = job.command_type().to_string();

        debug!(job_id = %job_id, job_type = %job_type, "executing job");

        match self.registry.execute(&job, self.deps.clone()).await {
            Ok(()) => {
                info!(job_id = %job_id, job_type = %job_type, "job succeeded");
                if let Err(e) = self.job_queue.mark_succeeded(job_id).await {
                    error!(job_id = %job_id, error = %e, "failed to mark job as succeeded");
                }
            }
            Err(e) => {
                let error_kind = classify_error(&e);
                warn!(
                    job_id = %job_id,
                    job_type = %job_type,
                    error = %e,
                    error_kind = ?error_kind,
                    "job failed"
                );

                if let Err(mark_err) = self
                    .job_queue
                    .mark_failed(job_id, &format!("{e:#}"), error_kind)
                    .await
                {
                    error!(job_id = %job_id, error = %mark_err, "failed to mark job as failed");
                }
            }
        }
    }

    /// Run until Ctrl+C.
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

/// Classify an error to determine retry behavior.
///
/// Sync failures carry their own kind. Anything else (unknown job type, bad
/// args) is treated as permanent when it looks like a decoding problem and
/// as transient otherwise.
pub fn classify_error(error: &anyhow::Error) -> ErrorKind {
    if let Some(sync_error) = error.downcast_ref::<SyncError>() {
        return sync_error.error_kind();
    }

    let error_str = error.to_string().to_lowercase();
    if error_str.contains("deserialize")
        || error_str.contains("unknown job type")
        || error_str.contains("has no args")
    {
        return ErrorKind::NonRetryable;
    }

    ErrorKind::Retryable
}
