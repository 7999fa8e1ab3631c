//! Job infrastructure for background command execution.
//!
//! - [`PostgresJobQueue`] - Database-backed job queue
//! - [`JobRegistry`] - Maps job types to domain handlers
//! - [`JobRunner`] - Long-running service that polls and executes jobs
//! - [`Job`] - Job model
//!
//! Job structs and their handlers live in their domains; this module only
//! provides the plumbing.

mod job;
mod queue;
mod registry;
mod runner;

pub use job::{ErrorKind, Job, JobPriority, JobStatus};
pub use queue::{
    retry_backoff, ClaimedJob, CommandMeta, EnqueueResult, JobQueue, JobQueueExt, JobSpec,
    PostgresJobQueue,
};
pub use registry::{JobRegistry, SharedJobRegistry};
pub use runner::{classify_error, JobRunner, JobRunnerConfig};
