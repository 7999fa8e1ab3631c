//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! Scheduled passes never sync anything themselves; they claim due records
//! and enqueue first-page jobs for the JobRunner.
//!
//! ```text
//! Scheduler (WORKSPACE_SCHEDULE_CRON)
//!     └─► update_workspaces() → SyncUsersJob + SyncChannelsJob per due workspace
//!
//! Scheduler (CHANNEL_SCHEDULE_CRON)
//!     └─► schedule_channel_crawls() → CollectMessagesJob per due channel
//! ```

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::common::{DispatchSummary, SyncError};
use crate::domains::slack_sync::actions::schedule_channel_crawls;
use crate::domains::workspace::actions::update_workspaces;
use crate::kernel::ServerDeps;

/// Cron expressions (with seconds) for the two passes.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub workspace_cron: String,
    pub channel_cron: String,
}

/// Start all scheduled tasks
pub async fn start_scheduler(deps: Arc<ServerDeps>, config: ScheduleConfig) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let workspace_deps = deps.clone();
    let workspace_job = Job::new_async(config.workspace_cron.as_str(), move |_uuid, _lock| {
        let deps = workspace_deps.clone();
        Box::pin(async move {
            let _ = run_workspace_update_pass(&deps).await;
        })
    })?;
    scheduler.add(workspace_job).await?;

    let channel_deps = deps.clone();
    let channel_job = Job::new_async(config.channel_cron.as_str(), move |_uuid, _lock| {
        let deps = channel_deps.clone();
        Box::pin(async move {
            let _ = run_channel_crawl_pass(&deps).await;
        })
    })?;
    scheduler.add(channel_job).await?;

    scheduler.start().await?;

    tracing::info!(
        workspace_cron = %config.workspace_cron,
        channel_cron = %config.channel_cron,
        "Scheduled tasks started"
    );
    Ok(scheduler)
}

/// One Workspace Update Scheduler pass. A failed due-list query is reported
/// and the pass ends; the next tick tries again.
pub async fn run_workspace_update_pass(deps: &ServerDeps) -> Result<DispatchSummary, SyncError> {
    tracing::info!("Running workspace update pass");

    let result = update_workspaces(Utc::now(), deps).await;
    log_pass("workspace update", &result, deps);
    result
}

/// One channel crawl scheduler pass.
pub async fn run_channel_crawl_pass(deps: &ServerDeps) -> Result<DispatchSummary, SyncError> {
    tracing::info!("Running channel crawl pass");

    let result = schedule_channel_crawls(Utc::now(), deps).await;
    log_pass("channel crawl", &result, deps);
    result
}

fn log_pass(pass: &str, result: &Result<DispatchSummary, SyncError>, deps: &ServerDeps) {
    match result {
        Ok(summary) => tracing::info!(
            pass,
            due = summary.due,
            dispatched = summary.dispatched,
            skipped = summary.skipped,
            failed = summary.failed,
            "Scheduler pass complete"
        ),
        Err(e) => deps.error_reporter.report(pass, e),
    }
}
