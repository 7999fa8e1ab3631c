//! Job handlers for the slack sync domain.
//!
//! Registered with the JobRegistry and called by the JobRunner; the HTTP job
//! endpoints call the same handlers directly.
//!
//! ```text
//! SyncUsersJob       → sync_users()       → enqueue next page | mark users synced
//! SyncChannelsJob    → sync_channels()    → enqueue next page | mark channels synced
//! CollectMessagesJob → collect_messages() → enqueue older page | mark channel crawled
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::common::SyncError;
use crate::domains::slack_sync::actions::{
    collect_messages, sync_channels, sync_users, HistoryOutcome, PageOutcome,
};
use crate::domains::slack_sync::jobs::{CollectMessagesJob, SyncChannelsJob, SyncUsersJob};
use crate::kernel::jobs::JobRegistry;
use crate::kernel::ServerDeps;

pub async fn handle_sync_users(
    job: SyncUsersJob,
    deps: Arc<ServerDeps>,
) -> Result<PageOutcome, SyncError> {
    info!(
        workspace_id = %job.workspace_id,
        cursor = ?job.cursor,
        "Handling sync users job"
    );

    let result = sync_users(&job, Utc::now(), &deps).await;
    if let Err(e) = &result {
        deps.error_reporter.report(SyncUsersJob::JOB_TYPE, e);
    }
    result
}

pub async fn handle_sync_channels(
    job: SyncChannelsJob,
    deps: Arc<ServerDeps>,
) -> Result<PageOutcome, SyncError> {
    info!(
        workspace_id = %job.workspace_id,
        cursor = ?job.cursor,
        "Handling sync channels job"
    );

    let result = sync_channels(&job, Utc::now(), &deps).await;
    if let Err(e) = &result {
        deps.error_reporter.report(SyncChannelsJob::JOB_TYPE, e);
    }
    result
}

pub async fn handle_collect_messages(
    job: CollectMessagesJob,
    deps: Arc<ServerDeps>,
) -> Result<HistoryOutcome, SyncError> {
    info!(
        workspace_id = %job.workspace_id,
        channel_id = %job.channel_id,
        latest = ?job.latest,
        "Handling collect messages job"
    );

    let result = collect_messages(&job, Utc::now(), &deps).await;
    if let Err(e) = &result {
        deps.error_reporter.report(CollectMessagesJob::JOB_TYPE, e);
    }
    result
}

/// Call this at startup to register handlers for all slack sync jobs.
pub fn register_slack_sync_jobs(registry: &mut JobRegistry) {
    registry.register(SyncUsersJob::JOB_TYPE, handle_sync_users);
    registry.register(SyncChannelsJob::JOB_TYPE, handle_sync_channels);
    registry.register(CollectMessagesJob::JOB_TYPE, handle_collect_messages);
}
