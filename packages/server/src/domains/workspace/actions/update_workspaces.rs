//! Workspace Update Scheduler pass.
//!
//! Finds workspaces whose `next_update` has elapsed and starts a users sync
//! and a channels sync for each. The claim (advancing `next_update`) happens
//! before the enqueue and is a compare-and-swap on the value just read, so two
//! overlapping passes can't both dispatch the same workspace.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::common::{DispatchSummary, SyncError};
use crate::domains::slack_sync::jobs::{SyncChannelsJob, SyncUsersJob};
use crate::kernel::jobs::{EnqueueResult, JobQueueExt};
use crate::kernel::ServerDeps;

pub async fn update_workspaces(
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> Result<DispatchSummary, SyncError> {
    let due = deps
        .store
        .find_workspaces_due(now)
        .await
        .map_err(SyncError::Store)?;

    let mut summary = DispatchSummary {
        due: due.len(),
        ..Default::default()
    };
    let next_update = now + deps.settings.workspace_update_interval;

    for workspace in due {
        match deps
            .store
            .claim_workspace_update(&workspace.id, workspace.next_update, next_update)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                info!(workspace_id = %workspace.id, "workspace already claimed by another pass");
                summary.skipped += 1;
                continue;
            }
            Err(e) => {
                deps.error_reporter
                    .report("update_workspaces.claim", &SyncError::Store(e));
                summary.failed += 1;
                continue;
            }
        }

        if let Err(e) = dispatch_workspace(&workspace.id, deps).await {
            // next_update already moved; the next due pass picks it up again
            warn!(workspace_id = %workspace.id, error = %e, "failed to dispatch workspace sync");
            deps.error_reporter.report("update_workspaces.enqueue", &e);
            summary.failed += 1;
            continue;
        }

        info!(
            workspace_id = %workspace.id,
            next_update = %next_update,
            "dispatched workspace sync"
        );
        summary.dispatched += 1;
    }

    Ok(summary)
}

async fn dispatch_workspace(workspace_id: &str, deps: &ServerDeps) -> Result<(), SyncError> {
    let users = deps
        .jobs
        .enqueue(SyncUsersJob::first_page(workspace_id))
        .await
        .map_err(SyncError::Queue)?;
    let channels = deps
        .jobs
        .enqueue(SyncChannelsJob::first_page(workspace_id))
        .await
        .map_err(SyncError::Queue)?;

    for (job_type, result) in [
        (SyncUsersJob::JOB_TYPE, users),
        (SyncChannelsJob::JOB_TYPE, channels),
    ] {
        if let EnqueueResult::Duplicate(job_id) = result {
            warn!(
                workspace_id,
                job_type,
                job_id = %job_id,
                "previous sync chain still queued; not restarted"
            );
        }
    }
    Ok(())
}
