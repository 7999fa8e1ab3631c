//! Channel crawl scheduler pass.
//!
//! Starts a history crawl chain for every unarchived channel whose
//! `next_crawl` has elapsed. Same claim-then-enqueue shape as the workspace
//! pass.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::common::{DispatchSummary, SyncError};
use crate::domains::slack_sync::jobs::CollectMessagesJob;
use crate::kernel::jobs::{EnqueueResult, JobQueueExt};
use crate::kernel::ServerDeps;

pub async fn schedule_channel_crawls(
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> Result<DispatchSummary, SyncError> {
    let due = deps
        .store
        .find_channels_due_for_crawl(now)
        .await
        .map_err(SyncError::Store)?;

    let mut summary = DispatchSummary {
        due: due.len(),
        ..Default::default()
    };
    let next_crawl = now + deps.settings.channel_crawl_interval;

    for channel in due {
        match deps
            .store
            .claim_channel_crawl(&channel.workspace_id, &channel.id, channel.next_crawl, next_crawl)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                summary.skipped += 1;
                continue;
            }
            Err(e) => {
                deps.error_reporter
                    .report("schedule_channel_crawls.claim", &SyncError::Store(e));
                summary.failed += 1;
                continue;
            }
        }

        match deps
            .jobs
            .enqueue(CollectMessagesJob::start(&channel.workspace_id, &channel.id))
            .await
        {
            Ok(EnqueueResult::Created(_)) => {}
            Ok(EnqueueResult::Duplicate(job_id)) => {
                warn!(
                    workspace_id = %channel.workspace_id,
                    channel_id = %channel.id,
                    job_id = %job_id,
                    "previous crawl chain still queued; not restarted"
                );
            }
            Err(e) => {
                deps.error_reporter
                    .report("schedule_channel_crawls.enqueue", &SyncError::Queue(e));
                summary.failed += 1;
                continue;
            }
        }

        info!(
            workspace_id = %channel.workspace_id,
            channel_id = %channel.id,
            "scheduled channel crawl"
        );
        summary.dispatched += 1;
    }

    Ok(summary)
}
