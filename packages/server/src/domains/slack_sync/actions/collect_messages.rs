//! Message history crawl step.
//!
//! History comes back newest first. The step ingests messages until it meets
//! one at or before the channel's watermark, then marks the channel crawled at
//! the run's start time. If the whole page is newer than the watermark and
//! more history exists, it enqueues a continuation that resumes strictly
//! below the oldest message just ingested. Exhausted history also marks the
//! channel crawled. A page that claims more history but carries no readable
//! timestamp leaves the channel alone; the next crawl pass starts over.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::common::{MessageTs, SyncError};
use crate::domains::slack_sync::jobs::CollectMessagesJob;
use crate::domains::slack_sync::models::Message;
use crate::kernel::jobs::JobQueueExt;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOutcome {
    /// Continuation enqueued to fetch history older than `latest`
    Continued { ingested: usize, latest: MessageTs },
    /// Channel marked crawled with `watermark`
    Crawled { ingested: usize, watermark: MessageTs },
    /// No position to continue from; watermark untouched
    Stalled,
}

impl HistoryOutcome {
    pub fn ingested(&self) -> usize {
        match self {
            HistoryOutcome::Continued { ingested, .. } | HistoryOutcome::Crawled { ingested, .. } => {
                *ingested
            }
            HistoryOutcome::Stalled => 0,
        }
    }
}

pub async fn collect_messages(
    job: &CollectMessagesJob,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> Result<HistoryOutcome, SyncError> {
    let started_at = job
        .started_at
        .unwrap_or_else(|| MessageTs::from_datetime(now));
    let latest = job.latest.unwrap_or(started_at);

    let token = deps.auth_cache.token(&job.workspace_id).await?;

    let watermark = deps
        .store
        .get_channel(&job.workspace_id, &job.channel_id)
        .await
        .map_err(SyncError::Store)?
        .map(|channel| channel.latest_crawled)
        .unwrap_or(MessageTs::ZERO);

    let page = deps
        .slack
        .channel_history(
            &token,
            &job.channel_id,
            latest,
            deps.settings.history_page_size,
        )
        .await
        .map_err(SyncError::RemoteApi)?;

    let mut ingested = 0;
    let mut oldest: Option<MessageTs> = None;
    let mut reached_watermark = false;

    for raw in &page.items {
        let message = match Message::from_slack(&job.workspace_id, &job.channel_id, raw, now) {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    workspace_id = %job.workspace_id,
                    channel_id = %job.channel_id,
                    error = %e,
                    "skipping message with unreadable timestamp"
                );
                continue;
            }
        };

        if message.ts <= watermark {
            reached_watermark = true;
            break;
        }

        deps.store
            .upsert_message(&message)
            .await
            .map_err(SyncError::Store)?;

        ingested += 1;
        oldest = Some(oldest.map_or(message.ts, |o| o.min(message.ts)));
    }

    info!(
        workspace_id = %job.workspace_id,
        channel_id = %job.channel_id,
        count = ingested,
        watermark = %watermark,
        "collected messages page"
    );

    if !reached_watermark && page.has_more {
        let Some(oldest) = oldest else {
            warn!(
                workspace_id = %job.workspace_id,
                channel_id = %job.channel_id,
                latest = %latest,
                "history page had no readable timestamp; leaving channel uncrawled"
            );
            return Ok(HistoryOutcome::Stalled);
        };
        deps.jobs
            .enqueue(job.continue_from(oldest, started_at))
            .await
            .map_err(SyncError::Queue)?;
        return Ok(HistoryOutcome::Continued {
            ingested,
            latest: oldest,
        });
    }

    let next_crawl = started_at.to_datetime().unwrap_or(now) + deps.settings.channel_crawl_interval;
    deps.store
        .mark_channel_crawled(&job.workspace_id, &job.channel_id, started_at, next_crawl)
        .await
        .map_err(SyncError::Store)?;

    info!(
        workspace_id = %job.workspace_id,
        channel_id = %job.channel_id,
        watermark = %started_at,
        "channel crawled"
    );

    Ok(HistoryOutcome::Crawled {
        ingested,
        watermark: started_at,
    })
}
