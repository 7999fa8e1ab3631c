//! Users and channels sync steps.
//!
//! Each step fetches one page, upserts every item, then either enqueues the
//! next page or, when the listing is exhausted, marks the workspace's
//! resource as synced. A full pass is a complete refresh, so there is no
//! watermark.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::common::SyncError;
use crate::domains::slack_sync::jobs::{SyncChannelsJob, SyncUsersJob};
use crate::domains::slack_sync::models::{Channel, SlackUser};
use crate::domains::workspace::models::SyncResource;
use crate::kernel::jobs::JobQueueExt;
use crate::kernel::ServerDeps;

/// What a listing step did after upserting its page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// More pages remain; a job for `next_cursor` was enqueued
    Continued { count: usize, next_cursor: String },
    /// Listing exhausted; the resource was marked synced
    Completed { count: usize },
}

impl PageOutcome {
    pub fn count(&self) -> usize {
        match self {
            PageOutcome::Continued { count, .. } | PageOutcome::Completed { count } => *count,
        }
    }
}

pub async fn sync_users(
    job: &SyncUsersJob,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> Result<PageOutcome, SyncError> {
    let token = deps.auth_cache.token(&job.workspace_id).await?;

    let page = deps
        .slack
        .list_users(&token, job.cursor.as_deref(), deps.settings.users_page_size)
        .await
        .map_err(SyncError::RemoteApi)?;

    for member in &page.items {
        let user = SlackUser::from_slack(&job.workspace_id, member, now);
        deps.store
            .upsert_user(&user)
            .await
            .map_err(SyncError::Store)?;
    }

    let count = page.items.len();
    info!(workspace_id = %job.workspace_id, count, "synced users page");

    match page.next_cursor {
        Some(next_cursor) => {
            deps.jobs
                .enqueue(job.next_page(next_cursor.clone()))
                .await
                .map_err(SyncError::Queue)?;
            Ok(PageOutcome::Continued { count, next_cursor })
        }
        None => {
            deps.store
                .mark_workspace_synced(&job.workspace_id, SyncResource::Users, now)
                .await
                .map_err(SyncError::Store)?;
            Ok(PageOutcome::Completed { count })
        }
    }
}

pub async fn sync_channels(
    job: &SyncChannelsJob,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> Result<PageOutcome, SyncError> {
    let token = deps.auth_cache.token(&job.workspace_id).await?;

    let page = deps
        .slack
        .list_channels(&token, job.cursor.as_deref(), deps.settings.channels_page_size)
        .await
        .map_err(SyncError::RemoteApi)?;

    for listing in &page.items {
        let channel = Channel::from_slack(&job.workspace_id, listing, now);
        deps.store
            .upsert_channel(&channel)
            .await
            .map_err(SyncError::Store)?;
    }

    let count = page.items.len();
    info!(workspace_id = %job.workspace_id, count, "synced channels page");

    match page.next_cursor {
        Some(next_cursor) => {
            deps.jobs
                .enqueue(job.next_page(next_cursor.clone()))
                .await
                .map_err(SyncError::Queue)?;
            Ok(PageOutcome::Continued { count, next_cursor })
        }
        None => {
            deps.store
                .mark_workspace_synced(&job.workspace_id, SyncResource::Channels, now)
                .await
                .map_err(SyncError::Store)?;
            Ok(PageOutcome::Completed { count })
        }
    }
}
