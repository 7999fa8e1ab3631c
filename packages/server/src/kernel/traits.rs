// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Crawl decisions live in domain actions that call through these traits.
//
// Naming convention: Base* for external services, *Store for persistence

use std::fmt::Display;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use slack::Page;

use crate::common::MessageTs;
use crate::domains::slack_sync::models::{Channel, Message, SlackUser};
use crate::domains::workspace::models::{Authorization, SyncResource, Workspace};

// =============================================================================
// Sync Store (durable keyed store)
// =============================================================================

/// Durable store for workspaces, credentials and synced entities.
///
/// Every write is an idempotent upsert keyed by natural identifiers, so a
/// redelivered step converges to the same state.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Insert the workspace unless one with the same id exists.
    async fn ensure_workspace(&self, workspace: &Workspace) -> Result<()>;

    /// Workspaces whose `next_update` is at or before `now`.
    async fn find_workspaces_due(&self, now: DateTime<Utc>) -> Result<Vec<Workspace>>;

    /// Compare-and-swap `next_update` from `expected` to `next_update`.
    async fn claim_workspace_update(
        &self,
        workspace_id: &str,
        expected: DateTime<Utc>,
        next_update: DateTime<Utc>,
    ) -> Result<bool>;

    async fn mark_workspace_synced(
        &self,
        workspace_id: &str,
        resource: SyncResource,
        at: DateTime<Utc>,
    ) -> Result<()>;

    async fn get_authorization(&self, workspace_id: &str) -> Result<Option<Authorization>>;

    async fn put_authorization(&self, authorization: &Authorization) -> Result<()>;

    /// Upsert channel metadata without touching its crawl bookkeeping.
    async fn upsert_channel(&self, channel: &Channel) -> Result<()>;

    async fn get_channel(&self, workspace_id: &str, channel_id: &str) -> Result<Option<Channel>>;

    /// Unarchived channels whose `next_crawl` is at or before `now`.
    async fn find_channels_due_for_crawl(&self, now: DateTime<Utc>) -> Result<Vec<Channel>>;

    /// Compare-and-swap `next_crawl` from `expected` to `next_crawl`.
    async fn claim_channel_crawl(
        &self,
        workspace_id: &str,
        channel_id: &str,
        expected: DateTime<Utc>,
        next_crawl: DateTime<Utc>,
    ) -> Result<bool>;

    /// Raise the channel watermark to at least `watermark` and set `next_crawl`.
    async fn mark_channel_crawled(
        &self,
        workspace_id: &str,
        channel_id: &str,
        watermark: MessageTs,
        next_crawl: DateTime<Utc>,
    ) -> Result<()>;

    async fn upsert_user(&self, user: &SlackUser) -> Result<()>;

    async fn upsert_message(&self, message: &Message) -> Result<()>;
}

// =============================================================================
// Slack API Trait (Infrastructure - remote paginated API)
// =============================================================================

#[async_trait]
pub trait BaseSlackApi: Send + Sync {
    /// One page of members. `None` requests the first page.
    async fn list_users(
        &self,
        token: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<slack::Member>>;

    /// One page of public and private channels.
    async fn list_channels(
        &self,
        token: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<slack::Channel>>;

    /// One page of history strictly older than `latest`, newest first.
    async fn channel_history(
        &self,
        token: &str,
        channel_id: &str,
        latest: MessageTs,
        limit: u32,
    ) -> Result<Page<slack::Message>>;
}

// =============================================================================
// Cache Trait (Infrastructure - fast ephemeral cache)
// =============================================================================

#[async_trait]
pub trait BaseCache: Send + Sync {
    /// Cached value, or `None` on a miss or after the entry expired.
    async fn get(&self, key: &str) -> Option<serde_json::Value>;

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration);

    async fn delete(&self, key: &str);
}

// =============================================================================
// Error Reporting Trait (Infrastructure - fire-and-forget sink)
// =============================================================================

pub trait BaseErrorReporter: Send + Sync {
    /// Report an error. Never blocks and never fails.
    fn report(&self, context: &str, error: &dyn Display);
}
