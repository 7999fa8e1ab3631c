//! Postgres implementation of [`SyncStore`].
//!
//! Thin delegation to the model query functions; all SQL lives on the models.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::SyncStore;
use crate::common::MessageTs;
use crate::domains::slack_sync::models::{Channel, Message, SlackUser};
use crate::domains::workspace::models::{Authorization, SyncResource, Workspace};

#[derive(Clone)]
pub struct PgSyncStore {
    pool: PgPool,
}

impl PgSyncStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SyncStore for PgSyncStore {
    async fn ensure_workspace(&self, workspace: &Workspace) -> Result<()> {
        workspace.insert_if_absent(&self.pool).await
    }

    async fn find_workspaces_due(&self, now: DateTime<Utc>) -> Result<Vec<Workspace>> {
        Workspace::find_due(now, &self.pool).await
    }

    async fn claim_workspace_update(
        &self,
        workspace_id: &str,
        expected: DateTime<Utc>,
        next_update: DateTime<Utc>,
    ) -> Result<bool> {
        Workspace::claim_update(workspace_id, expected, next_update, &self.pool).await
    }

    async fn mark_workspace_synced(
        &self,
        workspace_id: &str,
        resource: SyncResource,
        at: DateTime<Utc>,
    ) -> Result<()> {
        Workspace::mark_synced(workspace_id, resource, at, &self.pool).await
    }

    async fn get_authorization(&self, workspace_id: &str) -> Result<Option<Authorization>> {
        Authorization::find_by_workspace(workspace_id, &self.pool).await
    }

    async fn put_authorization(&self, authorization: &Authorization) -> Result<()> {
        authorization.upsert(&self.pool).await
    }

    async fn upsert_channel(&self, channel: &Channel) -> Result<()> {
        channel.upsert_metadata(&self.pool).await
    }

    async fn get_channel(&self, workspace_id: &str, channel_id: &str) -> Result<Option<Channel>> {
        Channel::find(workspace_id, channel_id, &self.pool).await
    }

    async fn find_channels_due_for_crawl(&self, now: DateTime<Utc>) -> Result<Vec<Channel>> {
        Channel::find_due_for_crawl(now, &self.pool).await
    }

    async fn claim_channel_crawl(
        &self,
        workspace_id: &str,
        channel_id: &str,
        expected: DateTime<Utc>,
        next_crawl: DateTime<Utc>,
    ) -> Result<bool> {
        Channel::claim_crawl(workspace_id, channel_id, expected, next_crawl, &self.pool).await
    }

    async fn mark_channel_crawled(
        &self,
        workspace_id: &str,
        channel_id: &str,
        watermark: MessageTs,
        next_crawl: DateTime<Utc>,
    ) -> Result<()> {
        Channel::mark_crawled(workspace_id, channel_id, watermark, next_crawl, &self.pool).await
    }

    async fn upsert_user(&self, user: &SlackUser) -> Result<()> {
        user.upsert(&self.pool).await
    }

    async fn upsert_message(&self, message: &Message) -> Result<()> {
        message.upsert(&self.pool).await
    }
}
