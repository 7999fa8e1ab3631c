//! Server dependencies for job handlers and actions (using traits for testability)
//!
//! Every external collaborator sits behind a trait so the sync pipeline can be
//! driven against in-memory doubles.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use slack::{Page, SlackService};

use crate::common::MessageTs;
use crate::config::SyncSettings;
use crate::domains::workspace::AuthorizationCache;
use crate::kernel::jobs::JobQueue;
use crate::kernel::{BaseCache, BaseErrorReporter, BaseSlackApi, SyncStore};

// =============================================================================
// SlackService Adapter (implements BaseSlackApi trait)
// =============================================================================

/// Wrapper around SlackService that implements BaseSlackApi trait
pub struct SlackAdapter(pub Arc<SlackService>);

impl SlackAdapter {
    pub fn new(service: Arc<SlackService>) -> Self {
        Self(service)
    }
}

#[async_trait]
impl BaseSlackApi for SlackAdapter {
    async fn list_users(
        &self,
        token: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<slack::Member>> {
        Ok(self.0.users_list(token, cursor.unwrap_or(""), limit).await?)
    }

    async fn list_channels(
        &self,
        token: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<slack::Channel>> {
        Ok(self
            .0
            .conversations_list(token, cursor.unwrap_or(""), limit)
            .await?)
    }

    async fn channel_history(
        &self,
        token: &str,
        channel_id: &str,
        latest: MessageTs,
        limit: u32,
    ) -> Result<Page<slack::Message>> {
        Ok(self
            .0
            .conversations_history(token, channel_id, limit, &latest.to_string())
            .await?)
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Dependencies shared by every job handler, route and scheduled task.
#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn SyncStore>,
    pub slack: Arc<dyn BaseSlackApi>,
    pub jobs: Arc<dyn JobQueue>,
    pub auth_cache: AuthorizationCache,
    pub error_reporter: Arc<dyn BaseErrorReporter>,
    pub settings: SyncSettings,
}

impl ServerDeps {
    pub fn new(
        store: Arc<dyn SyncStore>,
        slack: Arc<dyn BaseSlackApi>,
        jobs: Arc<dyn JobQueue>,
        cache: Arc<dyn BaseCache>,
        error_reporter: Arc<dyn BaseErrorReporter>,
        settings: SyncSettings,
    ) -> Self {
        let auth_cache = AuthorizationCache::new(store.clone(), cache, settings.auth_cache_ttl);
        Self {
            store,
            slack,
            jobs,
            auth_cache,
            error_reporter,
            settings,
        }
    }
}
