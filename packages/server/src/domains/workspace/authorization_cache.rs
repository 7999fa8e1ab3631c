//! Read-through, write-through access to workspace credentials.
//!
//! Every sync step resolves its token here, so a warm cache keeps the store
//! out of the hot path. Updates write the store first and then refresh the
//! cache entry, so a rotated token is visible to the next step.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::common::SyncError;
use crate::domains::workspace::models::{Authorization, AuthorizationUpdate, Workspace};
use crate::kernel::{BaseCache, SyncStore};

const CACHE_KEY_PREFIX: &str = "workspace.auth.";

pub fn cache_key(workspace_id: &str) -> String {
    format!("{CACHE_KEY_PREFIX}{workspace_id}")
}

#[derive(Clone)]
pub struct AuthorizationCache {
    store: Arc<dyn SyncStore>,
    cache: Arc<dyn BaseCache>,
    ttl: Duration,
}

impl AuthorizationCache {
    pub fn new(store: Arc<dyn SyncStore>, cache: Arc<dyn BaseCache>, ttl: Duration) -> Self {
        Self { store, cache, ttl }
    }

    /// Cached record, else the stored one (which is then cached).
    pub async fn get(&self, workspace_id: &str) -> Result<Authorization, SyncError> {
        let key = cache_key(workspace_id);

        if let Some(value) = self.cache.get(&key).await {
            match serde_json::from_value::<Authorization>(value) {
                Ok(auth) => {
                    debug!(workspace_id, "authorization cache hit");
                    return Ok(auth);
                }
                Err(e) => {
                    warn!(workspace_id, error = %e, "dropping unreadable cached authorization");
                    self.cache.delete(&key).await;
                }
            }
        }

        let auth = self
            .store
            .get_authorization(workspace_id)
            .await
            .map_err(SyncError::Store)?
            .ok_or_else(|| SyncError::AuthorizationMissing(workspace_id.to_string()))?;

        self.remember(&auth).await;
        Ok(auth)
    }

    pub async fn token(&self, workspace_id: &str) -> Result<String, SyncError> {
        Ok(self.get(workspace_id).await?.access_token)
    }

    /// Create or overlay the workspace's credentials.
    ///
    /// A newly seen workspace also gets a `workspaces` row that is due
    /// immediately, so the next scheduler pass starts its first sync.
    pub async fn update(
        &self,
        workspace_id: &str,
        update: AuthorizationUpdate,
    ) -> Result<Authorization, SyncError> {
        let existing = self
            .store
            .get_authorization(workspace_id)
            .await
            .map_err(SyncError::Store)?;

        let now = Utc::now();
        let auth = Authorization::apply(existing, workspace_id, update, now);

        self.store
            .put_authorization(&auth)
            .await
            .map_err(SyncError::Store)?;
        self.store
            .ensure_workspace(&Workspace::new(workspace_id, auth.name.clone(), now))
            .await
            .map_err(SyncError::Store)?;

        self.remember(&auth).await;
        Ok(auth)
    }

    async fn remember(&self, auth: &Authorization) {
        match serde_json::to_value(auth) {
            Ok(value) => {
                self.cache
                    .set(&cache_key(&auth.workspace_id), value, self.ttl)
                    .await
            }
            Err(e) => warn!(workspace_id = %auth.workspace_id, error = %e, "failed to cache authorization"),
        }
    }
}
