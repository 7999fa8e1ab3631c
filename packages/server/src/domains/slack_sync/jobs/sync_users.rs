//! SyncUsersJob - one page of a workspace's member listing.

use serde::{Deserialize, Serialize};

use crate::kernel::jobs::CommandMeta;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncUsersJob {
    pub workspace_id: String,
    /// Continuation token from the previous page; `None` starts a new pass
    #[serde(default)]
    pub cursor: Option<String>,
}

impl SyncUsersJob {
    pub const JOB_TYPE: &'static str = "slack_sync_users";

    pub fn first_page(workspace_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            cursor: None,
        }
    }

    pub fn next_page(&self, cursor: String) -> Self {
        Self {
            workspace_id: self.workspace_id.clone(),
            cursor: Some(cursor),
        }
    }
}

impl CommandMeta for SyncUsersJob {
    fn command_type(&self) -> &'static str {
        Self::JOB_TYPE
    }

    fn idempotency_key(&self) -> Option<String> {
        Some(format!(
            "{}:{}:{}",
            Self::JOB_TYPE,
            self.workspace_id,
            self.cursor.as_deref().unwrap_or("-")
        ))
    }
}
