//! SyncChannelsJob - one page of a workspace's channel listing.

use serde::{Deserialize, Serialize};

use crate::kernel::jobs::CommandMeta;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncChannelsJob {
    pub workspace_id: String,
    #[serde(default)]
    pub cursor: Option<String>,
}

impl SyncChannelsJob {
    pub const JOB_TYPE: &'static str = "slack_sync_channels";

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

impl CommandMeta for SyncChannelsJob {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_meta() {
        let job = SyncChannelsJob::first_page("T1").next_page("abc".into());
        assert_eq!(job.command_type(), "slack_sync_channels");
        assert_eq!(job.cursor.as_deref(), Some("abc"));
        assert_eq!(job.idempotency_key().as_deref(), Some("slack_sync_channels:T1:abc"));
    }
}
