//! CollectMessagesJob - one page of a channel's history.
//!
//! A crawl chain walks history newest-first. The first job carries neither
//! `latest` nor `started_at`; the step fills in its own start time and threads
//! it through every continuation so the whole chain marks the channel crawled
//! at the same instant.

use serde::{Deserialize, Serialize};

use crate::common::MessageTs;
use crate::kernel::jobs::CommandMeta;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectMessagesJob {
    pub workspace_id: String,
    pub channel_id: String,
    /// Fetch messages strictly older than this; `None` means "from the run start"
    #[serde(default)]
    pub latest: Option<MessageTs>,
    /// Start time of the run this step belongs to
    #[serde(default)]
    pub started_at: Option<MessageTs>,
}

impl CollectMessagesJob {
    pub const JOB_TYPE: &'static str = "slack_collect_messages";

    pub fn start(workspace_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            channel_id: channel_id.into(),
            latest: None,
            started_at: None,
        }
    }

    pub fn continue_from(&self, latest: MessageTs, started_at: MessageTs) -> Self {
        Self {
            workspace_id: self.workspace_id.clone(),
            channel_id: self.channel_id.clone(),
            latest: Some(latest),
            started_at: Some(started_at),
        }
    }
}

impl CommandMeta for CollectMessagesJob {
    fn command_type(&self) -> &'static str {
        Self::JOB_TYPE
    }

    fn idempotency_key(&self) -> Option<String> {
        let position = match (self.latest, self.started_at) {
            (Some(latest), Some(started_at)) => format!("{latest}@{started_at}"),
            _ => "head".to_string(),
        };
        Some(format!(
            "{}:{}:{}:{}",
            Self::JOB_TYPE,
            self.workspace_id,
            self.channel_id,
            position
        ))
    }
}
