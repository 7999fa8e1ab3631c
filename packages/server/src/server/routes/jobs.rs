//! HTTP job endpoints.
//!
//! An HTTP-driven queue redelivers on any non-2xx answer, so only retryable
//! failures map to 500. Permanent failures (no credentials) answer 200 and
//! the chain stops there.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::common::{MessageTs, SyncError};
use crate::domains::slack_sync::effects::{
    handle_collect_messages, handle_sync_channels, handle_sync_users,
};
use crate::domains::slack_sync::jobs::{CollectMessagesJob, SyncChannelsJob, SyncUsersJob};
use crate::kernel::ServerDeps;

#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    pub id: String,
    pub cursor: Option<String>,
}

impl ListingQuery {
    fn cursor(self) -> (String, Option<String>) {
        let cursor = self.cursor.filter(|c| !c.is_empty());
        (self.id, cursor)
    }
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub id: String,
    pub c: String,
    pub l: Option<MessageTs>,
    pub s: Option<MessageTs>,
}

pub(crate) fn status_for<T>(result: &Result<T, SyncError>) -> StatusCode {
    match result {
        Err(e) if e.is_retryable() => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    }
}

pub async fn sync_users_handler(
    State(deps): State<Arc<ServerDeps>>,
    Query(query): Query<ListingQuery>,
) -> StatusCode {
    let (workspace_id, cursor) = query.cursor();
    let job = SyncUsersJob {
        workspace_id,
        cursor,
    };
    status_for(&handle_sync_users(job, deps).await)
}

pub async fn sync_channels_handler(
    State(deps): State<Arc<ServerDeps>>,
    Query(query): Query<ListingQuery>,
) -> StatusCode {
    let (workspace_id, cursor) = query.cursor();
    let job = SyncChannelsJob {
        workspace_id,
        cursor,
    };
    status_for(&handle_sync_channels(job, deps).await)
}

pub async fn collect_messages_handler(
    State(deps): State<Arc<ServerDeps>>,
    Query(query): Query<MessagesQuery>,
) -> StatusCode {
    let job = CollectMessagesJob {
        workspace_id: query.id,
        channel_id: query.c,
        latest: query.l,
        started_at: query.s,
    };
    status_for(&handle_collect_messages(job, deps).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_retryable_failures_are_server_errors() {
        let ok: Result<(), SyncError> = Ok(());
        assert_eq!(status_for(&ok), StatusCode::OK);

        let missing: Result<(), SyncError> = Err(SyncError::AuthorizationMissing("T1".into()));
        assert_eq!(status_for(&missing), StatusCode::OK);

        let remote: Result<(), SyncError> =
            Err(SyncError::RemoteApi(anyhow::anyhow!("rate limited")));
        assert_eq!(status_for(&remote), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn empty_cursor_means_first_page() {
        let query = ListingQuery {
            id: "T1".into(),
            cursor: Some(String::new()),
        };
        assert_eq!(query.cursor(), ("T1".to_string(), None));
    }
}
