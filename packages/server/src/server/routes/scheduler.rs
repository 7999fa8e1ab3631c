use std::sync::Arc;

use axum::{extract::State, http::StatusCode};

use super::jobs::status_for;
use crate::kernel::scheduled_tasks::{run_channel_crawl_pass, run_workspace_update_pass};
use crate::kernel::ServerDeps;

/// Run one Workspace Update Scheduler pass on demand
pub async fn workspace_update_pass_handler(State(deps): State<Arc<ServerDeps>>) -> StatusCode {
    status_for(&run_workspace_update_pass(&deps).await)
}

/// Run one channel crawl scheduler pass on demand
pub async fn channel_crawl_pass_handler(State(deps): State<Arc<ServerDeps>>) -> StatusCode {
    status_for(&run_channel_crawl_pass(&deps).await)
}
