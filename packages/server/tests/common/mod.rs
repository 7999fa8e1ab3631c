//! Shared fixtures for the sync pipeline integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use server_core::common::MessageTs;
use server_core::domains::slack_sync::effects::register_slack_sync_jobs;
use server_core::domains::slack_sync::models::Channel;
use server_core::domains::workspace::models::{Authorization, Workspace};
use server_core::kernel::jobs::{JobRegistry, JobRunner, JobRunnerConfig};
use server_core::kernel::test_dependencies::InMemoryStore;
use server_core::kernel::{ServerDeps, TestDependencies};

pub const WORKSPACE: &str = "T1";
pub const CHANNEL: &str = "C1";

pub fn authorization(workspace_id: &str, token: &str) -> Authorization {
    let now = Utc::now();
    Authorization {
        workspace_id: workspace_id.to_string(),
        name: format!("{workspace_id} workspace"),
        access_token: token.to_string(),
        scope: "channels:history,users:read".to_string(),
        authorizing_user: "U0".to_string(),
        installer_user: "U0".to_string(),
        created: now,
        updated: now,
    }
}

pub fn workspace(id: &str, next_update: DateTime<Utc>) -> Workspace {
    Workspace::new(id, format!("{id} workspace"), next_update)
}

pub fn channel(workspace_id: &str, id: &str, watermark: MessageTs) -> Channel {
    let now = Utc::now();
    Channel {
        workspace_id: workspace_id.to_string(),
        id: id.to_string(),
        name: id.to_lowercase(),
        topic: String::new(),
        purpose: String::new(),
        is_archived: false,
        is_private: false,
        latest_crawled: watermark,
        next_crawl: now - Duration::minutes(1),
        updated_at: now,
    }
}

/// A store holding one authorized workspace
pub fn authorized_store() -> InMemoryStore {
    InMemoryStore::new()
        .with_workspace(workspace(WORKSPACE, Utc::now() + Duration::hours(1)))
        .with_authorization(authorization(WORKSPACE, "xoxb-1"))
}

pub fn ts(secs: i64) -> MessageTs {
    MessageTs::from_secs(secs)
}

/// Run every ready job through the real registry until the queue is idle.
/// Returns the number of jobs executed.
pub async fn drain(test: &TestDependencies, deps: &Arc<ServerDeps>) -> usize {
    let mut registry = JobRegistry::new();
    register_slack_sync_jobs(&mut registry);

    let runner = JobRunner::with_config(
        test.jobs.clone(),
        Arc::new(registry),
        deps.clone(),
        JobRunnerConfig {
            batch_size: 1,
            ..Default::default()
        },
    );

    let mut executed = 0;
    loop {
        let claimed = runner.run_once().await.expect("claim should not fail");
        if claimed == 0 {
            return executed;
        }
        executed += claimed;
    }
}
