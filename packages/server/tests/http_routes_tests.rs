//! Integration tests for the HTTP job and scheduler endpoints.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use server_core::domains::slack_sync::jobs::{SyncChannelsJob, SyncUsersJob};
use server_core::kernel::test_dependencies::{
    slack_member, InMemoryStore, MockSlackApi, SlackCall,
};
use server_core::kernel::TestDependencies;
use server_core::server::sync_routes;
use tower::ServiceExt;

use crate::common::{authorized_store, ts, workspace, CHANNEL, WORKSPACE};

fn app(test: &TestDependencies) -> Router {
    sync_routes().with_state(test.into_deps())
}

async fn call(app: Router, method: Method, uri: &str) -> StatusCode {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap().status()
}

#[tokio::test]
async fn users_endpoint_runs_one_step() {
    let test = TestDependencies::new()
        .mock_store(authorized_store())
        .mock_slack(MockSlackApi::new().with_users_page(vec![slack_member("U1")], Some("abc")));

    let status = call(app(&test), Method::GET, "/_i/1/jobs/users?id=T1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(test.store.users(WORKSPACE).len(), 1);
    let next: Vec<SyncUsersJob> = test.jobs.pending(SyncUsersJob::JOB_TYPE);
    assert_eq!(next[0].cursor.as_deref(), Some("abc"));
}

#[tokio::test]
async fn users_endpoint_passes_cursor_through() {
    let test = TestDependencies::new().mock_store(authorized_store());

    let status = call(app(&test), Method::POST, "/_i/1/jobs/users?id=T1&cursor=dXNlcjpVMDY").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        test.slack.calls(),
        vec![SlackCall::Users {
            cursor: Some("dXNlcjpVMDY".to_string())
        }]
    );
}

#[tokio::test]
async fn missing_credentials_answer_ok_so_the_queue_stops() {
    let test = TestDependencies::new();

    let status = call(app(&test), Method::GET, "/_i/1/jobs/channels?id=T1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(test.store.write_count(), 0);
    assert_eq!(test.error_reporter.reports().len(), 1);
}

#[tokio::test]
async fn remote_failure_answers_server_error_for_redelivery() {
    let test = TestDependencies::new()
        .mock_store(authorized_store())
        .mock_slack(MockSlackApi::new().with_channels_error("ratelimited"));

    let status = call(app(&test), Method::GET, "/_i/1/jobs/channels?id=T1").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let pending: Vec<SyncChannelsJob> = test.jobs.pending(SyncChannelsJob::JOB_TYPE);
    assert!(pending.is_empty());
}

#[tokio::test]
async fn messages_endpoint_parses_latest_and_run_start() {
    let test = TestDependencies::new()
        .mock_store(authorized_store())
        .mock_slack(MockSlackApi::new().with_history_page(&["19.000000"], false));

    let status = call(
        app(&test),
        Method::GET,
        "/_i/1/jobs/messages?id=T1&c=C1&l=20.000000&s=1000.000000",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        test.slack.calls(),
        vec![SlackCall::History {
            channel_id: CHANNEL.to_string(),
            latest: ts(20)
        }]
    );
    let channel = test.store.channel(WORKSPACE, CHANNEL).unwrap();
    assert_eq!(channel.latest_crawled, ts(1000));
}

#[tokio::test]
async fn malformed_parameters_are_rejected() {
    let test = TestDependencies::new().mock_store(authorized_store());

    let no_id = call(app(&test), Method::GET, "/_i/1/jobs/users").await;
    let bad_ts = call(
        app(&test),
        Method::GET,
        "/_i/1/jobs/messages?id=T1&c=C1&l=yesterday",
    )
    .await;

    assert_eq!(no_id, StatusCode::BAD_REQUEST);
    assert_eq!(bad_ts, StatusCode::BAD_REQUEST);
    assert!(test.slack.calls().is_empty());
}

#[tokio::test]
async fn scheduler_endpoint_runs_one_pass() {
    let test = TestDependencies::new().mock_store(
        InMemoryStore::new().with_workspace(workspace(WORKSPACE, Utc::now() - Duration::minutes(1))),
    );

    let status = call(app(&test), Method::POST, "/_i/1/scheduler/workspaces").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(test.jobs.pending_count(), 2);
}

#[tokio::test]
async fn scheduler_endpoint_reports_store_outage() {
    let test = TestDependencies::new();
    test.store.fail_reads(true);

    let status = call(app(&test), Method::GET, "/_i/1/scheduler/messages").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
