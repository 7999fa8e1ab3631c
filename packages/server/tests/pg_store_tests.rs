//! Postgres store and queue tests.
//!
//! These need a live database and are skipped unless `TEST_DATABASE_URL` is
//! set. Each test works in its own workspace id so runs can share a database.

mod common;

use chrono::{Duration, Utc};
use server_core::domains::slack_sync::jobs::SyncUsersJob;
use server_core::domains::slack_sync::models::{Channel, Message};
use server_core::domains::workspace::models::{Authorization, AuthorizationUpdate, SyncResource};
use server_core::kernel::jobs::{ErrorKind, Job, JobQueue, JobQueueExt, JobStatus, PostgresJobQueue};
use server_core::kernel::test_dependencies::{slack_channel, slack_message};
use server_core::kernel::{PgSyncStore, SyncStore};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::{authorization, ts, workspace};

async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("Failed to connect to TEST_DATABASE_URL");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    Some(pool)
}

fn unique_workspace() -> String {
    format!("T{}", Uuid::new_v4().simple())
}

#[tokio::test]
async fn channel_watermark_only_moves_forward() {
    let Some(pool) = test_pool().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let store = PgSyncStore::new(pool);
    let ws = unique_workspace();
    let next = Utc::now() + Duration::hours(1);

    store
        .upsert_channel(&Channel::from_slack(&ws, &slack_channel("C1"), Utc::now()))
        .await
        .unwrap();
    store.mark_channel_crawled(&ws, "C1", ts(2_000), next).await.unwrap();
    store.mark_channel_crawled(&ws, "C1", ts(1_000), next).await.unwrap();

    let channel = store.get_channel(&ws, "C1").await.unwrap().unwrap();
    assert_eq!(channel.latest_crawled, ts(2_000));
}

#[tokio::test]
async fn channel_metadata_upsert_keeps_crawl_state() {
    let Some(pool) = test_pool().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let store = PgSyncStore::new(pool);
    let ws = unique_workspace();

    store
        .mark_channel_crawled(&ws, "C1", ts(500), Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    let mut renamed = slack_channel("C1");
    renamed.name = "general".to_string();
    store
        .upsert_channel(&Channel::from_slack(&ws, &renamed, Utc::now()))
        .await
        .unwrap();

    let channel = store.get_channel(&ws, "C1").await.unwrap().unwrap();
    assert_eq!(channel.name, "general");
    assert_eq!(channel.latest_crawled, ts(500));
}

#[tokio::test]
async fn workspace_claim_is_compare_and_swap() {
    let Some(pool) = test_pool().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let store = PgSyncStore::new(pool);
    let ws = unique_workspace();
    let now = Utc::now();

    store
        .ensure_workspace(&workspace(&ws, now - Duration::minutes(1)))
        .await
        .unwrap();
    let due = store.find_workspaces_due(now).await.unwrap();
    let ours = due.into_iter().find(|w| w.id == ws).unwrap();

    let next = now + Duration::hours(24);
    assert!(store
        .claim_workspace_update(&ws, ours.next_update, next)
        .await
        .unwrap());
    assert!(!store
        .claim_workspace_update(&ws, ours.next_update, next)
        .await
        .unwrap());

    store
        .mark_workspace_synced(&ws, SyncResource::Users, now)
        .await
        .unwrap();
    let due_again = store.find_workspaces_due(now).await.unwrap();
    assert!(due_again.iter().all(|w| w.id != ws));
}

#[tokio::test]
async fn message_upsert_is_idempotent() {
    let Some(pool) = test_pool().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let store = PgSyncStore::new(pool.clone());
    let ws = unique_workspace();
    let message = Message::from_slack(&ws, "C1", &slack_message("30.000100"), Utc::now()).unwrap();

    store.upsert_message(&message).await.unwrap();
    store.upsert_message(&message).await.unwrap();

    let stored = Message::find_by_channel(&ws, "C1", &pool).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].ts.to_string(), "30.000100");
}

#[tokio::test]
async fn authorization_round_trips() {
    let Some(pool) = test_pool().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let store = PgSyncStore::new(pool);
    let ws = unique_workspace();

    store
        .put_authorization(&authorization(&ws, "xoxb-1"))
        .await
        .unwrap();
    let loaded = store.get_authorization(&ws).await.unwrap().unwrap();
    assert_eq!(loaded.access_token, "xoxb-1");

    let updated = Authorization::apply(
        Some(loaded),
        &ws,
        AuthorizationUpdate {
            access_token: "xoxb-2".to_string(),
            ..Default::default()
        },
        Utc::now(),
    );
    store.put_authorization(&updated).await.unwrap();

    let reloaded = store.get_authorization(&ws).await.unwrap().unwrap();
    assert_eq!(reloaded.access_token, "xoxb-2");
    assert_eq!(reloaded.installer_user, "U0");
}

#[tokio::test]
async fn queue_deduplicates_active_jobs() {
    let Some(pool) = test_pool().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let queue = PostgresJobQueue::new(pool);
    let ws = unique_workspace();

    let first = queue.enqueue(SyncUsersJob::first_page(&ws)).await.unwrap();
    let second = queue.enqueue(SyncUsersJob::first_page(&ws)).await.unwrap();

    assert!(first.is_created());
    assert!(!second.is_created());
    assert_eq!(first.job_id(), second.job_id());

    // Once dead-lettered the key is free again
    queue
        .mark_failed(first.job_id(), "no credentials", ErrorKind::NonRetryable)
        .await
        .unwrap();
    let third = queue.enqueue(SyncUsersJob::first_page(&ws)).await.unwrap();
    assert!(third.is_created());
}

#[tokio::test]
async fn exhausted_retries_free_the_idempotency_key() {
    let Some(pool) = test_pool().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let queue = PostgresJobQueue::new(pool.clone());
    let ws = unique_workspace();

    let mut current = queue
        .enqueue(SyncUsersJob::first_page(&ws))
        .await
        .unwrap()
        .job_id();
    for _ in 0..2 {
        queue
            .mark_failed(current, "slack unavailable", ErrorKind::Retryable)
            .await
            .unwrap();
        let retry = queue.enqueue(SyncUsersJob::first_page(&ws)).await.unwrap();
        assert!(!retry.is_created());
        current = retry.job_id();
    }
    queue
        .mark_failed(current, "slack unavailable", ErrorKind::Retryable)
        .await
        .unwrap();

    let last = Job::find_by_id(current, &pool).await.unwrap();
    assert_eq!(last.status, JobStatus::DeadLetter);
    assert_eq!(last.retry_count, 2);

    let restarted = queue.enqueue(SyncUsersJob::first_page(&ws)).await.unwrap();
    assert!(restarted.is_created());
}
