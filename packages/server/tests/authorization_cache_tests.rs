//! Integration tests for the Authorization Cache.

mod common;

use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use server_core::common::SyncError;
use server_core::config::SyncSettings;
use server_core::domains::workspace::authorization_cache::cache_key;
use server_core::domains::workspace::models::AuthorizationUpdate;
use server_core::kernel::test_dependencies::InMemoryStore;
use server_core::kernel::{BaseCache, TestDependencies};

use crate::common::{authorization, authorized_store, WORKSPACE};

fn update(token: &str) -> AuthorizationUpdate {
    AuthorizationUpdate {
        name: "Acme".to_string(),
        access_token: token.to_string(),
        scope: "channels:history".to_string(),
        authorizing_user: "U7".to_string(),
        installer_user: "U8".to_string(),
    }
}

#[tokio::test]
async fn second_read_is_served_from_cache() {
    let test = TestDependencies::new().mock_store(authorized_store());
    let deps = test.into_deps();

    assert_eq!(deps.auth_cache.token(WORKSPACE).await.unwrap(), "xoxb-1");
    assert_eq!(deps.auth_cache.token(WORKSPACE).await.unwrap(), "xoxb-1");

    assert_eq!(test.store.authorization_reads(), 1);
    assert!(test.cache.get(&cache_key(WORKSPACE)).await.is_some());
}

#[tokio::test]
async fn expired_entry_is_reloaded_from_store() {
    let test = TestDependencies::new()
        .mock_store(authorized_store())
        .settings(SyncSettings {
            auth_cache_ttl: Duration::from_millis(20),
            ..Default::default()
        });
    let deps = test.into_deps();

    deps.auth_cache.get(WORKSPACE).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    deps.auth_cache.get(WORKSPACE).await.unwrap();

    assert_eq!(test.store.authorization_reads(), 2);
}

#[tokio::test]
async fn missing_authorization_is_not_cached() {
    let test = TestDependencies::new();
    let deps = test.into_deps();

    let err = deps.auth_cache.get(WORKSPACE).await.unwrap_err();

    assert!(matches!(err, SyncError::AuthorizationMissing(ref id) if id == WORKSPACE));
    assert!(test.cache.is_empty());
}

#[tokio::test]
async fn store_failure_is_retryable() {
    let test = TestDependencies::new().mock_store(authorized_store());
    let deps = test.into_deps();
    test.store.fail_reads(true);

    let err = deps.auth_cache.get(WORKSPACE).await.unwrap_err();

    assert!(matches!(err, SyncError::Store(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn unreadable_cache_entry_falls_back_to_store() {
    let test = TestDependencies::new().mock_store(authorized_store());
    let deps = test.into_deps();
    test.cache
        .set(
            &cache_key(WORKSPACE),
            json!({"unexpected": true}),
            Duration::from_secs(60),
        )
        .await;

    let auth = deps.auth_cache.get(WORKSPACE).await.unwrap();

    assert_eq!(auth.access_token, "xoxb-1");
    assert_eq!(test.store.authorization_reads(), 1);
}

#[tokio::test]
async fn update_is_visible_immediately() {
    let test = TestDependencies::new().mock_store(authorized_store());
    let deps = test.into_deps();

    // Warm the cache with the old token
    assert_eq!(deps.auth_cache.token(WORKSPACE).await.unwrap(), "xoxb-1");

    deps.auth_cache
        .update(WORKSPACE, update("xoxb-2"))
        .await
        .unwrap();

    assert_eq!(deps.auth_cache.token(WORKSPACE).await.unwrap(), "xoxb-2");
    assert_eq!(
        test.store.authorization(WORKSPACE).unwrap().access_token,
        "xoxb-2"
    );
}

#[tokio::test]
async fn update_overlays_only_token_and_scope() {
    let original = authorization(WORKSPACE, "xoxb-1");
    let test = TestDependencies::new()
        .mock_store(InMemoryStore::new().with_authorization(original.clone()));
    let deps = test.into_deps();

    let updated = deps
        .auth_cache
        .update(WORKSPACE, update("xoxb-2"))
        .await
        .unwrap();

    assert_eq!(updated.name, original.name);
    assert_eq!(updated.authorizing_user, original.authorizing_user);
    assert_eq!(updated.installer_user, original.installer_user);
    assert_eq!(updated.created, original.created);
    assert_eq!(updated.access_token, "xoxb-2");
    assert_eq!(updated.scope, "channels:history");
    assert!(updated.updated >= original.updated);
}

#[tokio::test]
async fn first_update_onboards_a_due_workspace() {
    let test = TestDependencies::new();
    let deps = test.into_deps();

    let created = deps
        .auth_cache
        .update(WORKSPACE, update("xoxb-9"))
        .await
        .unwrap();

    assert_eq!(created.name, "Acme");
    assert_eq!(created.created, created.updated);

    let workspace = test.store.workspace(WORKSPACE).unwrap();
    assert_eq!(workspace.name, "Acme");
    assert!(workspace.is_due(Utc::now()));
}
