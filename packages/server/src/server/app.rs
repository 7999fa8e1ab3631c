//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::FromRef,
    http::{header::CONTENT_TYPE, Method},
    routing::get,
    Router,
};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::kernel::ServerDeps;
use crate::server::routes::{
    channel_crawl_pass_handler, collect_messages_handler, health_handler, sync_channels_handler,
    sync_users_handler, workspace_update_pass_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AxumAppState {
    pub db_pool: PgPool,
    pub server_deps: Arc<ServerDeps>,
}

impl FromRef<AxumAppState> for Arc<ServerDeps> {
    fn from_ref(state: &AxumAppState) -> Self {
        state.server_deps.clone()
    }
}

impl FromRef<AxumAppState> for PgPool {
    fn from_ref(state: &AxumAppState) -> Self {
        state.db_pool.clone()
    }
}

/// Job and scheduler endpoints. Each request runs exactly one step or pass.
///
/// Usable with any state that can hand out `Arc<ServerDeps>`, so tests can
/// mount it directly on test dependencies.
pub fn sync_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    Arc<ServerDeps>: FromRef<S>,
{
    Router::new()
        .route(
            "/_i/1/jobs/users",
            get(sync_users_handler).post(sync_users_handler),
        )
        .route(
            "/_i/1/jobs/channels",
            get(sync_channels_handler).post(sync_channels_handler),
        )
        .route(
            "/_i/1/jobs/messages",
            get(collect_messages_handler).post(collect_messages_handler),
        )
        .route(
            "/_i/1/scheduler/workspaces",
            get(workspace_update_pass_handler).post(workspace_update_pass_handler),
        )
        .route(
            "/_i/1/scheduler/messages",
            get(channel_crawl_pass_handler).post(channel_crawl_pass_handler),
        )
}

/// Build the Axum application router
pub fn build_app(pool: PgPool, server_deps: Arc<ServerDeps>) -> Router {
    let state = AxumAppState {
        db_pool: pool,
        server_deps,
    };

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .merge(sync_routes::<AxumAppState>())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
