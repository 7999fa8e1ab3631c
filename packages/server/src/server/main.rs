// Main entry point for the workspace sync server

use std::sync::Arc;

use anyhow::{Context, Result};
use server_core::domains::slack_sync::effects::register_slack_sync_jobs;
use server_core::kernel::jobs::{JobQueue, JobRegistry, JobRunner, JobRunnerConfig, PostgresJobQueue};
use server_core::kernel::{
    start_scheduler, MemoryCache, PgSyncStore, ScheduleConfig, ServerDeps, SlackAdapter,
    TracingErrorReporter,
};
use server_core::{server::build_app, Config};
use slack::{SlackOptions, SlackService};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting workspace sync server");

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    let slack = SlackService::new(SlackOptions {
        base_url: config.slack_api_base_url.clone(),
        ..Default::default()
    })
    .context("Failed to build Slack client")?;

    let job_queue: Arc<dyn JobQueue> = Arc::new(PostgresJobQueue::new(pool.clone()));

    let server_deps = Arc::new(ServerDeps::new(
        Arc::new(PgSyncStore::new(pool.clone())),
        Arc::new(SlackAdapter::new(Arc::new(slack))),
        job_queue.clone(),
        Arc::new(MemoryCache::new()),
        Arc::new(TracingErrorReporter),
        config.sync.clone(),
    ));

    // Job runner
    let mut job_registry = JobRegistry::new();
    register_slack_sync_jobs(&mut job_registry);
    tracing::info!(job_types = ?job_registry.job_types(), "Job handlers registered");

    let runner = JobRunner::with_config(
        job_queue,
        Arc::new(job_registry),
        server_deps.clone(),
        JobRunnerConfig {
            batch_size: config.job_runner_batch_size,
            poll_interval: config.job_poll_interval,
            ..Default::default()
        },
    );
    tokio::spawn(async move {
        if let Err(e) = runner.run().await {
            tracing::error!(error = %e, "Job runner exited with error");
        }
    });

    // Scheduled passes; the handle must outlive the server
    let _scheduler = start_scheduler(
        server_deps.clone(),
        ScheduleConfig {
            workspace_cron: config.workspace_schedule_cron.clone(),
            channel_cron: config.channel_schedule_cron.clone(),
        },
    )
    .await
    .context("Failed to start scheduler")?;

    let app = build_app(pool, server_deps);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!(base_url = %config.base_url, "Job endpoints under /_i/1/jobs");
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
