use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use sqlx::PgPool;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    database: DatabaseHealth,
    connection_pool: ConnectionPoolHealth,
}

#[derive(Serialize)]
pub struct DatabaseHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
pub struct ConnectionPoolHealth {
    size: u32,
    idle_connections: usize,
    max_connections: u32,
}

/// Health check endpoint
///
/// Returns 200 OK when the database answers within five seconds, 503 Service
/// Unavailable otherwise.
pub async fn health_handler(State(pool): State<PgPool>) -> (StatusCode, Json<HealthResponse>) {
    let db_health = match tokio::time::timeout(
        std::time::Duration::from_secs(5),
        sqlx::query("SELECT 1").execute(&pool),
    )
    .await
    {
        Ok(Ok(_)) => DatabaseHealth {
            status: "ok".to_string(),
            error: None,
        },
        Ok(Err(e)) => DatabaseHealth {
            status: "error".to_string(),
            error: Some(format!("Query failed: {}", e)),
        },
        Err(_) => DatabaseHealth {
            status: "error".to_string(),
            error: Some("Query timeout (>5s)".to_string()),
        },
    };

    let pool_health = ConnectionPoolHealth {
        size: pool.size(),
        idle_connections: pool.num_idle(),
        max_connections: pool.options().get_max_connections(),
    };

    let is_healthy = db_health.status == "ok";
    let (status_code, overall_status) = if is_healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status_code,
        Json(HealthResponse {
            status: overall_status.to_string(),
            database: db_health,
            connection_pool: pool_health,
        }),
    )
}
