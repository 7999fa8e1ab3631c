use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// A connected chat workspace and its refresh schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub next_update: DateTime<Utc>,
    pub users_synced_at: Option<DateTime<Utc>>,
    pub channels_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing that a full users/channels pass refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncResource {
    Users,
    Channels,
}

impl std::fmt::Display for SyncResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncResource::Users => write!(f, "users"),
            SyncResource::Channels => write!(f, "channels"),
        }
    }
}

impl Workspace {
    pub fn new(id: impl Into<String>, name: impl Into<String>, next_update: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            next_update,
            users_synced_at: None,
            channels_synced_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_update <= now
    }
}

// =============================================================================
// SQL Queries
// =============================================================================

impl Workspace {
    pub async fn find_by_id(id: &str, pool: &PgPool) -> Result<Option<Self>> {
        let workspace = sqlx::query_as::<_, Workspace>("SELECT * FROM workspaces WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(workspace)
    }

    /// Insert the workspace unless it already exists. Existing schedules are left alone.
    pub async fn insert_if_absent(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workspaces (id, name, next_update, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&self.id)
        .bind(&self.name)
        .bind(self.next_update)
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_due(now: DateTime<Utc>, pool: &PgPool) -> Result<Vec<Self>> {
        let workspaces = sqlx::query_as::<_, Workspace>(
            "SELECT * FROM workspaces WHERE next_update <= $1 ORDER BY next_update",
        )
        .bind(now)
        .fetch_all(pool)
        .await?;
        Ok(workspaces)
    }

    /// Advance `next_update` only if it still holds `expected`.
    ///
    /// Returns false when another pass already claimed the workspace.
    pub async fn claim_update(
        id: &str,
        expected: DateTime<Utc>,
        next_update: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE workspaces
            SET next_update = $3, updated_at = NOW()
            WHERE id = $1 AND next_update = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(next_update)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn mark_synced(
        id: &str,
        resource: SyncResource,
        at: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<()> {
        let sql = match resource {
            SyncResource::Users => {
                "UPDATE workspaces SET users_synced_at = $2, updated_at = NOW() WHERE id = $1"
            }
            SyncResource::Channels => {
                "UPDATE workspaces SET channels_synced_at = $2, updated_at = NOW() WHERE id = $1"
            }
        };
        sqlx::query(sql).bind(id).bind(at).execute(pool).await?;
        Ok(())
    }
}
