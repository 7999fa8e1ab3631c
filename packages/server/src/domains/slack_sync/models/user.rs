use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// A workspace member. Users carry no watermark; each pass re-lists them all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SlackUser {
    pub workspace_id: String,
    pub id: String,
    pub name: String,
    pub real_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub deleted: bool,
    pub is_bot: bool,
    pub updated_at: DateTime<Utc>,
}

impl SlackUser {
    pub fn from_slack(workspace_id: &str, member: &slack::Member, now: DateTime<Utc>) -> Self {
        Self {
            workspace_id: workspace_id.to_string(),
            id: member.id.clone(),
            name: member.name.clone(),
            real_name: member.real_name.clone(),
            first_name: member.profile.first_name.clone(),
            last_name: member.profile.last_name.clone(),
            email: member.profile.email.clone(),
            deleted: member.deleted,
            is_bot: member.is_bot,
            updated_at: now,
        }
    }

    pub async fn find(workspace_id: &str, id: &str, pool: &PgPool) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, SlackUser>(
            "SELECT * FROM slack_users WHERE workspace_id = $1 AND id = $2",
        )
        .bind(workspace_id)
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(user)
    }

    pub async fn upsert(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO slack_users (
                workspace_id, id, name, real_name, first_name, last_name, email,
                deleted, is_bot, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (workspace_id, id) DO UPDATE SET
                name = EXCLUDED.name,
                real_name = EXCLUDED.real_name,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                email = EXCLUDED.email,
                deleted = EXCLUDED.deleted,
                is_bot = EXCLUDED.is_bot,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&self.workspace_id)
        .bind(&self.id)
        .bind(&self.name)
        .bind(&self.real_name)
        .bind(&self.first_name)
        .bind(&self.last_name)
        .bind(&self.email)
        .bind(self.deleted)
        .bind(self.is_bot)
        .bind(self.updated_at)
        .execute(pool)
        .await?;
        Ok(())
    }
}
