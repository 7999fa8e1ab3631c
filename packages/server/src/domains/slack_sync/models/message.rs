use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{InvalidMessageTs, MessageTs};

/// An ingested history entry, unique on (workspace, channel, ts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub workspace_id: String,
    pub channel_id: String,
    pub ts: MessageTs,
    pub user_id: Option<String>,
    pub text: Option<String>,
    pub payload: serde_json::Value,
    pub ingested_at: DateTime<Utc>,
}

impl Message {
    pub fn from_slack(
        workspace_id: &str,
        channel_id: &str,
        message: &slack::Message,
        now: DateTime<Utc>,
    ) -> Result<Self, InvalidMessageTs> {
        let ts: MessageTs = message.ts.parse()?;
        Ok(Self {
            workspace_id: workspace_id.to_string(),
            channel_id: channel_id.to_string(),
            ts,
            user_id: message.user.clone(),
            text: message.text.clone(),
            payload: serde_json::to_value(message).unwrap_or(serde_json::Value::Null),
            ingested_at: now,
        })
    }

    pub async fn find_by_channel(
        workspace_id: &str,
        channel_id: &str,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE workspace_id = $1 AND channel_id = $2
            ORDER BY ts DESC
            "#,
        )
        .bind(workspace_id)
        .bind(channel_id)
        .fetch_all(pool)
        .await?;
        Ok(messages)
    }

    pub async fn upsert(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO messages (workspace_id, channel_id, ts, user_id, text, payload, ingested_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (workspace_id, channel_id, ts) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                text = EXCLUDED.text,
                payload = EXCLUDED.payload,
                ingested_at = EXCLUDED.ingested_at
            "#,
        )
        .bind(&self.workspace_id)
        .bind(&self.channel_id)
        .bind(self.ts)
        .bind(&self.user_id)
        .bind(&self.text)
        .bind(&self.payload)
        .bind(self.ingested_at)
        .execute(pool)
        .await?;
        Ok(())
    }
}
