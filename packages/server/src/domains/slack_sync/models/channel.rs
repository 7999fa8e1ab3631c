use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::MessageTs;

/// A channel in a workspace plus its history crawl bookkeeping.
///
/// `latest_crawled` is the watermark: every message at or before it has been
/// ingested. It only ever moves forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Channel {
    pub workspace_id: String,
    pub id: String,
    pub name: String,
    pub topic: String,
    pub purpose: String,
    pub is_archived: bool,
    pub is_private: bool,
    pub latest_crawled: MessageTs,
    pub next_crawl: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Channel {
    /// Build a fresh record from a listing entry. New channels are due for a
    /// crawl immediately and start with an empty watermark.
    pub fn from_slack(workspace_id: &str, channel: &slack::Channel, now: DateTime<Utc>) -> Self {
        Self {
            workspace_id: workspace_id.to_string(),
            id: channel.id.clone(),
            name: channel.name.clone(),
            topic: channel.topic_value().to_string(),
            purpose: channel.purpose_value().to_string(),
            is_archived: channel.is_archived,
            is_private: channel.is_private,
            latest_crawled: MessageTs::ZERO,
            next_crawl: now,
            updated_at: now,
        }
    }

    pub fn is_due_for_crawl(&self, now: DateTime<Utc>) -> bool {
        !self.is_archived && self.next_crawl <= now
    }
}

// =============================================================================
// SQL Queries
// =============================================================================

impl Channel {
    pub async fn find(workspace_id: &str, id: &str, pool: &PgPool) -> Result<Option<Self>> {
        let channel = sqlx::query_as::<_, Channel>(
            "SELECT * FROM channels WHERE workspace_id = $1 AND id = $2",
        )
        .bind(workspace_id)
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(channel)
    }

    /// Upsert listing metadata. Crawl bookkeeping of an existing row is never touched.
    pub async fn upsert_metadata(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO channels (
                workspace_id, id, name, topic, purpose, is_archived, is_private,
                latest_crawled, next_crawl, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (workspace_id, id) DO UPDATE SET
                name = EXCLUDED.name,
                topic = EXCLUDED.topic,
                purpose = EXCLUDED.purpose,
                is_archived = EXCLUDED.is_archived,
                is_private = EXCLUDED.is_private,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&self.workspace_id)
        .bind(&self.id)
        .bind(&self.name)
        .bind(&self.topic)
        .bind(&self.purpose)
        .bind(self.is_archived)
        .bind(self.is_private)
        .bind(self.latest_crawled)
        .bind(self.next_crawl)
        .bind(self.updated_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_due_for_crawl(now: DateTime<Utc>, pool: &PgPool) -> Result<Vec<Self>> {
        let channels = sqlx::query_as::<_, Channel>(
            r#"
            SELECT * FROM channels
            WHERE next_crawl <= $1 AND NOT is_archived
            ORDER BY next_crawl
            "#,
        )
        .bind(now)
        .fetch_all(pool)
        .await?;
        Ok(channels)
    }

    /// Advance `next_crawl` only if it still holds `expected`.
    pub async fn claim_crawl(
        workspace_id: &str,
        id: &str,
        expected: DateTime<Utc>,
        next_crawl: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE channels
            SET next_crawl = $4, updated_at = NOW()
            WHERE workspace_id = $1 AND id = $2 AND next_crawl = $3
            "#,
        )
        .bind(workspace_id)
        .bind(id)
        .bind(expected)
        .bind(next_crawl)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Record a finished crawl. The watermark is raised to `watermark` but never lowered.
    pub async fn mark_crawled(
        workspace_id: &str,
        id: &str,
        watermark: MessageTs,
        next_crawl: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO channels (workspace_id, id, latest_crawled, next_crawl)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (workspace_id, id) DO UPDATE SET
                latest_crawled = GREATEST(channels.latest_crawled, EXCLUDED.latest_crawled),
                next_crawl = EXCLUDED.next_crawl,
                updated_at = NOW()
            "#,
        )
        .bind(workspace_id)
        .bind(id)
        .bind(watermark)
        .bind(next_crawl)
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_channel_is_due_with_empty_watermark() {
        let listing: slack::Channel = serde_json::from_value(serde_json::json!({
            "id": "C1",
            "name": "general",
            "topic": {"value": "company news"},
            "is_private": true
        }))
        .unwrap();
        let now = Utc::now();
        let channel = Channel::from_slack("T1", &listing, now);

        assert_eq!(channel.topic, "company news");
        assert_eq!(channel.purpose, "");
        assert!(channel.is_private);
        assert_eq!(channel.latest_crawled, MessageTs::ZERO);
        assert!(channel.is_due_for_crawl(now));
    }

    #[test]
    fn archived_channel_is_never_due() {
        let listing: slack::Channel =
            serde_json::from_value(serde_json::json!({"id": "C2", "is_archived": true})).unwrap();
        let now = Utc::now();
        assert!(!Channel::from_slack("T1", &listing, now).is_due_for_crawl(now));
    }
}
