use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Access credentials granted when a workspace installs the app.
///
/// At most one record per workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Authorization {
    pub workspace_id: String,
    pub name: String,
    pub access_token: String,
    pub scope: String,
    pub authorizing_user: String,
    pub installer_user: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Fields supplied by the onboarding flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationUpdate {
    pub name: String,
    pub access_token: String,
    pub scope: String,
    pub authorizing_user: String,
    pub installer_user: String,
}

impl Authorization {
    /// Overlay an update onto an existing record, or create one.
    ///
    /// An existing record keeps its identity fields and creation time; only the
    /// token, scope and update time change.
    pub fn apply(
        existing: Option<Authorization>,
        workspace_id: &str,
        update: AuthorizationUpdate,
        now: DateTime<Utc>,
    ) -> Authorization {
        match existing {
            Some(mut auth) => {
                auth.access_token = update.access_token;
                auth.scope = update.scope;
                auth.updated = now;
                auth
            }
            None => Authorization {
                workspace_id: workspace_id.to_string(),
                name: update.name,
                access_token: update.access_token,
                scope: update.scope,
                authorizing_user: update.authorizing_user,
                installer_user: update.installer_user,
                created: now,
                updated: now,
            },
        }
    }
}

// =============================================================================
// SQL Queries
// =============================================================================

impl Authorization {
    pub async fn find_by_workspace(workspace_id: &str, pool: &PgPool) -> Result<Option<Self>> {
        let auth = sqlx::query_as::<_, Authorization>(
            "SELECT * FROM authorizations WHERE workspace_id = $1",
        )
        .bind(workspace_id)
        .fetch_optional(pool)
        .await?;
        Ok(auth)
    }

    pub async fn upsert(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO authorizations (
                workspace_id, name, access_token, scope, authorizing_user, installer_user,
                created, updated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (workspace_id) DO UPDATE SET
                name = EXCLUDED.name,
                access_token = EXCLUDED.access_token,
                scope = EXCLUDED.scope,
                authorizing_user = EXCLUDED.authorizing_user,
                installer_user = EXCLUDED.installer_user,
                updated = EXCLUDED.updated
            "#,
        )
        .bind(&self.workspace_id)
        .bind(&self.name)
        .bind(&self.access_token)
        .bind(&self.scope)
        .bind(&self.authorizing_user)
        .bind(&self.installer_user)
        .bind(self.created)
        .bind(self.updated)
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(token: &str) -> AuthorizationUpdate {
        AuthorizationUpdate {
            name: "Acme".into(),
            access_token: token.into(),
            scope: "channels:history,users:read".into(),
            authorizing_user: "U1".into(),
            installer_user: "U1".into(),
        }
    }

    #[test]
    fn creates_when_missing() {
        let now = Utc::now();
        let auth = Authorization::apply(None, "T1", update("xoxb-1"), now);

        assert_eq!(auth.workspace_id, "T1");
        assert_eq!(auth.access_token, "xoxb-1");
        assert_eq!(auth.created, now);
        assert_eq!(auth.updated, now);
    }

    #[test]
    fn overlays_token_and_keeps_creation_time() {
        let created = Utc::now() - chrono::Duration::days(3);
        let existing = Authorization::apply(None, "T1", update("xoxb-old"), created);

        let now = Utc::now();
        let mut next = update("xoxb-new");
        next.installer_user = "U9".into();
        let auth = Authorization::apply(Some(existing), "T1", next, now);

        assert_eq!(auth.access_token, "xoxb-new");
        assert_eq!(auth.installer_user, "U1");
        assert_eq!(auth.created, created);
        assert_eq!(auth.updated, now);
    }
}
