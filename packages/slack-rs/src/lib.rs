// Minimal Slack Web API client for the workspace crawler.
//
// Only the three cursor-paginated read methods the crawler needs are covered:
// users.list, conversations.list and conversations.history.

pub mod models;

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

pub use crate::models::{Channel, Member, Message, Page, Profile};
use crate::models::{ConversationsHistoryResponse, ConversationsListResponse, UsersListResponse};

pub const DEFAULT_BASE_URL: &str = "https://slack.com/api";

#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    #[error("HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("slack api error in {method}: {error}")]
    Api { method: &'static str, error: String },
}

#[derive(Debug, Clone)]
pub struct SlackOptions {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for SlackOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SlackService {
    client: Client,
    options: SlackOptions,
}

impl SlackService {
    pub fn new(options: SlackOptions) -> Result<Self, SlackError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()?;
        Ok(Self { client, options })
    }

    /// One page of workspace members. An empty `cursor` requests the first page.
    pub async fn users_list(
        &self,
        token: &str,
        cursor: &str,
        limit: u32,
    ) -> Result<Page<Member>, SlackError> {
        let limit = limit.to_string();
        let mut query = vec![("limit", limit.as_str())];
        if !cursor.is_empty() {
            query.push(("cursor", cursor));
        }

        let res: UsersListResponse = self.get("users.list", token, &query).await?;
        if !res.ok {
            return Err(api_error("users.list", res.error));
        }
        Ok(Page::from_parts(res.members, false, res.response_metadata))
    }

    /// One page of public and private channels the token can see.
    pub async fn conversations_list(
        &self,
        token: &str,
        cursor: &str,
        limit: u32,
    ) -> Result<Page<Channel>, SlackError> {
        let limit = limit.to_string();
        let mut query = vec![
            ("limit", limit.as_str()),
            ("types", "public_channel,private_channel"),
        ];
        if !cursor.is_empty() {
            query.push(("cursor", cursor));
        }

        let res: ConversationsListResponse = self.get("conversations.list", token, &query).await?;
        if !res.ok {
            return Err(api_error("conversations.list", res.error));
        }
        Ok(Page::from_parts(res.channels, false, res.response_metadata))
    }

    /// One page of channel history, newest first, strictly older than `latest`.
    pub async fn conversations_history(
        &self,
        token: &str,
        channel: &str,
        limit: u32,
        latest: &str,
    ) -> Result<Page<Message>, SlackError> {
        let limit = limit.to_string();
        let query = [
            ("channel", channel),
            ("limit", limit.as_str()),
            ("latest", latest),
            ("inclusive", "false"),
        ];

        let res: ConversationsHistoryResponse =
            self.get("conversations.history", token, &query).await?;
        if !res.ok {
            return Err(api_error("conversations.history", res.error));
        }
        Ok(Page::from_parts(res.messages, res.has_more, res.response_metadata))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        method: &'static str,
        token: &str,
        query: &[(&str, &str)],
    ) -> Result<T, SlackError> {
        let url = format!("{}/{}", self.options.base_url.trim_end_matches('/'), method);

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(method, status = %status, "slack returned an error status");
            return Err(SlackError::Http { status, body });
        }

        Ok(response.json::<T>().await?)
    }
}

fn api_error(method: &'static str, error: Option<String>) -> SlackError {
    SlackError::Api {
        method,
        error: error.unwrap_or_else(|| "unknown_error".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn service(server: &MockServer) -> SlackService {
        SlackService::new(SlackOptions {
            base_url: server.uri(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn users_list_reads_members_and_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users.list"))
            .and(header("authorization", "Bearer xoxb-1"))
            .and(query_param("cursor", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "members": [
                    {"id": "U1", "team_id": "T1", "name": "ada", "deleted": false, "is_bot": false,
                     "profile": {"first_name": "Ada", "email": "ada@example.com"}}
                ],
                "response_metadata": {"next_cursor": "def"}
            })))
            .mount(&server)
            .await;

        let page = service(&server)
            .await
            .users_list("xoxb-1", "abc", 200)
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].profile.email.as_deref(), Some("ada@example.com"));
        assert!(page.has_more);
        assert_eq!(page.next_cursor.as_deref(), Some("def"));
    }

    #[tokio::test]
    async fn history_passes_latest_and_has_more() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.history"))
            .and(query_param("channel", "C1"))
            .and(query_param("latest", "1700000000.000000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "messages": [
                    {"type": "message", "ts": "1699999999.000200", "text": "b"},
                    {"type": "message", "ts": "1699999998.000100", "text": "a"}
                ],
                "has_more": true
            })))
            .mount(&server)
            .await;

        let page = service(&server)
            .await
            .conversations_history("xoxb-1", "C1", 2, "1700000000.000000")
            .await
            .unwrap();

        assert_eq!(page.items.len(), 2);
        assert!(page.has_more);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn ok_false_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.list"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ok": false, "error": "invalid_auth"})),
            )
            .mount(&server)
            .await;

        let err = service(&server)
            .await
            .conversations_list("bad", "", 200)
            .await
            .unwrap_err();

        match err {
            SlackError::Api { method, error } => {
                assert_eq!(method, "conversations.list");
                assert_eq!(error, "invalid_auth");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn server_error_status_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users.list"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let err = service(&server)
            .await
            .users_list("xoxb-1", "", 200)
            .await
            .unwrap_err();

        assert!(matches!(err, SlackError::Http { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE));
    }
}
