use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata block carried by every cursor-paginated Slack method.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsersListResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationsListResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationsHistoryResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub profile: Profile,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub topic: Option<TextValue>,
    #[serde(default)]
    pub purpose: Option<TextValue>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextValue {
    #[serde(default)]
    pub value: String,
}

/// A history entry. Fields the crawler doesn't interpret are kept in `extra`
/// so the stored payload is the message as Slack returned it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Channel {
    pub fn topic_value(&self) -> &str {
        self.topic.as_ref().map(|t| t.value.as_str()).unwrap_or("")
    }

    pub fn purpose_value(&self) -> &str {
        self.purpose.as_ref().map(|p| p.value.as_str()).unwrap_or("")
    }
}

/// One page of a paginated listing.
///
/// `next_cursor` is `None` when Slack returned an empty cursor.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub(crate) fn from_parts(
        items: Vec<T>,
        has_more: bool,
        metadata: Option<ResponseMetadata>,
    ) -> Self {
        let next_cursor = metadata
            .and_then(|m| m.next_cursor)
            .filter(|c| !c.is_empty());
        Self {
            has_more: has_more || next_cursor.is_some(),
            items,
            next_cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cursor_means_no_more_pages() {
        let page: Page<Member> = Page::from_parts(
            vec![],
            false,
            Some(ResponseMetadata {
                next_cursor: Some(String::new()),
            }),
        );
        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn message_keeps_unknown_fields() {
        let json = r#"{"type":"message","ts":"1700000000.000100","user":"U1","text":"hi","reactions":[{"name":"wave"}]}"#;
        let msg: Message = serde_json::from_str(json).unwrap();

        assert_eq!(msg.ts, "1700000000.000100");
        assert_eq!(msg.user.as_deref(), Some("U1"));
        assert!(msg.extra.contains_key("reactions"));
        assert_eq!(msg.extra.get("type"), Some(&Value::from("message")));
    }

    #[test]
    fn channel_without_topic_reads_empty() {
        let ch: Channel = serde_json::from_str(r#"{"id":"C1","name":"general"}"#).unwrap();
        assert_eq!(ch.topic_value(), "");
        assert!(!ch.is_archived);
    }
}
