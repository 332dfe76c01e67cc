use std::sync::Arc;

use reqwest::{Method, StatusCode, header};
use serde::Deserialize;
use serde_json::Value;
use snafu::ResultExt;

use crate::conversation::{ChatMessage, MessageStatus, Role};
use crate::error::{
    BuildHttpClientSnafu, ClientResult, DecodeBodySnafu, MissingBaseUrlSnafu, StatusSnafu,
    TransportSnafu, UnauthorizedSnafu,
};
use crate::session::SessionStore;

/// Default page size for the chat list endpoint.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// One persisted conversation as listed by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Chat {
    pub id: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub title: Option<String>,
}

impl Chat {
    /// Display title with the untitled fallback applied.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|title| !title.trim().is_empty())
            .unwrap_or("New conversation")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
    #[serde(rename = "totalPages")]
    pub total_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatList {
    pub chats: Vec<Chat>,
    pub pagination: Pagination,
}

/// Persisted history of one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatThread {
    pub thread_id: String,
    pub messages: Vec<ThreadMessage>,
}

/// One persisted message as returned by the history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ThreadMessage {
    /// Maps a persisted message into the conversation model. History is
    /// settled by definition, so anything not marked `error` hydrates as sent.
    pub fn into_chat_message(self) -> ChatMessage {
        let role = if self.role.eq_ignore_ascii_case("user") {
            Role::User
        } else {
            Role::Assistant
        };
        let status = if self.status.as_deref() == Some("error") {
            MessageStatus::Error
        } else {
            MessageStatus::Sent
        };

        ChatMessage {
            id: self.id,
            role,
            content: self.content,
            status,
            error: self.error,
        }
    }
}

/// HTTP client for the non-streaming chat endpoints.
///
/// Every call attaches the current bearer token when a session exists. A 401
/// response invalidates the local session; the shell observes the session
/// change and returns to the login view.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: Arc<SessionStore>) -> ClientResult<Self> {
        let base_url = normalize_base_url(base_url.into(), "new-api-client")?;
        let http = reqwest::Client::builder()
            .build()
            .context(BuildHttpClientSnafu {
                stage: "build-api-client",
            })?;

        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Resolves an endpoint path against the configured base URL.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Fetches the persisted history of one conversation.
    pub async fn chat_messages(&self, chat_id: &str) -> ClientResult<ChatThread> {
        let payload = self
            .request_json(
                "chat-messages",
                Method::GET,
                &format!("chat/messages?chat_id={chat_id}"),
            )
            .await?;
        serde_json::from_value(payload).context(DecodeBodySnafu {
            stage: "decode-chat-messages",
        })
    }

    /// Fetches one page of the conversation list.
    pub async fn chat_list(&self, page: u32, limit: u32) -> ClientResult<ChatList> {
        let payload = self
            .request_json(
                "chat-list",
                Method::GET,
                &format!("chat/list?page={page}&limit={limit}"),
            )
            .await?;
        serde_json::from_value(payload).context(DecodeBodySnafu {
            stage: "decode-chat-list",
        })
    }

    /// Deletes one conversation and its messages.
    pub async fn delete_chat(&self, chat_id: &str) -> ClientResult<()> {
        self.request_json(
            "delete-chat",
            Method::DELETE,
            &format!("chat/messages?chat_id={chat_id}"),
        )
        .await?;
        Ok(())
    }

    /// Generic request helper shared by every non-streaming endpoint.
    async fn request_json(
        &self,
        stage: &'static str,
        method: Method,
        path: &str,
    ) -> ClientResult<Value> {
        let url = self.endpoint(path);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(token) = self.session.current_token() {
            request = request.bearer_auth(token);
        }

        tracing::debug!(%url, %method, "calling api endpoint");

        let response = request.send().await.context(TransportSnafu {
            stage,
            url: url.clone(),
        })?;
        let status = response.status();
        let body = response.text().await.context(TransportSnafu {
            stage,
            url: url.clone(),
        })?;

        tracing::debug!(%url, status = status.as_u16(), "api endpoint responded");

        if !status.is_success() {
            let message =
                error_message_from_body(&body).unwrap_or_else(|| status_message(status));

            if status == StatusCode::UNAUTHORIZED {
                tracing::warn!(%url, "credential rejected; invalidating local session");
                self.session.sign_out();
                return UnauthorizedSnafu { stage, message }.fail();
            }

            return StatusSnafu {
                stage,
                url,
                status: status.as_u16(),
                message,
            }
            .fail();
        }

        if body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).context(DecodeBodySnafu { stage })
    }
}

/// Validates and normalizes a configured base URL (no trailing slash).
pub(crate) fn normalize_base_url(base_url: String, stage: &'static str) -> ClientResult<String> {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return MissingBaseUrlSnafu { stage }.fail();
    }
    Ok(trimmed.to_string())
}

/// Pulls a human-readable failure out of a JSON error body: a string-valued
/// `message` field first, then `error`.
pub(crate) fn error_message_from_body(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let fields = value.as_object()?;

    for key in ["message", "error"] {
        if let Some(Value::String(message)) = fields.get(key)
            && !message.is_empty()
        {
            return Some(message.clone());
        }
    }

    None
}

pub(crate) fn status_message(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_normalization_trims_trailing_slash() {
        let normalized =
            normalize_base_url("https://api.example.com/".to_string(), "test").expect("valid");
        assert_eq!(normalized, "https://api.example.com");

        assert!(normalize_base_url("   ".to_string(), "test").is_err());
    }

    #[test]
    fn error_message_prefers_message_over_error_field() {
        assert_eq!(
            error_message_from_body(r#"{"message":"nope","error":"other"}"#).as_deref(),
            Some("nope")
        );
        assert_eq!(
            error_message_from_body(r#"{"error":"broken"}"#).as_deref(),
            Some("broken")
        );
        assert_eq!(error_message_from_body(r#"{"message":42}"#), None);
        assert_eq!(error_message_from_body("not json"), None);
        assert_eq!(error_message_from_body(""), None);
    }

    #[test]
    fn thread_messages_hydrate_with_settled_statuses() {
        let message = ThreadMessage {
            id: "m1".to_string(),
            role: "user".to_string(),
            content: "hello".to_string(),
            status: None,
            error: None,
        };
        let hydrated = message.into_chat_message();
        assert_eq!(hydrated.role, Role::User);
        assert_eq!(hydrated.status, MessageStatus::Sent);

        let failed = ThreadMessage {
            id: "m2".to_string(),
            role: "assistant".to_string(),
            content: "Error: rate limited".to_string(),
            status: Some("error".to_string()),
            error: Some("rate limited".to_string()),
        };
        let hydrated = failed.into_chat_message();
        assert_eq!(hydrated.role, Role::Assistant);
        assert_eq!(hydrated.status, MessageStatus::Error);
        assert_eq!(hydrated.error.as_deref(), Some("rate limited"));
    }

    #[test]
    fn chat_display_title_falls_back_when_blank() {
        let chat = Chat {
            id: "c1".to_string(),
            created_by: String::new(),
            created_at: String::new(),
            is_public: false,
            title: Some("   ".to_string()),
        };
        assert_eq!(chat.display_title(), "New conversation");

        let named = Chat {
            title: Some("Trip planning".to_string()),
            ..chat
        };
        assert_eq!(named.display_title(), "Trip planning");
    }

    #[test]
    fn pagination_decodes_service_field_names() {
        let list: ChatList = serde_json::from_str(
            r#"{
                "chats": [{"id":"c1","created_by":"u1","created_at":"2026-01-01","is_public":false,"title":null}],
                "pagination": {"page":1,"limit":20,"total":41,"hasMore":true,"totalPages":3}
            }"#,
        )
        .expect("decode chat list");

        assert_eq!(list.chats.len(), 1);
        assert!(list.pagination.has_more);
        assert_eq!(list.pagination.total_pages, 3);
    }
}
