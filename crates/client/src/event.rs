use serde::Deserialize;
use serde_json::Value;

/// One unit of server-pushed information for an in-flight generation.
///
/// `token.content` and `final.message` are kept as raw JSON values because the
/// service emits either a plain string or a nested rich-content structure;
/// [`extract_text`] normalizes both.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Token {
        #[serde(default)]
        content: Value,
        #[serde(default)]
        chat_id: Option<String>,
    },
    Final {
        #[serde(default)]
        message: Value,
        #[serde(default)]
        chat_id: Option<String>,
    },
    ToolStart {
        tool: String,
        #[serde(default)]
        tool_icon: String,
        #[serde(default)]
        chat_id: Option<String>,
    },
    ToolEnd {
        tool: String,
        #[serde(default)]
        tool_icon: String,
        #[serde(default)]
        chat_id: Option<String>,
    },
    Error {
        #[serde(default)]
        message: String,
    },
}

impl StreamEvent {
    /// Parses one record payload as a typed event.
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// Conversation id carried by the event; never guaranteed on `error`.
    pub fn chat_id(&self) -> Option<&str> {
        match self {
            Self::Token { chat_id, .. }
            | Self::Final { chat_id, .. }
            | Self::ToolStart { chat_id, .. }
            | Self::ToolEnd { chat_id, .. } => chat_id.as_deref(),
            Self::Error { .. } => None,
        }
    }
}

/// Extracts display text from a token/final payload.
///
/// Strings pass through; sequences concatenate their elements recursively;
/// keyed structures fall back through `text`, `text.value`, `value` and
/// `content`. Unrecognized shapes contribute an empty string instead of
/// failing the update.
pub fn extract_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(extract_text).collect(),
        Value::Object(fields) => {
            if let Some(Value::String(text)) = fields.get("text") {
                return text.clone();
            }
            if let Some(Value::Object(inner)) = fields.get("text")
                && let Some(Value::String(text)) = inner.get("value")
            {
                return text.clone();
            }
            if let Some(Value::String(text)) = fields.get("value") {
                return text.clone();
            }
            if let Some(Value::String(text)) = fields.get("content") {
                return text.clone();
            }
            String::new()
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => String::new(),
    }
}
