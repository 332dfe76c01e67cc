use uuid::Uuid;

use crate::event::{StreamEvent, extract_text};

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle status for one message. `Loading` marks the assistant draft of
/// an in-flight request; `Sent` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Loading,
    Sent,
    Error,
}

/// One conversational turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub status: MessageStatus,
    pub error: Option<String>,
}

impl ChatMessage {
    pub fn new(
        id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
        status: MessageStatus,
    ) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            status,
            error: None,
        }
    }

    /// Creates a settled user message.
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, Role::User, content, MessageStatus::Sent)
    }

    /// Creates the empty assistant draft paired with a submission.
    pub fn assistant_draft(id: impl Into<String>) -> Self {
        Self::new(id, Role::Assistant, String::new(), MessageStatus::Loading)
    }

    /// Terminal messages never mutate again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, MessageStatus::Loading)
    }
}

/// Tool invocation currently in flight, surfaced as a transient indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTool {
    pub name: String,
    pub icon: String,
}

/// Ids and request payload produced by accepting one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub user_message_id: String,
    pub draft_id: String,
    pub message: String,
    pub chat_id: Option<String>,
}

/// Derives the draft id paired with a user message id.
pub fn draft_id_for(user_message_id: &str) -> String {
    format!("{user_message_id}-assistant")
}

/// Owns the ordered message list for the active conversation and applies
/// stream events as state transitions.
///
/// Drafts are addressed by id; addressing a missing or already-terminal draft
/// is a silent no-op, so late events from an abandoned stream cannot clobber
/// newer state.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConversationState {
    chat_id: Option<String>,
    messages: Vec<ChatMessage>,
    active_tool: Option<ActiveTool>,
}

impl ConversationState {
    /// Creates a fresh conversation; `chat_id` is `None` until the service
    /// assigns one or an existing conversation is resumed.
    pub fn new(chat_id: Option<String>) -> Self {
        Self {
            chat_id,
            messages: Vec::new(),
            active_tool: None,
        }
    }

    /// Resets the message list and working conversation id.
    pub fn reset(&mut self, chat_id: Option<String>) {
        self.chat_id = chat_id;
        self.messages.clear();
        self.active_tool = None;
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn active_tool(&self) -> Option<&ActiveTool> {
        self.active_tool.as_ref()
    }

    /// True while any draft is still open.
    pub fn is_streaming(&self) -> bool {
        self.messages
            .iter()
            .any(|message| message.status == MessageStatus::Loading)
    }

    /// Replaces the list with persisted history, keeping the working id.
    pub fn hydrate(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
        self.active_tool = None;
    }

    /// Accepts one submission: appends the user message and its paired
    /// loading draft, returning the stream request inputs. Empty input after
    /// trimming leaves the list untouched.
    pub fn begin_exchange(&mut self, text: &str) -> Option<Exchange> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }

        let user_message_id = Uuid::new_v4().to_string();
        let draft_id = draft_id_for(&user_message_id);

        self.messages
            .push(ChatMessage::user(user_message_id.clone(), trimmed));
        self.messages.push(ChatMessage::assistant_draft(&draft_id));

        Some(Exchange {
            user_message_id,
            draft_id,
            message: trimmed.to_string(),
            chat_id: self.chat_id.clone(),
        })
    }

    /// Applies one stream event addressed to `draft_id`.
    pub fn apply_event(&mut self, draft_id: &str, event: &StreamEvent) {
        self.adopt_chat_id(event.chat_id());

        match event {
            StreamEvent::Token { content, .. } => {
                self.active_tool = None;
                let text = extract_text(content);
                self.update_draft(draft_id, |draft| draft.content.push_str(&text));
            }
            StreamEvent::Final { message, .. } => {
                self.active_tool = None;
                let text = extract_text(message);
                self.update_draft(draft_id, |draft| {
                    // The final payload is authoritative: it overwrites the
                    // accumulated tokens unless it is empty.
                    if !text.is_empty() {
                        draft.content = text;
                    }
                    draft.status = MessageStatus::Sent;
                });
            }
            StreamEvent::ToolStart {
                tool, tool_icon, ..
            } => {
                self.active_tool = Some(ActiveTool {
                    name: tool.clone(),
                    icon: tool_icon.clone(),
                });
            }
            StreamEvent::ToolEnd { tool, .. } => {
                // A stale tool_end must not clobber a newer tool.
                if self
                    .active_tool
                    .as_ref()
                    .is_some_and(|active| active.name == *tool)
                {
                    self.active_tool = None;
                }
            }
            StreamEvent::Error { message } => {
                self.fail_draft(draft_id, message);
            }
        }
    }

    /// Settles the draft as failed with a user-visible error message.
    pub fn fail_draft(&mut self, draft_id: &str, detail: &str) {
        let detail = detail.to_string();
        self.update_draft(draft_id, |draft| {
            draft.content = format!("Error: {detail}");
            draft.status = MessageStatus::Error;
            draft.error = Some(detail);
        });
        self.clear_tool_when_idle();
    }

    /// Settles the draft as sent when the transport completed without a
    /// `final` event; the accumulated token text stands.
    pub fn complete_draft(&mut self, draft_id: &str) {
        self.update_draft(draft_id, |draft| draft.status = MessageStatus::Sent);
        self.clear_tool_when_idle();
    }

    fn update_draft(&mut self, draft_id: &str, apply: impl FnOnce(&mut ChatMessage)) {
        let Some(draft) = self
            .messages
            .iter_mut()
            .find(|message| message.id == draft_id)
        else {
            return;
        };

        if draft.is_terminal() {
            return;
        }

        apply(draft);
    }

    fn adopt_chat_id(&mut self, chat_id: Option<&str>) {
        let Some(incoming) = chat_id else {
            return;
        };
        if incoming.is_empty() {
            return;
        }

        match &self.chat_id {
            None => self.chat_id = Some(incoming.to_string()),
            Some(current) if current.as_str() != incoming => {
                tracing::debug!(current = %current, incoming, "ignoring conflicting chat id");
            }
            Some(_) => {}
        }
    }

    fn clear_tool_when_idle(&mut self) {
        if !self.is_streaming() {
            self.active_tool = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token(content: &str) -> StreamEvent {
        StreamEvent::Token {
            content: json!(content),
            chat_id: Some("c1".to_string()),
        }
    }

    fn final_event(message: &str) -> StreamEvent {
        StreamEvent::Final {
            message: json!(message),
            chat_id: Some("c1".to_string()),
        }
    }

    #[test]
    fn submission_appends_user_and_loading_draft() {
        let mut state = ConversationState::default();
        let exchange = state.begin_exchange("  hi  ").expect("accepted");

        assert_eq!(exchange.message, "hi");
        assert_eq!(exchange.draft_id, draft_id_for(&exchange.user_message_id));
        assert_eq!(state.messages().len(), 2);
        assert_eq!(state.messages()[0].role, Role::User);
        assert_eq!(state.messages()[0].content, "hi");
        assert_eq!(state.messages()[1].role, Role::Assistant);
        assert_eq!(state.messages()[1].status, MessageStatus::Loading);
        assert_eq!(state.messages()[1].content, "");
        assert!(state.is_streaming());
    }

    #[test]
    fn empty_submission_leaves_list_unmodified() {
        let mut state = ConversationState::default();
        assert!(state.begin_exchange("").is_none());
        assert!(state.begin_exchange("   \n\t ").is_none());
        assert!(state.messages().is_empty());
    }

    #[test]
    fn tokens_concatenate_then_final_wins() {
        // Scenario A: tokens accumulate and the final payload overwrites them.
        let mut state = ConversationState::default();
        let exchange = state.begin_exchange("hi").expect("accepted");

        state.apply_event(&exchange.draft_id, &token("He"));
        state.apply_event(&exchange.draft_id, &token("llo"));
        assert_eq!(state.messages()[1].content, "Hello");
        assert_eq!(state.messages()[1].status, MessageStatus::Loading);

        state.apply_event(&exchange.draft_id, &final_event("Hello"));
        assert_eq!(state.messages()[1].content, "Hello");
        assert_eq!(state.messages()[1].status, MessageStatus::Sent);
        assert!(!state.is_streaming());
    }

    #[test]
    fn tokens_stand_when_no_final_arrives() {
        let mut state = ConversationState::default();
        let exchange = state.begin_exchange("hi").expect("accepted");

        state.apply_event(&exchange.draft_id, &token("partial "));
        state.apply_event(&exchange.draft_id, &token("answer"));
        state.complete_draft(&exchange.draft_id);

        assert_eq!(state.messages()[1].content, "partial answer");
        assert_eq!(state.messages()[1].status, MessageStatus::Sent);
    }

    #[test]
    fn empty_final_keeps_accumulated_tokens() {
        let mut state = ConversationState::default();
        let exchange = state.begin_exchange("hi").expect("accepted");

        state.apply_event(&exchange.draft_id, &token("kept"));
        state.apply_event(&exchange.draft_id, &final_event(""));

        assert_eq!(state.messages()[1].content, "kept");
        assert_eq!(state.messages()[1].status, MessageStatus::Sent);
    }

    #[test]
    fn error_event_settles_draft_with_prefixed_message() {
        // Scenario B.
        let mut state = ConversationState::default();
        let exchange = state.begin_exchange("x").expect("accepted");

        state.apply_event(
            &exchange.draft_id,
            &StreamEvent::Error {
                message: "rate limited".to_string(),
            },
        );

        let draft = &state.messages()[1];
        assert_eq!(draft.content, "Error: rate limited");
        assert_eq!(draft.status, MessageStatus::Error);
        assert_eq!(draft.error.as_deref(), Some("rate limited"));
    }

    #[test]
    fn transport_failure_settles_draft() {
        // Scenario D.
        let mut state = ConversationState::default();
        let exchange = state.begin_exchange("hi").expect("accepted");

        state.fail_draft(&exchange.draft_id, "Network error");

        let draft = &state.messages()[1];
        assert_eq!(draft.content, "Error: Network error");
        assert_eq!(draft.status, MessageStatus::Error);
    }

    #[test]
    fn token_clears_active_tool() {
        // Scenario C.
        let mut state = ConversationState::default();
        let exchange = state.begin_exchange("hi").expect("accepted");

        state.apply_event(
            &exchange.draft_id,
            &StreamEvent::ToolStart {
                tool: "search".to_string(),
                tool_icon: "icon1".to_string(),
                chat_id: Some("c1".to_string()),
            },
        );
        assert_eq!(state.active_tool().map(|tool| tool.name.as_str()), Some("search"));

        state.apply_event(&exchange.draft_id, &token("a"));
        assert!(state.active_tool().is_none());
        assert_eq!(state.messages()[1].content, "a");
    }

    #[test]
    fn mismatched_tool_end_leaves_active_tool() {
        let mut state = ConversationState::default();
        let exchange = state.begin_exchange("hi").expect("accepted");

        state.apply_event(
            &exchange.draft_id,
            &StreamEvent::ToolStart {
                tool: "browse".to_string(),
                tool_icon: "icon2".to_string(),
                chat_id: None,
            },
        );
        state.apply_event(
            &exchange.draft_id,
            &StreamEvent::ToolEnd {
                tool: "search".to_string(),
                tool_icon: "icon1".to_string(),
                chat_id: None,
            },
        );
        assert_eq!(state.active_tool().map(|tool| tool.name.as_str()), Some("browse"));

        state.apply_event(
            &exchange.draft_id,
            &StreamEvent::ToolEnd {
                tool: "browse".to_string(),
                tool_icon: "icon2".to_string(),
                chat_id: None,
            },
        );
        assert!(state.active_tool().is_none());
    }

    #[test]
    fn terminal_draft_ignores_further_events() {
        let mut state = ConversationState::default();
        let exchange = state.begin_exchange("hi").expect("accepted");

        state.apply_event(&exchange.draft_id, &final_event("done"));
        state.apply_event(&exchange.draft_id, &token("late"));
        state.fail_draft(&exchange.draft_id, "too late");

        assert_eq!(state.messages()[1].content, "done");
        assert_eq!(state.messages()[1].status, MessageStatus::Sent);
    }

    #[test]
    fn missing_draft_is_a_silent_no_op() {
        let mut state = ConversationState::default();
        state.apply_event("nobody-assistant", &token("lost"));
        state.fail_draft("nobody-assistant", "lost");
        assert!(state.messages().is_empty());
    }

    #[test]
    fn chat_id_is_adopted_once() {
        let mut state = ConversationState::default();
        let exchange = state.begin_exchange("hi").expect("accepted");
        assert_eq!(exchange.chat_id, None);

        state.apply_event(&exchange.draft_id, &token("a"));
        assert_eq!(state.chat_id(), Some("c1"));

        state.apply_event(
            &exchange.draft_id,
            &StreamEvent::Token {
                content: json!("b"),
                chat_id: Some("c2".to_string()),
            },
        );
        assert_eq!(state.chat_id(), Some("c1"));
    }

    #[test]
    fn resumed_conversation_routes_submissions_to_it() {
        let mut state = ConversationState::new(Some("existing".to_string()));
        let exchange = state.begin_exchange("hi").expect("accepted");
        assert_eq!(exchange.chat_id.as_deref(), Some("existing"));
    }

    #[test]
    fn concurrent_exchanges_keep_their_own_drafts() {
        let mut state = ConversationState::default();
        let first = state.begin_exchange("one").expect("accepted");
        let second = state.begin_exchange("two").expect("accepted");

        state.apply_event(&first.draft_id, &token("alpha"));
        state.apply_event(&second.draft_id, &token("beta"));
        state.apply_event(&first.draft_id, &final_event("alpha!"));

        let drafts: Vec<_> = state
            .messages()
            .iter()
            .filter(|message| message.role == Role::Assistant)
            .collect();
        assert_eq!(drafts[0].content, "alpha!");
        assert_eq!(drafts[0].status, MessageStatus::Sent);
        assert_eq!(drafts[1].content, "beta");
        assert_eq!(drafts[1].status, MessageStatus::Loading);
    }

    #[test]
    fn nested_rich_content_tokens_extract_text() {
        let mut state = ConversationState::default();
        let exchange = state.begin_exchange("hi").expect("accepted");

        state.apply_event(
            &exchange.draft_id,
            &StreamEvent::Token {
                content: json!([{"text": "Hel"}, {"text": {"value": "lo"}}]),
                chat_id: None,
            },
        );

        assert_eq!(state.messages()[1].content, "Hello");
    }
}
