#![deny(unsafe_code)]

/// Remote chat API client: request helper plus the chat endpoints.
pub mod api;
/// Identity-provider boundary (magic-link requests).
pub mod auth;
/// Conversation reducer: message state and stream-event transitions.
pub mod conversation;
pub mod error;
/// Typed stream events and the payload text-extraction rule.
pub mod event;
/// Session snapshot store and change notification.
pub mod session;
/// Incremental server-sent-events record parser.
pub mod sse;
/// Streaming chat client: worker future plus event channel.
pub mod stream;

pub use api::{ApiClient, Chat, ChatList, ChatThread, DEFAULT_PAGE_SIZE, Pagination, ThreadMessage};
pub use auth::IdentityClient;
pub use conversation::{
    ActiveTool, ChatMessage, ConversationState, Exchange, MessageStatus, Role, draft_id_for,
};
pub use error::{ClientError, ClientResult};
pub use event::{StreamEvent, extract_text};
pub use session::{AuthSession, SessionStore};
pub use sse::SseParser;
pub use stream::{ChatStream, ChatStreamHandle, StreamItem, StreamRequest, StreamWorker};
