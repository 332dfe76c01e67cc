/// Emitted when sidebar selection changes the active conversation.
/// `chat_id = None` starts a brand-new conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSelected {
    pub chat_id: Option<String>,
}

/// Emitted when the user submits a prompt to generate a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submit {
    pub content: String,
}

impl Submit {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Emitted when the user requests cancellation of the in-flight streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stop;

/// Emitted when the sidebar settings button is clicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SidebarSettingsClicked;

/// Emitted when the sidebar collapse toggle is clicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SidebarToggleClicked;

/// Emitted when the sidebar logout button is clicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SidebarSignOutClicked;
