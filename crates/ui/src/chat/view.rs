use std::sync::Arc;
use std::time::Duration;

use banter_client::{
    ApiClient, ChatStreamHandle, ConversationState, SessionStore, StreamItem, StreamRequest,
};
use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{ActiveTheme, Root, v_flex};
use gpui_tokio_bridge::Tokio;

use crate::chat::events::{
    ChatSelected, SidebarSettingsClicked, SidebarSignOutClicked, SidebarToggleClicked, Stop,
    Submit,
};
use crate::chat::{ChatSidebar, MessageInput, MessageList};
use crate::settings::{SettingsChanged, SettingsState, SettingsView};

pub const STREAM_SYNC_DEBOUNCE_MS: u64 = 50;

/// Failure shown when a submission happens before the API endpoint is set.
const API_NOT_CONFIGURED_MESSAGE: &str =
    "Chat API base URL is not configured. Open settings and set one.";

/// Tasks backing one in-flight exchange. Dropping them aborts the transport
/// and suppresses further deliveries for that draft.
struct StreamTasks {
    draft_id: String,
    _worker_task: Task<Result<(), gpui_tokio_bridge::JoinError>>,
    _reader_task: Task<()>,
}

/// Parent coordinator for sidebar/message list/input/stream orchestration.
pub struct ChatView {
    sidebar: Entity<ChatSidebar>,
    message_list: Entity<MessageList>,
    message_input: Entity<MessageInput>,
    settings_state: Entity<SettingsState>,
    settings_window: Option<WindowHandle<Root>>,
    session: Arc<SessionStore>,
    api: Option<Arc<ApiClient>>,
    api_error: Option<String>,
    conversation: ConversationState,
    stream_tasks: Vec<StreamTasks>,
    hydrate_task: Option<Task<()>>,
    sync_debounce_task: Option<Task<()>>,
}

impl EventEmitter<SidebarToggleClicked> for ChatView {}

impl ChatView {
    pub fn new(
        session: Arc<SessionStore>,
        settings_state: Entity<SettingsState>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let sidebar = cx.new(|cx| ChatSidebar::new(window, cx));
        let message_list = cx.new(MessageList::new);
        let message_input = cx.new(|cx| MessageInput::new(window, cx));

        let settings = settings_state.read(cx).settings();
        let (api, api_error) = Self::build_api(&settings.api_base_url, &session);

        sidebar.update(cx, |sidebar, cx| {
            sidebar.set_api(api.clone(), settings.chat_page_size, cx);
        });

        let this = Self {
            sidebar: sidebar.clone(),
            message_list,
            message_input: message_input.clone(),
            settings_state: settings_state.clone(),
            settings_window: None,
            session,
            api,
            api_error,
            conversation: ConversationState::new(None),
            stream_tasks: Vec::new(),
            hydrate_task: None,
            sync_debounce_task: None,
        };

        cx.subscribe(&sidebar, |this, _, event: &ChatSelected, cx| {
            this.handle_chat_selected(event.clone(), cx);
        })
        .detach();

        cx.subscribe(&sidebar, |this, _, _event: &SidebarSettingsClicked, cx| {
            this.open_settings(cx);
        })
        .detach();

        cx.subscribe(&sidebar, |_, _, _event: &SidebarToggleClicked, cx| {
            cx.emit(SidebarToggleClicked);
        })
        .detach();

        cx.subscribe(&sidebar, |this, _, _event: &SidebarSignOutClicked, _cx| {
            tracing::info!("user requested sign-out");
            this.session.sign_out();
        })
        .detach();

        cx.subscribe(&message_input, |this, _, event: &Submit, cx| {
            this.handle_submit(event.clone(), cx);
        })
        .detach();

        cx.subscribe(&message_input, |this, _, _event: &Stop, cx| {
            this.handle_stop(cx);
        })
        .detach();

        cx.subscribe(&settings_state, |this, _, event: &SettingsChanged, cx| {
            this.handle_settings_changed(event, cx);
        })
        .detach();

        this
    }

    pub fn sidebar(&self) -> &Entity<ChatSidebar> {
        &self.sidebar
    }

    /// Starts a fresh conversation (shell `NewChat` action).
    pub fn new_conversation(&mut self, cx: &mut Context<Self>) {
        self.sidebar
            .update(cx, |sidebar, cx| sidebar.start_new_chat(cx));
    }

    pub fn open_settings_panel(&mut self, cx: &mut Context<Self>) {
        self.open_settings(cx);
    }

    /// Reacts to sign-in/sign-out transitions observed by the shell.
    pub fn handle_session_changed(&mut self, signed_in: bool, cx: &mut Context<Self>) {
        if signed_in {
            self.sidebar.update(cx, |sidebar, cx| sidebar.refresh(cx));
            return;
        }

        self.abort_streams();
        self.conversation.reset(None);
        self.sync_messages(cx, true);
        self.message_input.update(cx, |input, cx| {
            input.set_streaming(false, cx);
        });
    }

    fn build_api(
        api_base_url: &str,
        session: &Arc<SessionStore>,
    ) -> (Option<Arc<ApiClient>>, Option<String>) {
        if api_base_url.trim().is_empty() {
            return (None, None);
        }

        match ApiClient::new(api_base_url, session.clone()) {
            Ok(api) => (Some(Arc::new(api)), None),
            Err(error) => {
                tracing::error!("failed to build api client: {error}");
                (None, Some(error.to_string()))
            }
        }
    }

    fn handle_settings_changed(&mut self, event: &SettingsChanged, cx: &mut Context<Self>) {
        // Endpoint changes invalidate in-flight generations.
        self.settle_streams_as_aborted(cx);

        event.settings.apply_theme(None, cx);
        cx.refresh_windows();

        let (api, api_error) = Self::build_api(&event.settings.api_base_url, &self.session);
        self.api = api.clone();
        self.api_error = api_error;

        self.sidebar.update(cx, |sidebar, cx| {
            sidebar.set_api(api, event.settings.chat_page_size, cx);
        });

        tracing::info!("reloaded api client with new settings");
        cx.notify();
    }

    fn handle_chat_selected(&mut self, event: ChatSelected, cx: &mut Context<Self>) {
        if event.chat_id.is_some() && event.chat_id.as_deref() == self.conversation.chat_id() {
            return;
        }

        // Navigating away aborts whatever is still streaming; late events
        // would address drafts that no longer exist anyway.
        self.abort_streams();
        self.conversation.reset(event.chat_id.clone());
        self.sync_messages(cx, true);
        self.message_input.update(cx, |input, cx| {
            input.set_streaming(false, cx);
        });

        if let Some(chat_id) = event.chat_id {
            self.hydrate_history(chat_id, cx);
        }
    }

    fn hydrate_history(&mut self, chat_id: String, cx: &mut Context<Self>) {
        let Some(api) = self.api.clone() else {
            return;
        };

        let request = {
            let chat_id = chat_id.clone();
            Tokio::spawn(cx, async move { api.chat_messages(&chat_id).await })
        };

        self.hydrate_task = Some(cx.spawn(async move |this, cx| {
            let outcome = request.await;
            let _ = this.update(cx, |this, cx| {
                // The user may have navigated on while the fetch was in
                // flight; only the still-current conversation hydrates.
                if this.conversation.chat_id() != Some(chat_id.as_str()) {
                    return;
                }

                match outcome {
                    Ok(Ok(thread)) => {
                        let messages = thread
                            .messages
                            .into_iter()
                            .map(|message| message.into_chat_message())
                            .collect();
                        this.conversation.hydrate(messages);
                        this.sync_messages(cx, true);
                    }
                    Ok(Err(error)) => {
                        tracing::error!("failed to load history for {chat_id}: {error}");
                    }
                    Err(error) => {
                        tracing::error!("history task for {chat_id} failed: {error}");
                    }
                }
            });
        }));
    }

    fn handle_submit(&mut self, event: Submit, cx: &mut Context<Self>) {
        let Some(exchange) = self.conversation.begin_exchange(&event.content) else {
            return;
        };

        let Some(api) = self.api.clone() else {
            let message = self
                .api_error
                .clone()
                .unwrap_or_else(|| API_NOT_CONFIGURED_MESSAGE.to_string());
            self.conversation.fail_draft(&exchange.draft_id, &message);
            self.sync_messages(cx, false);
            return;
        };

        let handle = api.stream_chat(StreamRequest::new(
            exchange.message.clone(),
            exchange.chat_id.clone(),
        ));
        self.spawn_stream_pipeline(exchange.draft_id, handle, cx);

        self.message_input.update(cx, |input, cx| {
            input.set_streaming(true, cx);
        });
        self.sync_messages(cx, false);
    }

    fn spawn_stream_pipeline(
        &mut self,
        draft_id: String,
        handle: ChatStreamHandle,
        cx: &mut Context<Self>,
    ) {
        let ChatStreamHandle { mut stream, worker } = handle;
        let worker_task = Tokio::spawn(cx, worker);

        let reader_draft_id = draft_id.clone();
        let reader_task = cx.spawn(async move |this, cx| {
            while let Some(item) = stream.recv().await {
                let terminal = matches!(item, StreamItem::Completed | StreamItem::Failed { .. });
                let _ = this.update(cx, |this, cx| {
                    this.handle_stream_item(&reader_draft_id, item, cx);
                });
                if terminal {
                    break;
                }
            }

            let _ = this.update(cx, |this, cx| {
                this.handle_stream_closed(&reader_draft_id, cx);
            });
        });

        self.stream_tasks.push(StreamTasks {
            draft_id,
            _worker_task: worker_task,
            _reader_task: reader_task,
        });
    }

    fn handle_stream_item(&mut self, draft_id: &str, item: StreamItem, cx: &mut Context<Self>) {
        match item {
            StreamItem::Event(event) => {
                let chat_id_was_known = self.conversation.chat_id().is_some();
                self.conversation.apply_event(draft_id, &event);

                if !chat_id_was_known
                    && let Some(chat_id) = self.conversation.chat_id()
                {
                    // The service just created the conversation; surface it
                    // in the sidebar.
                    let chat_id = chat_id.to_string();
                    self.sidebar.update(cx, |sidebar, cx| {
                        sidebar.adopt_created_chat(chat_id, cx);
                    });
                }

                self.schedule_debounced_sync(cx);
            }
            StreamItem::Completed => {
                self.conversation.complete_draft(draft_id);
                self.finish_stream_sync(cx);
            }
            StreamItem::Failed { message } => {
                self.conversation.fail_draft(draft_id, &message);
                self.finish_stream_sync(cx);
            }
        }
    }

    fn handle_stream_closed(&mut self, draft_id: &str, cx: &mut Context<Self>) {
        self.stream_tasks.retain(|tasks| tasks.draft_id != draft_id);

        // A stream that closed without a terminal item died mid-flight.
        if self
            .conversation
            .messages()
            .iter()
            .any(|message| message.id == draft_id && !message.is_terminal())
        {
            self.conversation
                .fail_draft(draft_id, "stream ended before completion");
        }

        self.finish_stream_sync(cx);
    }

    fn handle_stop(&mut self, cx: &mut Context<Self>) {
        self.settle_streams_as_aborted(cx);
    }

    /// Aborts every in-flight stream and settles its draft with the
    /// cancellation error.
    fn settle_streams_as_aborted(&mut self, cx: &mut Context<Self>) {
        if self.stream_tasks.is_empty() {
            return;
        }

        let aborted = std::mem::take(&mut self.stream_tasks);
        for tasks in &aborted {
            self.conversation.fail_draft(&tasks.draft_id, "Request aborted");
        }
        drop(aborted);

        self.finish_stream_sync(cx);
    }

    /// Drops stream tasks without settling drafts; used when the message
    /// list is about to be cleared anyway.
    fn abort_streams(&mut self) {
        self.stream_tasks.clear();
        self.sync_debounce_task = None;
    }

    fn finish_stream_sync(&mut self, cx: &mut Context<Self>) {
        self.sync_debounce_task = None;
        self.sync_messages(cx, false);

        let is_streaming = self.conversation.is_streaming();
        self.message_input.update(cx, |input, cx| {
            input.set_streaming(is_streaming, cx);
        });
    }

    fn schedule_debounced_sync(&mut self, cx: &mut Context<Self>) {
        if self.sync_debounce_task.is_some() {
            return;
        }

        self.sync_debounce_task = Some(cx.spawn(async move |this, cx| {
            // Batch token bursts into one list update roughly every 50ms.
            cx.background_executor()
                .timer(Duration::from_millis(STREAM_SYNC_DEBOUNCE_MS))
                .await;

            let _ = this.update(cx, |this, cx| {
                this.sync_messages(cx, false);
                this.sync_debounce_task = None;
            });
        }));
    }

    fn sync_messages(&mut self, cx: &mut Context<Self>, reset_scroll: bool) {
        let messages = self.conversation.messages().to_vec();
        let active_tool = self.conversation.active_tool().cloned();

        self.message_list.update(cx, |list, cx| {
            if reset_scroll {
                list.reset_scroll_tracking(cx);
            }
            list.set_messages(messages, cx);
            list.set_active_tool(active_tool, cx);
        });

        cx.notify();
    }

    fn open_settings(&mut self, cx: &mut Context<Self>) {
        if let Some(settings_window) = self.settings_window.as_ref()
            && settings_window
                .update(cx, |_, window, _| {
                    window.activate_window();
                })
                .is_ok()
        {
            return;
        }

        self.settings_window = None;

        let settings_state = self.settings_state.clone();
        let settings_bounds = Bounds::centered(None, size(px(560.), px(520.)), cx);
        let settings_window = cx.open_window(
            WindowOptions {
                window_bounds: Some(WindowBounds::Windowed(settings_bounds)),
                titlebar: Some(TitlebarOptions {
                    appears_transparent: true,
                    traffic_light_position: Some(point(px(14.), px(14.))),
                    ..Default::default()
                }),
                ..Default::default()
            },
            move |window, cx| {
                let settings_view = cx.new(|cx| SettingsView::new(&settings_state, window, cx));
                cx.new(|cx| Root::new(settings_view, window, cx))
            },
        );

        match settings_window {
            Ok(settings_window) => {
                self.settings_window = Some(settings_window);
            }
            Err(error) => {
                tracing::error!("failed to open settings window: {}", error);
            }
        }
    }
}

impl Render for ChatView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let api_error = self.api_error.clone();

        v_flex()
            .id("chat-view")
            .relative()
            .size_full()
            .min_h_0()
            .overflow_hidden()
            .bg(theme.background)
            .when_some(api_error, |column, error| {
                column.child(
                    div()
                        .id("chat-view-api-error")
                        .w_full()
                        .px_4()
                        .py_2()
                        .text_sm()
                        .text_color(theme.danger)
                        .border_b_1()
                        .border_color(theme.border)
                        .child(error),
                )
            })
            .child(
                div()
                    .id("chat-view-message-list")
                    .flex_1()
                    .min_h_0()
                    .child(self.message_list.clone()),
            )
            .child(
                div()
                    .id("chat-view-message-input")
                    .flex_shrink_0()
                    .w_full()
                    .border_t_1()
                    .border_color(theme.border)
                    .child(self.message_input.clone()),
            )
    }
}
