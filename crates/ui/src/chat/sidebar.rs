use std::rc::Rc;
use std::sync::Arc;

use banter_client::{ApiClient, Chat, DEFAULT_PAGE_SIZE, Pagination};
use gpui::*;
use gpui_component::{
    ActiveTheme, Icon, IconName, Sizable, VirtualListScrollHandle,
    button::{Button, ButtonVariants},
    h_flex,
    input::{Input, InputEvent, InputState},
    label::Label,
    list::ListItem,
    v_flex, v_virtual_list,
};
use gpui_tokio_bridge::Tokio;

use crate::chat::events::{
    ChatSelected, SidebarSettingsClicked, SidebarSignOutClicked, SidebarToggleClicked,
};

const CHAT_ROW_HEIGHT: f32 = 40.0;
const LOAD_MORE_ROW_HEIGHT: f32 = 36.0;

#[derive(Debug, Clone)]
enum SidebarListItem {
    Chat(Chat),
    LoadMore,
}

/// Conversation list backed by the remote chat-list endpoint, with paging,
/// client-side title filtering and per-row deletion.
pub struct ChatSidebar {
    search_input: Entity<InputState>,
    search_query: String,
    chats: Vec<Chat>,
    pagination: Option<Pagination>,
    selected_chat_id: Option<String>,
    loading: bool,
    list_error: Option<String>,
    flat_items: Vec<SidebarListItem>,
    item_sizes: Rc<Vec<Size<Pixels>>>,
    scroll_handle: VirtualListScrollHandle,
    api: Option<Arc<ApiClient>>,
    page_size: u32,
    list_task: Option<Task<()>>,
    delete_task: Option<Task<()>>,
}

impl EventEmitter<ChatSelected> for ChatSidebar {}
impl EventEmitter<SidebarSettingsClicked> for ChatSidebar {}
impl EventEmitter<SidebarToggleClicked> for ChatSidebar {}
impl EventEmitter<SidebarSignOutClicked> for ChatSidebar {}

impl ChatSidebar {
    pub fn new(window: &mut Window, cx: &mut Context<Self>) -> Self {
        let search_input =
            cx.new(|cx| InputState::new(window, cx).placeholder("Search conversations..."));

        cx.subscribe_in(
            &search_input,
            window,
            |this, _, _event: &InputEvent, _window, cx| {
                this.search_query = this.search_input.read(cx).value().to_string();
                this.rebuild_flat_items();
                cx.notify();
            },
        )
        .detach();

        Self {
            search_input,
            search_query: String::new(),
            chats: Vec::new(),
            pagination: None,
            selected_chat_id: None,
            loading: false,
            list_error: None,
            flat_items: Vec::new(),
            item_sizes: Rc::new(Vec::new()),
            scroll_handle: VirtualListScrollHandle::new(),
            api: None,
            page_size: DEFAULT_PAGE_SIZE,
            list_task: None,
            delete_task: None,
        }
    }

    pub fn selected_chat_id(&self) -> Option<&str> {
        self.selected_chat_id.as_deref()
    }

    /// Swaps the API client (settings changed or first sign-in) and reloads.
    pub fn set_api(&mut self, api: Option<Arc<ApiClient>>, page_size: u32, cx: &mut Context<Self>) {
        self.api = api;
        self.page_size = page_size.max(1);
        self.refresh(cx);
    }

    pub fn refresh(&mut self, cx: &mut Context<Self>) {
        self.fetch_page(1, cx);
    }

    pub fn load_more(&mut self, cx: &mut Context<Self>) {
        if self.loading {
            return;
        }

        let Some(pagination) = self.pagination else {
            return;
        };
        if !pagination.has_more {
            return;
        }

        self.fetch_page(pagination.page + 1, cx);
    }

    pub fn select_chat(&mut self, chat_id: String, cx: &mut Context<Self>) {
        if self.selected_chat_id.as_deref() == Some(chat_id.as_str()) {
            return;
        }

        self.selected_chat_id = Some(chat_id.clone());
        cx.emit(ChatSelected {
            chat_id: Some(chat_id),
        });
        cx.notify();
    }

    pub fn start_new_chat(&mut self, cx: &mut Context<Self>) {
        self.selected_chat_id = None;
        cx.emit(ChatSelected { chat_id: None });
        cx.notify();
    }

    /// Records the id the service assigned to a conversation started from
    /// scratch, then refreshes so the new row appears.
    pub fn adopt_created_chat(&mut self, chat_id: String, cx: &mut Context<Self>) {
        self.selected_chat_id = Some(chat_id);
        self.refresh(cx);
    }

    pub fn delete_chat(&mut self, chat_id: String, cx: &mut Context<Self>) {
        let Some(api) = self.api.clone() else {
            return;
        };

        let request = {
            let chat_id = chat_id.clone();
            Tokio::spawn(cx, async move { api.delete_chat(&chat_id).await })
        };

        self.delete_task = Some(cx.spawn(async move |this, cx| {
            let outcome = request.await;
            let _ = this.update(cx, |this, cx| {
                match outcome {
                    Ok(Ok(())) => {
                        if this.selected_chat_id.as_deref() == Some(chat_id.as_str()) {
                            this.start_new_chat(cx);
                        }
                        this.refresh(cx);
                    }
                    Ok(Err(error)) => {
                        tracing::error!("failed to delete chat {chat_id}: {error}");
                        this.list_error = Some(error.to_string());
                    }
                    Err(error) => {
                        tracing::error!("delete task for chat {chat_id} failed: {error}");
                        this.list_error = Some("failed to delete conversation".to_string());
                    }
                }
                cx.notify();
            });
        }));
    }

    fn fetch_page(&mut self, page: u32, cx: &mut Context<Self>) {
        let Some(api) = self.api.clone() else {
            self.chats.clear();
            self.pagination = None;
            self.list_error = None;
            self.rebuild_flat_items();
            cx.notify();
            return;
        };

        let page_size = self.page_size;
        self.loading = true;
        self.list_error = None;
        cx.notify();

        let request = Tokio::spawn(cx, async move { api.chat_list(page, page_size).await });

        self.list_task = Some(cx.spawn(async move |this, cx| {
            let outcome = request.await;
            let _ = this.update(cx, |this, cx| {
                this.loading = false;
                match outcome {
                    Ok(Ok(list)) => {
                        if list.pagination.page <= 1 {
                            this.chats = list.chats;
                        } else {
                            // Later pages append below what is already shown.
                            this.chats.extend(list.chats);
                        }
                        this.pagination = Some(list.pagination);
                    }
                    Ok(Err(error)) => {
                        tracing::error!("failed to load chat list page {page}: {error}");
                        this.list_error = Some(error.to_string());
                    }
                    Err(error) => {
                        tracing::error!("chat list task failed: {error}");
                        this.list_error = Some("failed to load conversations".to_string());
                    }
                }
                this.rebuild_flat_items();
                cx.notify();
            });
        }));
    }

    fn rebuild_flat_items(&mut self) {
        let normalized_query = self.search_query.trim().to_ascii_lowercase();

        let mut flat_items = Vec::new();
        let mut item_sizes = Vec::new();

        for chat in &self.chats {
            if !matches_query(chat, &normalized_query) {
                continue;
            }

            flat_items.push(SidebarListItem::Chat(chat.clone()));
            item_sizes.push(size(px(0.), px(CHAT_ROW_HEIGHT)));
        }

        // Paging footer only makes sense on the unfiltered list.
        if normalized_query.is_empty()
            && self
                .pagination
                .is_some_and(|pagination| pagination.has_more)
        {
            flat_items.push(SidebarListItem::LoadMore);
            item_sizes.push(size(px(0.), px(LOAD_MORE_ROW_HEIGHT)));
        }

        self.flat_items = flat_items;
        self.item_sizes = Rc::new(item_sizes);
    }

    fn render_toolbar(&mut self, cx: &mut Context<Self>) -> impl IntoElement {
        h_flex()
            .w_full()
            .min_w_0()
            .gap_2()
            .px_3()
            .pt(px(8.))
            .pb_2()
            .child(Input::new(&self.search_input).w_full().small())
            .child(
                Button::new("new")
                    .small()
                    .primary()
                    .icon(IconName::Plus)
                    .child("New")
                    .on_click(cx.listener(|this, _, _window, cx| {
                        this.start_new_chat(cx);
                    })),
            )
    }

    fn render_empty_state(&mut self, cx: &mut Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let message = if let Some(error) = &self.list_error {
            error.clone()
        } else if self.loading {
            "Loading conversations...".to_string()
        } else if self.api.is_none() {
            "Configure the chat API in settings".to_string()
        } else if self.chats.is_empty() {
            "No conversations yet".to_string()
        } else {
            "No conversations match your search".to_string()
        };
        let color = if self.list_error.is_some() {
            theme.danger
        } else {
            theme.foreground.opacity(0.55)
        };

        v_flex()
            .flex_1()
            .items_center()
            .justify_center()
            .px_4()
            .child(Label::new(message).text_sm().text_color(color))
            .into_any_element()
    }

    fn render_chat_list(&mut self, cx: &mut Context<Self>) -> AnyElement {
        if self.flat_items.is_empty() {
            return self.render_empty_state(cx);
        }

        let selected = self.selected_chat_id.clone();
        let item_sizes = self.item_sizes.clone();
        let items = self.flat_items.clone();
        let loading = self.loading;

        v_flex()
            .flex_1()
            .min_h_0()
            .child(
                v_virtual_list(
                    cx.entity().clone(),
                    "chat-list",
                    item_sizes,
                    move |_this, visible_range, _scroll_handle, cx| {
                        let theme = cx.theme();

                        visible_range
                            .map(|index| match &items[index] {
                                SidebarListItem::Chat(chat) => {
                                    let chat_id = chat.id.clone();
                                    let delete_id = chat.id.clone();
                                    let title = chat.display_title().to_string();
                                    let is_selected = selected.as_deref() == Some(chat.id.as_str());

                                    div()
                                        .w_full()
                                        .h(px(CHAT_ROW_HEIGHT))
                                        .px_2()
                                        .child(
                                            ListItem::new(("chat", index))
                                                .w_full()
                                                .h_full()
                                                .px_3()
                                                .py_2()
                                                .rounded_md()
                                                .selected(is_selected)
                                                .on_click(cx.listener(
                                                    move |this, _event: &ClickEvent, _window, cx| {
                                                        this.select_chat(chat_id.clone(), cx);
                                                    },
                                                ))
                                                .child(
                                                    h_flex()
                                                        .w_full()
                                                        .items_center()
                                                        .gap_2()
                                                        .child(
                                                            div()
                                                                .flex_1()
                                                                .min_w_0()
                                                                .truncate()
                                                                .child(
                                                                    Label::new(title).text_sm(),
                                                                ),
                                                        )
                                                        .child(
                                                            Button::new(("delete-chat", index))
                                                                .ghost()
                                                                .xsmall()
                                                                .icon(IconName::CircleX)
                                                                .on_click(cx.listener(
                                                                    move |this, _, _window, cx| {
                                                                        this.delete_chat(
                                                                            delete_id.clone(),
                                                                            cx,
                                                                        );
                                                                    },
                                                                )),
                                                        ),
                                                ),
                                        )
                                        .into_any_element()
                                }
                                SidebarListItem::LoadMore => div()
                                    .w_full()
                                    .h(px(LOAD_MORE_ROW_HEIGHT))
                                    .px_2()
                                    .child(
                                        ListItem::new(("chat-load-more", index))
                                            .w_full()
                                            .h_full()
                                            .px_3()
                                            .py_2()
                                            .rounded_md()
                                            .on_click(cx.listener(
                                                move |this, _event: &ClickEvent, _window, cx| {
                                                    this.load_more(cx);
                                                },
                                            ))
                                            .child(
                                                Label::new(if loading {
                                                    "Loading..."
                                                } else {
                                                    "Load more"
                                                })
                                                .text_xs()
                                                .text_color(theme.foreground.opacity(0.6)),
                                            ),
                                    )
                                    .into_any_element(),
                            })
                            .collect()
                    },
                )
                .w_full()
                .flex_1()
                .track_scroll(&self.scroll_handle),
            )
            .into_any_element()
    }

    fn render_footer(&mut self, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        h_flex()
            .w_full()
            .min_w_0()
            .items_center()
            .justify_between()
            .px_3()
            .py_2()
            .border_t_1()
            .border_color(theme.border)
            .child(
                div()
                    .id("sidebar-user-center")
                    .size(px(32.))
                    .rounded_full()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.muted)
                    .flex()
                    .items_center()
                    .justify_center()
                    .child(
                        Icon::new(IconName::CircleUser)
                            .size(px(18.))
                            .text_color(theme.foreground),
                    ),
            )
            .child(
                h_flex()
                    .items_center()
                    .gap_1()
                    .child(
                        Button::new("sidebar-sign-out")
                            .ghost()
                            .small()
                            .child("Logout")
                            .on_click(cx.listener(|_, _, _, cx| {
                                cx.emit(SidebarSignOutClicked);
                            })),
                    )
                    .child(
                        Button::new("sidebar-settings")
                            .ghost()
                            .small()
                            .icon(IconName::Settings)
                            .on_click(cx.listener(|_, _, _, cx| {
                                cx.emit(SidebarSettingsClicked);
                            })),
                    )
                    .child(
                        Button::new("sidebar-toggle")
                            .ghost()
                            .small()
                            .icon(IconName::PanelLeftClose)
                            .on_click(cx.listener(|_, _, _, cx| {
                                cx.emit(SidebarToggleClicked);
                            })),
                    ),
            )
    }
}

impl Render for ChatSidebar {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .size_full()
            .min_w_0()
            .overflow_hidden()
            .bg(theme.background)
            .child(self.render_toolbar(cx))
            .child(self.render_chat_list(cx))
            .child(self.render_footer(cx))
    }
}

fn matches_query(chat: &Chat, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }

    chat.display_title().to_ascii_lowercase().contains(query)
}
