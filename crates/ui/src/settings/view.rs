use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{
    ActiveTheme, Sizable, ThemeMode,
    button::{Button, ButtonVariants},
    h_flex,
    input::{Input, InputState},
    v_flex,
};

use super::state::{AppSettings, SettingsState};

/// Settings window: service endpoints, list paging and theme mode.
pub struct SettingsView {
    settings_state: Entity<SettingsState>,
    api_url_input: Entity<InputState>,
    identity_url_input: Entity<InputState>,
    page_size_input: Entity<InputState>,
    theme_mode: ThemeMode,
    theme_name: String,
    error_message: Option<String>,
}

impl SettingsView {
    pub fn new(
        settings_state: &Entity<SettingsState>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let settings = settings_state.read(cx).settings();

        let api_url_input =
            cx.new(|cx| InputState::new(window, cx).placeholder("https://chat.example.com"));
        api_url_input.update(cx, |state, cx| {
            state.set_value(settings.api_base_url.clone(), window, cx);
        });

        let identity_url_input =
            cx.new(|cx| InputState::new(window, cx).placeholder("https://id.example.com/auth/v1"));
        identity_url_input.update(cx, |state, cx| {
            state.set_value(settings.identity_base_url.clone(), window, cx);
        });

        let page_size_input = cx.new(|cx| InputState::new(window, cx).placeholder("20"));
        page_size_input.update(cx, |state, cx| {
            state.set_value(settings.chat_page_size.to_string(), window, cx);
        });

        Self {
            settings_state: settings_state.clone(),
            api_url_input,
            identity_url_input,
            page_size_input,
            theme_mode: settings.theme_mode,
            theme_name: settings.theme_name.clone(),
            error_message: None,
        }
    }

    fn select_light_mode(
        &mut self,
        _event: &ClickEvent,
        _window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        self.theme_mode = ThemeMode::Light;
        cx.notify();
    }

    fn select_dark_mode(
        &mut self,
        _event: &ClickEvent,
        _window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        self.theme_mode = ThemeMode::Dark;
        cx.notify();
    }

    fn save_settings(&mut self, _event: &ClickEvent, window: &mut Window, cx: &mut Context<Self>) {
        let page_size_raw = self.page_size_input.read(cx).value().to_string();
        let Ok(chat_page_size) = page_size_raw.trim().parse::<u32>() else {
            self.error_message = Some(format!("'{}' is not a valid page size", page_size_raw));
            cx.notify();
            return;
        };

        let settings = AppSettings {
            api_base_url: self.api_url_input.read(cx).value().to_string(),
            identity_base_url: self.identity_url_input.read(cx).value().to_string(),
            chat_page_size,
            theme_mode: self.theme_mode,
            theme_name: self.theme_name.clone(),
        };

        let result = self
            .settings_state
            .update(cx, |state, cx| state.update_settings(settings, cx));

        match result {
            Ok(()) => window.remove_window(),
            Err(error) => {
                tracing::error!("failed to save settings: {error}");
                self.error_message = Some(error.to_string());
                cx.notify();
            }
        }
    }

    fn cancel(&mut self, _event: &ClickEvent, window: &mut Window, _cx: &mut Context<Self>) {
        window.remove_window();
    }

    fn render_field(
        &self,
        label: &'static str,
        input: &Entity<InputState>,
        cx: &Context<Self>,
    ) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .gap_1()
            .child(div().text_sm().text_color(theme.foreground).child(label))
            .child(Input::new(input).w_full())
    }
}

impl Render for SettingsView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .id("settings-view")
            .size_full()
            .gap_4()
            .p_4()
            .bg(theme.background)
            .child(
                div()
                    .text_lg()
                    .font_weight(FontWeight::SEMIBOLD)
                    .text_color(theme.foreground)
                    .child("Settings"),
            )
            .child(self.render_field("Chat API base URL", &self.api_url_input, cx))
            .child(self.render_field("Identity provider base URL", &self.identity_url_input, cx))
            .child(self.render_field("Chat list page size", &self.page_size_input, cx))
            .child(
                v_flex()
                    .gap_1()
                    .child(
                        div()
                            .text_sm()
                            .text_color(theme.foreground)
                            .child("Theme Mode"),
                    )
                    .child(
                        h_flex()
                            .gap_2()
                            .child(
                                Button::new("settings-theme-light")
                                    .small()
                                    .when(self.theme_mode == ThemeMode::Light, |button| {
                                        button.primary()
                                    })
                                    .when(self.theme_mode != ThemeMode::Light, |button| {
                                        button.ghost()
                                    })
                                    .child("Light")
                                    .on_click(cx.listener(SettingsView::select_light_mode)),
                            )
                            .child(
                                Button::new("settings-theme-dark")
                                    .small()
                                    .when(self.theme_mode == ThemeMode::Dark, |button| {
                                        button.primary()
                                    })
                                    .when(self.theme_mode != ThemeMode::Dark, |button| {
                                        button.ghost()
                                    })
                                    .child("Dark")
                                    .on_click(cx.listener(SettingsView::select_dark_mode)),
                            ),
                    ),
            )
            .when_some(self.error_message.clone(), |el, error| {
                el.child(div().text_sm().text_color(theme.danger).child(error))
            })
            .child(
                h_flex()
                    .gap_2()
                    .justify_end()
                    .child(
                        Button::new("settings-cancel")
                            .ghost()
                            .small()
                            .child("Cancel")
                            .on_click(cx.listener(SettingsView::cancel)),
                    )
                    .child(
                        Button::new("settings-save")
                            .primary()
                            .small()
                            .child("Save")
                            .on_click(cx.listener(SettingsView::save_settings)),
                    ),
            )
    }
}
