use std::sync::Arc;

use banter_client::{AuthSession, IdentityClient, SessionStore};
use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{
    ActiveTheme, Sizable,
    button::{Button, ButtonVariants},
    input::{Input, InputState},
    v_flex,
};
use gpui_tokio_bridge::Tokio;

use crate::settings::SettingsState;

/// Outcome line shown under the login controls.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StatusLine {
    text: String,
    is_error: bool,
}

/// Login screen: requests a magic-link email from the identity provider and
/// establishes a session from the token pair the link hands back.
pub struct LoginView {
    session: Arc<SessionStore>,
    settings_state: Entity<SettingsState>,
    email_input: Entity<InputState>,
    access_token_input: Entity<InputState>,
    refresh_token_input: Entity<InputState>,
    status: Option<StatusLine>,
    sending_magic_link: bool,
    magic_link_task: Option<Task<()>>,
}

impl LoginView {
    pub fn new(
        session: Arc<SessionStore>,
        settings_state: Entity<SettingsState>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let email_input = cx.new(|cx| InputState::new(window, cx).placeholder("you@example.com"));
        let access_token_input =
            cx.new(|cx| InputState::new(window, cx).placeholder("Access token"));
        let refresh_token_input =
            cx.new(|cx| InputState::new(window, cx).placeholder("Refresh token (optional)"));

        Self {
            session,
            settings_state,
            email_input,
            access_token_input,
            refresh_token_input,
            status: None,
            sending_magic_link: false,
            magic_link_task: None,
        }
    }

    fn set_status(&mut self, text: impl Into<String>, is_error: bool, cx: &mut Context<Self>) {
        self.status = Some(StatusLine {
            text: text.into(),
            is_error,
        });
        cx.notify();
    }

    fn handle_send_magic_link(
        &mut self,
        _event: &ClickEvent,
        _window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        if self.sending_magic_link {
            return;
        }

        let email = self.email_input.read(cx).value().trim().to_string();
        if email.is_empty() {
            self.set_status("Enter your email address first", true, cx);
            return;
        }

        let identity_base_url = self
            .settings_state
            .read(cx)
            .settings()
            .identity_base_url
            .clone();
        if identity_base_url.is_empty() {
            self.set_status(
                "Identity provider URL is not configured. Open settings.",
                true,
                cx,
            );
            return;
        }

        self.sending_magic_link = true;
        self.set_status(format!("Sending magic link to {email}..."), false, cx);

        let request_email = email.clone();
        let request = Tokio::spawn(cx, async move {
            IdentityClient::new(identity_base_url)?
                .send_magic_link(&request_email)
                .await
        });

        self.magic_link_task = Some(cx.spawn(async move |this, cx| {
            let outcome = request.await;
            let _ = this.update(cx, |this, cx| {
                this.sending_magic_link = false;
                match outcome {
                    Ok(Ok(())) => {
                        this.set_status(
                            format!("Magic link sent to {email}. Open it, then paste the session tokens below."),
                            false,
                            cx,
                        );
                    }
                    Ok(Err(error)) => {
                        tracing::error!("magic link request failed: {error}");
                        this.set_status(error.to_string(), true, cx);
                    }
                    Err(error) => {
                        tracing::error!("magic link task failed: {error}");
                        this.set_status("Magic link request failed", true, cx);
                    }
                }
            });
        }));
    }

    fn handle_sign_in(&mut self, _event: &ClickEvent, _window: &mut Window, cx: &mut Context<Self>) {
        let access_token = self.access_token_input.read(cx).value().trim().to_string();
        if access_token.is_empty() {
            self.set_status("Paste the access token from the magic link", true, cx);
            return;
        }

        let refresh_token = self.refresh_token_input.read(cx).value().trim().to_string();
        let email = self.email_input.read(cx).value().trim().to_string();
        let session = AuthSession::new(access_token, refresh_token).with_email(email);

        match self.session.sign_in(session) {
            Ok(()) => {
                // The shell observes the session change and swaps to the chat view.
                self.status = None;
                cx.notify();
            }
            Err(error) => {
                tracing::error!("failed to persist session: {error}");
                self.set_status(error.to_string(), true, cx);
            }
        }
    }
}

impl Render for LoginView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let status = self.status.clone();

        v_flex()
            .id("login-view")
            .w(px(380.))
            .gap_3()
            .p_6()
            .rounded_lg()
            .border_1()
            .border_color(theme.border)
            .bg(theme.background)
            .child(
                div()
                    .text_xl()
                    .font_weight(FontWeight::SEMIBOLD)
                    .text_color(theme.foreground)
                    .child("Sign in to Banter"),
            )
            .child(
                div()
                    .text_sm()
                    .text_color(theme.foreground.opacity(0.65))
                    .child("We'll email you a magic link. No password needed."),
            )
            .child(Input::new(&self.email_input).w_full())
            .child(
                Button::new("send-magic-link")
                    .primary()
                    .w_full()
                    .child("Send Magic Link")
                    .on_click(cx.listener(Self::handle_send_magic_link)),
            )
            .child(
                div()
                    .text_xs()
                    .text_color(theme.foreground.opacity(0.5))
                    .child("Already followed the link? Paste the session it issued:"),
            )
            .child(Input::new(&self.access_token_input).w_full())
            .child(Input::new(&self.refresh_token_input).w_full())
            .child(
                Button::new("sign-in")
                    .small()
                    .w_full()
                    .child("Sign In")
                    .on_click(cx.listener(Self::handle_sign_in)),
            )
            .when_some(status, |el, status| {
                let color = if status.is_error {
                    theme.danger
                } else {
                    theme.foreground.opacity(0.65)
                };
                el.child(div().text_sm().text_color(color).child(status.text))
            })
    }
}
