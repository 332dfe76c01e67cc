#![deny(unsafe_code)]

/// Desktop chat client shell and components.
///
/// This crate provides the GPUI application around `banter-client`: an
/// auth-gated shell, the login flow, the chat sidebar/view and settings.
pub mod app;
/// Login flow backed by the external identity provider.
pub mod auth;
/// Chat views and stream orchestration.
pub mod chat;
/// Settings persistence and UI.
pub mod settings;
