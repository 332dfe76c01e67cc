use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Format, Json},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use tokio::sync::watch;

pub const SESSION_DIRECTORY_NAME: &str = "banter";
pub const SESSION_FILE_NAME: &str = "session.json";

/// Credentials handed out by the external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl AuthSession {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into().trim().to_string(),
            refresh_token: refresh_token.into().trim().to_string(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        let email = email.into().trim().to_string();
        self.email = if email.is_empty() { None } else { Some(email) };
        self
    }

    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty()
    }
}

/// Session-provider capability shared by the API client, the stream client
/// and the shell. Exposes the current bearer token and a change channel
/// instead of a module-level singleton.
pub struct SessionStore {
    session: ArcSwap<Option<AuthSession>>,
    session_path: PathBuf,
    change_tx: watch::Sender<Option<AuthSession>>,
}

impl SessionStore {
    pub fn default_session_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SESSION_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".banter"))
    }

    pub fn default_session_path() -> PathBuf {
        Self::default_session_dir().join(SESSION_FILE_NAME)
    }

    pub fn new(session_path: PathBuf) -> Self {
        let session = Self::load_from_disk(&session_path);
        let (change_tx, _) = watch::channel(session.clone());

        Self {
            session: ArcSwap::from_pointee(session),
            session_path,
            change_tx,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_session_path())
    }

    pub fn current(&self) -> Option<AuthSession> {
        self.session.load().as_ref().clone()
    }

    pub fn current_token(&self) -> Option<String> {
        self.session
            .load()
            .as_ref()
            .as_ref()
            .filter(|session| session.is_valid())
            .map(|session| session.access_token.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.current_token().is_some()
    }

    /// Subscribes to session changes; the receiver observes sign-in and
    /// sign-out transitions in order.
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthSession>> {
        self.change_tx.subscribe()
    }

    pub fn sign_in(&self, session: AuthSession) -> Result<(), SessionStoreError> {
        self.persist(&session)?;
        self.session.store(Arc::new(Some(session.clone())));
        let _ = self.change_tx.send(Some(session));
        Ok(())
    }

    /// Clears the local session. Invoked by explicit logout and by the
    /// request helper when the remote API rejects the credential.
    pub fn sign_out(&self) {
        if self.session_path.exists()
            && let Err(error) = std::fs::remove_file(&self.session_path)
        {
            tracing::warn!(
                "failed to remove persisted session at {:?}: {}",
                self.session_path,
                error
            );
        }

        self.session.store(Arc::new(None));
        let _ = self.change_tx.send(None);
    }

    fn load_from_disk(path: &PathBuf) -> Option<AuthSession> {
        if !path.exists() {
            tracing::info!("session file not found at {:?}, starting signed out", path);
            return None;
        }

        let figment = Figment::new().merge(Json::file(path));
        match figment.extract::<AuthSession>() {
            Ok(session) if session.is_valid() => Some(session),
            Ok(_) => {
                tracing::warn!("persisted session at {:?} has no access token", path);
                None
            }
            Err(error) => {
                tracing::warn!(
                    "failed to parse session from {:?}: {}. starting signed out",
                    path,
                    error
                );
                None
            }
        }
    }

    fn persist(&self, session: &AuthSession) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.session_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-session-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(session).context(SerializeSessionSnafu {
            stage: "serialize-session-json",
        })?;

        let temp_path = self.session_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-session-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.session_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-session-file",
            from: temp_path,
            to: self.session_path.clone(),
        })?;

        tracing::info!("saved session to {:?}", self.session_path);
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SessionStoreError {
    #[snafu(display("failed to create session directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize session on `{stage}`: {source}"))]
    SerializeSession {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write session file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace session file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_session_path(name: &str) -> PathBuf {
        tempfile::tempdir()
            .expect("create temp dir")
            .keep()
            .join(name)
    }

    #[test]
    fn sign_in_round_trips_through_disk() {
        let path = temp_session_path("session.json");
        let store = SessionStore::new(path.clone());
        assert!(store.current_token().is_none());

        let session = AuthSession::new("token-abc", "refresh-def").with_email("user@example.com");
        store.sign_in(session.clone()).expect("persist session");

        assert_eq!(store.current_token().as_deref(), Some("token-abc"));

        let reloaded = SessionStore::new(path);
        assert_eq!(reloaded.current(), Some(session));
    }

    #[test]
    fn sign_out_clears_store_and_disk() {
        let path = temp_session_path("session.json");
        let store = SessionStore::new(path.clone());
        store
            .sign_in(AuthSession::new("token", ""))
            .expect("persist session");

        store.sign_out();

        assert!(store.current_token().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn subscribers_observe_sign_in_and_sign_out() {
        let store = SessionStore::new(temp_session_path("session.json"));
        let rx = store.subscribe();

        store
            .sign_in(AuthSession::new("token", ""))
            .expect("persist session");
        assert!(rx.borrow().is_some());

        store.sign_out();
        assert!(rx.borrow().is_none());
    }

    #[test]
    fn blank_access_token_is_not_a_session() {
        let store = SessionStore::new(temp_session_path("session.json"));
        store
            .sign_in(AuthSession::new("   ", "refresh"))
            .expect("persist session");

        assert!(store.current_token().is_none());
        assert!(!store.is_signed_in());
    }
}
