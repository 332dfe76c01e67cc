use reqwest::header;
use serde_json::json;
use snafu::ResultExt;

use crate::api::{error_message_from_body, normalize_base_url, status_message};
use crate::error::{BuildHttpClientSnafu, ClientResult, StatusSnafu, TransportSnafu};

/// Thin boundary to the external identity provider. Sign-in itself happens
/// out of band: the provider emails a magic link, and the session tokens it
/// mints are handed to [`crate::SessionStore::sign_in`].
pub struct IdentityClient {
    http: reqwest::Client,
    base_url: String,
}

impl IdentityClient {
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let base_url = normalize_base_url(base_url.into(), "new-identity-client")?;
        let http = reqwest::Client::builder()
            .build()
            .context(BuildHttpClientSnafu {
                stage: "build-identity-client",
            })?;

        Ok(Self { http, base_url })
    }

    /// Requests a magic-link email for `email`.
    pub async fn send_magic_link(&self, email: &str) -> ClientResult<()> {
        let url = format!("{}/otp", self.base_url);

        tracing::debug!(%url, "requesting magic link");

        let response = self
            .http
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&json!({ "email": email, "create_user": true }))
            .send()
            .await
            .context(TransportSnafu {
                stage: "send-magic-link",
                url: url.clone(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message_from_body(&body).unwrap_or_else(|| status_message(status));
            return StatusSnafu {
                stage: "send-magic-link",
                url,
                status: status.as_u16(),
                message,
            }
            .fail();
        }

        Ok(())
    }
}
