use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use reqwest::header;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};

use crate::api::{ApiClient, error_message_from_body, status_message};
use crate::event::StreamEvent;
use crate::session::SessionStore;
use crate::sse::SseParser;

/// Failure message used when the caller aborts an in-flight stream.
pub const CANCELLED_MESSAGE: &str = "Request aborted";
/// Failure message for connect/read transport errors.
pub const NETWORK_ERROR_MESSAGE: &str = "Network error";

/// One outbound chat request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub message: String,
    pub chat_id: Option<String>,
}

impl StreamRequest {
    pub fn new(message: impl Into<String>, chat_id: Option<String>) -> Self {
        Self {
            message: message.into(),
            chat_id,
        }
    }
}

/// One delivery from an open chat stream. `Completed` and `Failed` are
/// terminal; nothing follows them.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Event(StreamEvent),
    Completed,
    Failed { message: String },
}

pub type StreamWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Receiving half of one streaming call. Dropping it cancels the worker.
pub struct ChatStream {
    items: mpsc::UnboundedReceiver<StreamItem>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

impl ChatStream {
    fn new(items: mpsc::UnboundedReceiver<StreamItem>, cancel_tx: oneshot::Sender<()>) -> Self {
        Self {
            items,
            cancel_tx: Some(cancel_tx),
        }
    }

    pub async fn recv(&mut self) -> Option<StreamItem> {
        self.items.recv().await
    }

    pub fn try_recv(&mut self) -> Option<StreamItem> {
        self.items.try_recv().ok()
    }

    /// Aborts the in-flight transport operation. The worker settles the call
    /// with a cancellation failure and delivers nothing after it.
    pub fn cancel(&mut self) -> bool {
        self.cancel_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false)
    }
}

impl Drop for ChatStream {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }
}

/// Paired stream/worker for one call. The worker must be spawned onto a tokio
/// runtime; the stream half is consumed wherever the UI applies events.
pub struct ChatStreamHandle {
    pub stream: ChatStream,
    pub worker: StreamWorker,
}

impl ApiClient {
    /// Opens one streaming chat call.
    pub fn stream_chat(&self, request: StreamRequest) -> ChatStreamHandle {
        let (item_tx, item_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let worker: StreamWorker = Box::pin(run_stream_worker(
            self.http().clone(),
            self.endpoint("chat"),
            self.session().clone(),
            request,
            item_tx,
            cancel_rx,
        ));

        ChatStreamHandle {
            stream: ChatStream::new(item_rx, cancel_tx),
            worker,
        }
    }
}

async fn run_stream_worker(
    http: reqwest::Client,
    url: String,
    session: Arc<SessionStore>,
    request: StreamRequest,
    item_tx: mpsc::UnboundedSender<StreamItem>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    // The bearer credential is read fresh per call and sent as-is; an expired
    // token surfaces as a 401 failure rather than a retry.
    let mut builder = http
        .post(&url)
        .header(header::ACCEPT, "text/event-stream")
        .header(header::CONTENT_TYPE, "application/json")
        .json(&json!({
            "message": request.message,
            "chat_id": request.chat_id,
        }));

    if let Some(token) = session.current_token() {
        builder = builder.bearer_auth(token);
    }

    tracing::debug!(%url, chat_id = ?request.chat_id, "opening chat stream");

    let response = tokio::select! {
        _ = &mut cancel_rx => {
            tracing::debug!(%url, "chat stream cancelled before connect");
            emit_failure(&item_tx, CANCELLED_MESSAGE.to_string());
            return;
        }
        sent = builder.send() => match sent {
            Ok(response) => response,
            Err(error) => {
                tracing::error!(%url, error = %error, "chat stream connect failed");
                emit_failure(&item_tx, NETWORK_ERROR_MESSAGE.to_string());
                return;
            }
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = error_message_from_body(&body).unwrap_or_else(|| {
            format!("HTTP {}: {}", status.as_u16(), status_message(status))
        });
        tracing::warn!(%url, status = status.as_u16(), "chat stream rejected");
        emit_failure(&item_tx, message);
        return;
    }

    let mut parser = SseParser::new();
    let mut body = response.bytes_stream();

    loop {
        tokio::select! {
            _ = &mut cancel_rx => {
                tracing::debug!(%url, "chat stream cancelled");
                emit_failure(&item_tx, CANCELLED_MESSAGE.to_string());
                return;
            }
            chunk = body.next() => match chunk {
                Some(Ok(chunk)) => {
                    for payload in parser.feed(&chunk) {
                        if !deliver_payload(&item_tx, &payload) {
                            return;
                        }
                    }
                }
                Some(Err(error)) => {
                    tracing::error!(%url, error = %error, "chat stream read failed");
                    emit_failure(&item_tx, NETWORK_ERROR_MESSAGE.to_string());
                    return;
                }
                None => break,
            }
        }
    }

    if let Some(payload) = parser.finish()
        && !deliver_payload(&item_tx, &payload)
    {
        return;
    }

    tracing::debug!(%url, bytes = parser.bytes_consumed(), "chat stream completed");
    let _ = item_tx.send(StreamItem::Completed);
}

/// Parses one record payload and forwards it. Returns `false` once the
/// receiver is gone. A payload that fails to parse is dropped and logged; one
/// lost record must not abort an otherwise healthy generation.
fn deliver_payload(item_tx: &mpsc::UnboundedSender<StreamItem>, payload: &str) -> bool {
    match StreamEvent::parse(payload) {
        Ok(event) => item_tx.send(StreamItem::Event(event)).is_ok(),
        Err(error) => {
            tracing::warn!(%error, payload, "dropping malformed stream record");
            true
        }
    }
}

fn emit_failure(item_tx: &mpsc::UnboundedSender<StreamItem>, message: String) {
    let _ = item_tx.send(StreamItem::Failed { message });
}
