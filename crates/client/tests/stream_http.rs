use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use banter_client::{
    ApiClient, AuthSession, SessionStore, StreamEvent, StreamItem, StreamRequest,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn temp_session_store() -> Arc<SessionStore> {
    let dir: PathBuf = tempfile::tempdir().expect("create temp dir").keep();
    Arc::new(SessionStore::new(dir.join("session.json")))
}

async fn collect_items(handle: banter_client::ChatStreamHandle) -> Vec<StreamItem> {
    let banter_client::ChatStreamHandle { mut stream, worker } = handle;
    let worker_task = tokio::spawn(worker);

    let mut items = Vec::new();
    while let Some(item) = stream.recv().await {
        items.push(item);
    }

    worker_task.await.expect("worker completes");
    items
}

#[tokio::test(flavor = "multi_thread")]
async fn stream_delivers_events_in_order_then_completes() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"type\":\"tool_start\",\"tool\":\"search\",\"tool_icon\":\"icon1\",\"chat_id\":\"c1\"}\n",
        "data: {\"type\":\"tool_end\",\"tool\":\"search\",\"tool_icon\":\"icon1\",\"chat_id\":\"c1\"}\n",
        "data: {\"type\":\"token\",\"content\":\"He\",\"chat_id\":\"c1\"}\n",
        "\n",
        "data: {\"type\":\"token\",\"content\":\"llo\",\"chat_id\":\"c1\"}\n",
        "data: {\"type\":\"final\",\"message\":\"Hello\",\"chat_id\":\"c1\"}\n",
    );

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({ "message": "hi", "chat_id": null })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let api = ApiClient::new(server.uri(), temp_session_store()).expect("build client");
    let items = collect_items(api.stream_chat(StreamRequest::new("hi", None))).await;

    assert_eq!(items.len(), 6);
    assert!(matches!(
        &items[0],
        StreamItem::Event(StreamEvent::ToolStart { tool, .. }) if tool == "search"
    ));
    assert!(matches!(
        &items[1],
        StreamItem::Event(StreamEvent::ToolEnd { tool, .. }) if tool == "search"
    ));
    assert!(matches!(
        &items[2],
        StreamItem::Event(StreamEvent::Token { content, .. }) if content == &json!("He")
    ));
    assert!(matches!(
        &items[3],
        StreamItem::Event(StreamEvent::Token { content, .. }) if content == &json!("llo")
    ));
    assert!(matches!(
        &items[4],
        StreamItem::Event(StreamEvent::Final { message, .. }) if message == &json!("Hello")
    ));
    assert_eq!(items[5], StreamItem::Completed);
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_records_are_dropped_without_aborting() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"type\":\"token\",\"content\":\"a\",\"chat_id\":\"c1\"}\n",
        "data: {not json at all\n",
        "data: {\"type\":\"unknown_variant\"}\n",
        "data: {\"type\":\"token\",\"content\":\"b\",\"chat_id\":\"c1\"}\n",
    );

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let api = ApiClient::new(server.uri(), temp_session_store()).expect("build client");
    let items = collect_items(api.stream_chat(StreamRequest::new("hi", None))).await;

    assert_eq!(items.len(), 3);
    assert!(matches!(
        &items[0],
        StreamItem::Event(StreamEvent::Token { content, .. }) if content == &json!("a")
    ));
    assert!(matches!(
        &items[1],
        StreamItem::Event(StreamEvent::Token { content, .. }) if content == &json!("b")
    ));
    assert_eq!(items[2], StreamItem::Completed);
}

#[tokio::test(flavor = "multi_thread")]
async fn final_record_without_trailing_newline_is_flushed() {
    let server = MockServer::start().await;
    let body = "data: {\"type\":\"final\",\"message\":\"done\",\"chat_id\":\"c1\"}";

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let api = ApiClient::new(server.uri(), temp_session_store()).expect("build client");
    let items = collect_items(api.stream_chat(StreamRequest::new("hi", None))).await;

    assert_eq!(items.len(), 2);
    assert!(matches!(
        &items[0],
        StreamItem::Event(StreamEvent::Final { message, .. }) if message == &json!("done")
    ));
    assert_eq!(items[1], StreamItem::Completed);
}

#[tokio::test(flavor = "multi_thread")]
async fn non_success_status_fails_with_body_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(500).set_body_raw(r#"{"error":"generation failed"}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let api = ApiClient::new(server.uri(), temp_session_store()).expect("build client");
    let items = collect_items(api.stream_chat(StreamRequest::new("hi", None))).await;

    assert_eq!(
        items,
        vec![StreamItem::Failed {
            message: "generation failed".to_string()
        }]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unauthorized_stream_fails_without_touching_session() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(401).set_body_raw(r#"{"message":"jwt expired"}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let session = temp_session_store();
    session
        .sign_in(AuthSession::new("stale-token", ""))
        .expect("persist session");

    let api = ApiClient::new(server.uri(), session.clone()).expect("build client");
    let items = collect_items(api.stream_chat(StreamRequest::new("hi", None))).await;

    assert_eq!(
        items,
        vec![StreamItem::Failed {
            message: "jwt expired".to_string()
        }]
    );
    // Streaming failures settle the draft; only the JSON request helper
    // performs the forced sign-out.
    assert!(session.is_signed_in());
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_settles_the_call_and_suppresses_events() {
    let server = MockServer::start().await;
    let body = "data: {\"type\":\"token\",\"content\":\"late\",\"chat_id\":\"c1\"}\n";

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body, "text/event-stream")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let api = ApiClient::new(server.uri(), temp_session_store()).expect("build client");
    let banter_client::ChatStreamHandle { mut stream, worker } =
        api.stream_chat(StreamRequest::new("hi", None));
    let worker_task = tokio::spawn(worker);

    assert!(stream.cancel());

    let mut items = Vec::new();
    while let Some(item) = stream.recv().await {
        items.push(item);
    }
    worker_task.await.expect("worker completes");

    assert_eq!(
        items,
        vec![StreamItem::Failed {
            message: "Request aborted".to_string()
        }]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn bearer_credential_is_attached_when_signed_in() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(header("authorization", "Bearer token-123"))
        .and(header("accept", "text/event-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("", "text/event-stream"))
        .mount(&server)
        .await;

    let session = temp_session_store();
    session
        .sign_in(AuthSession::new("token-123", ""))
        .expect("persist session");

    let api = ApiClient::new(server.uri(), session).expect("build client");
    let items = collect_items(api.stream_chat(StreamRequest::new("hi", None))).await;

    assert_eq!(items, vec![StreamItem::Completed]);
}
