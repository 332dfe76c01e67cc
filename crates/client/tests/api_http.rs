use std::path::PathBuf;
use std::sync::Arc;

use banter_client::{ApiClient, AuthSession, ClientError, SessionStore};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn temp_session_store() -> Arc<SessionStore> {
    let dir: PathBuf = tempfile::tempdir().expect("create temp dir").keep();
    Arc::new(SessionStore::new(dir.join("session.json")))
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_list_decodes_one_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/chat/list"))
        .and(query_param("page", "1"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{
                "chats": [
                    {"id":"c1","created_by":"u1","created_at":"2026-01-02","is_public":false,"title":"Trip"},
                    {"id":"c2","created_by":"u1","created_at":"2026-01-01","is_public":false,"title":null}
                ],
                "pagination": {"page":1,"limit":20,"total":2,"hasMore":false,"totalPages":1}
            }"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let api = ApiClient::new(server.uri(), temp_session_store()).expect("build client");
    let list = api.chat_list(1, 20).await.expect("list chats");

    assert_eq!(list.chats.len(), 2);
    assert_eq!(list.chats[0].display_title(), "Trip");
    assert_eq!(list.chats[1].display_title(), "New conversation");
    assert!(!list.pagination.has_more);
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_messages_hydrates_history() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/chat/messages"))
        .and(query_param("chat_id", "c1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{
                "thread_id": "c1",
                "messages": [
                    {"id":"m1","role":"user","content":"hi"},
                    {"id":"m2","role":"assistant","content":"Hello","status":"sent"}
                ]
            }"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let api = ApiClient::new(server.uri(), temp_session_store()).expect("build client");
    let thread = api.chat_messages("c1").await.expect("load history");

    assert_eq!(thread.thread_id, "c1");
    assert_eq!(thread.messages.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn unauthorized_response_signs_the_session_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/chat/list"))
        .respond_with(
            ResponseTemplate::new(401).set_body_raw(r#"{"message":"jwt expired"}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let session = temp_session_store();
    session
        .sign_in(AuthSession::new("stale", ""))
        .expect("persist session");

    let api = ApiClient::new(server.uri(), session.clone()).expect("build client");
    let error = api.chat_list(1, 20).await.expect_err("rejected");

    assert!(matches!(error, ClientError::Unauthorized { .. }));
    assert!(!session.is_signed_in());
}

#[tokio::test(flavor = "multi_thread")]
async fn failure_message_comes_from_body_then_status_text() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/chat/messages"))
        .and(query_param("chat_id", "c1"))
        .respond_with(
            ResponseTemplate::new(500).set_body_raw(r#"{"error":"cannot delete"}"#, "application/json"),
        )
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/chat/messages"))
        .and(query_param("chat_id", "c2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let api = ApiClient::new(server.uri(), temp_session_store()).expect("build client");

    let error = api.delete_chat("c1").await.expect_err("rejected");
    assert!(matches!(
        &error,
        ClientError::Status { status: 500, message, .. } if message == "cannot delete"
    ));

    let error = api.delete_chat("c2").await.expect_err("rejected");
    assert!(matches!(
        &error,
        ClientError::Status { status: 503, message, .. } if message == "Service Unavailable"
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn bearer_credential_is_attached_when_signed_in() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/chat/list"))
        .and(header("authorization", "Bearer token-456"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"chats":[],"pagination":{"page":1,"limit":20,"total":0,"hasMore":false,"totalPages":0}}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let session = temp_session_store();
    session
        .sign_in(AuthSession::new("token-456", ""))
        .expect("persist session");

    let api = ApiClient::new(server.uri(), session).expect("build client");
    let list = api.chat_list(1, 20).await.expect("list chats");
    assert!(list.chats.is_empty());
}
