use chrono::Utc;
use llm::{InferenceErrorKind, MockChatModel, MockReply};
use noctua_core::storage::{MemoryStores, MockStores};
use noctua_core::{ConversationRepository, MessageOrchestrator, OrchestratorConfig, TranscriptCache};
use noctua_server::{
    AppState, Authenticator, ServerHandle, SessionClaims, SessionSigner, build_router,
    start_server_on,
};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;

const SECRET: &str = "integration-secret";

struct TestServer {
    handle: ServerHandle,
    client: reqwest::Client,
    model: Arc<MockChatModel>,
}

impl TestServer {
    async fn start(model: MockChatModel) -> Self {
        Self::start_with(model, Vec::new()).await
    }

    async fn start_with(model: MockChatModel, allowed: Vec<String>) -> Self {
        let stores = MemoryStores::new();
        let repository = ConversationRepository::new(&stores, TranscriptCache::with_default_ttl(64));
        let model = Arc::new(model);
        let orchestrator =
            MessageOrchestrator::new(repository, model.clone(), OrchestratorConfig::default());
        let auth = Authenticator::new(SessionSigner::new(SECRET), allowed);
        let router = build_router(AppState::new(orchestrator, auth));

        let handle = start_server_on("127.0.0.1:0", router).await.unwrap();
        Self {
            handle,
            client: reqwest::Client::new(),
            model,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.handle.url(), path)
    }
}

fn token(email: &str) -> String {
    SessionSigner::new(SECRET)
        .sign(&SessionClaims::new(email, Utc::now().timestamp() + 3600))
        .unwrap()
}

async fn json_body(response: reqwest::Response) -> Value {
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_healthz_is_public() {
    let server = TestServer::start(MockChatModel::new()).await;

    let response = server.client.get(server.url("/healthz")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "status": "ok" }));

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_requests_without_session_are_rejected() {
    let server = TestServer::start(MockChatModel::new()).await;

    let response = server.client.get(server.url("/conversations")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Unauthorized");

    let forged = SessionSigner::new("wrong-secret")
        .sign(&SessionClaims::new("alice@example.com", Utc::now().timestamp() + 3600))
        .unwrap();
    let response = server
        .client
        .get(server.url("/conversations"))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_allow_list_and_cookie_session() {
    let server =
        TestServer::start_with(MockChatModel::new(), vec!["alice@example.com".to_string()]).await;

    let response = server
        .client
        .get(server.url("/conversations"))
        .header("cookie", format!("noctua_session={}", token("ALICE@example.com")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = server
        .client
        .get(server.url("/conversations"))
        .bearer_auth(token("bob@example.com"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_conversation_lifecycle() {
    let server = TestServer::start(MockChatModel::new()).await;
    let alice = token("alice@example.com");

    // Create
    let response = server
        .client
        .post(server.url("/conversations"))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = json_body(response).await["conversationId"]
        .as_str()
        .unwrap()
        .to_string();

    // Send
    let response = server
        .client
        .post(server.url(&format!("/conversations/{}/messages", id)))
        .bearer_auth(&alice)
        .json(&json!({ "message": "What is Rust?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["x-conversation-id"], id.as_str());
    let reply = json_body(response).await;
    assert_eq!(reply["role"], "assistant");
    assert_eq!(reply["content"], "echo: What is Rust?");

    // Read back
    let response = server
        .client
        .get(server.url(&format!("/conversations/{}/messages", id)))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    let messages = json_body(response).await["messages"].clone();
    assert_eq!(messages.as_array().unwrap().len(), 2);
    assert_eq!(messages[0]["content"], "What is Rust?");

    // List shows the derived title
    let response = server
        .client
        .get(server.url("/conversations"))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    let list = json_body(response).await;
    assert_eq!(list["conversations"][0]["id"], id.as_str());
    assert_eq!(list["conversations"][0]["title"], "What is Rust?");
    assert_eq!(list["conversations"][0]["messageCount"], 2);

    // Rename
    let response = server
        .client
        .patch(server.url(&format!("/conversations/{}", id)))
        .bearer_auth(&alice)
        .json(&json!({ "message": "Ownership and borrowing in practice, explained" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await["title"],
        "Ownership and borrowing in practice, exp..."
    );

    // Delete
    let response = server
        .client
        .delete(server.url(&format!("/conversations/{}", id)))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = server
        .client
        .get(server.url("/conversations"))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(json_body(response).await["conversations"], json!([]));

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_send_to_new_conversation() {
    let server = TestServer::start(MockChatModel::new()).await;

    let response = server
        .client
        .post(server.url("/conversations/messages"))
        .bearer_auth(token("alice@example.com"))
        .json(&json!({ "message": "Hello", "imageUrl": "https://img/cat.png" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert!(body["conversationId"].is_string());
    assert_eq!(body["message"]["content"], "echo: Hello");

    let requests = server.model.requests();
    assert_eq!(requests[0].image_url.as_deref(), Some("https://img/cat.png"));
    assert_eq!(requests[0].user, "alice@example.com");

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_error_statuses() {
    let server = TestServer::start(MockChatModel::new()).await;
    let alice = token("alice@example.com");
    let bob = token("bob@example.com");

    // Empty message
    let response = server
        .client
        .post(server.url("/conversations/messages"))
        .bearer_auth(&alice)
        .json(&json!({ "message": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["kind"], "validation");
    assert_eq!(body["userMessageSaved"], false);

    // Not JSON
    let response = server
        .client
        .post(server.url("/conversations/messages"))
        .bearer_auth(&alice)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Someone else's conversation
    let response = server
        .client
        .post(server.url("/conversations"))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    let id = json_body(response).await["conversationId"]
        .as_str()
        .unwrap()
        .to_string();
    server
        .client
        .post(server.url("/conversations"))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();

    let response = server
        .client
        .get(server.url(&format!("/conversations/{}/messages", id)))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = server
        .client
        .delete(server.url(&format!("/conversations/{}", id)))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Unknown user
    let response = server
        .client
        .get(server.url(&format!("/conversations/{}/status", id)))
        .bearer_auth(token("carol@example.com"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_failed_reply_reports_saved_message_then_retry() {
    let model = MockChatModel::new().with_replies([MockReply::Fail(InferenceErrorKind::Timeout)]);
    let server = TestServer::start(model).await;
    let alice = token("alice@example.com");

    let response = server
        .client
        .post(server.url("/conversations/messages"))
        .bearer_auth(&alice)
        .json(&json!({ "message": "Hello?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let body = json_body(response).await;
    assert_eq!(body["kind"], "inference");
    assert_eq!(body["inferenceError"], "timeout");
    assert_eq!(body["userMessageSaved"], true);
    let id = body["conversationId"].as_str().unwrap().to_string();

    let response = server
        .client
        .post(server.url(&format!("/conversations/{}/messages/retry", id)))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json_body(response).await["content"], "echo: Hello?");

    let response = server
        .client
        .get(server.url(&format!("/conversations/{}/status", id)))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(
        json_body(response).await,
        json!({ "pending": 0, "processing": false })
    );

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_store_failure_maps_to_500() {
    let stores = MockStores::new();
    let repository = ConversationRepository::new(&stores, TranscriptCache::with_default_ttl(8));
    let orchestrator = MessageOrchestrator::new(
        repository,
        Arc::new(MockChatModel::new()),
        OrchestratorConfig::default(),
    );
    let auth = Authenticator::new(SessionSigner::new(SECRET), Vec::new());
    let handle = start_server_on("127.0.0.1:0", build_router(AppState::new(orchestrator, auth)))
        .await
        .unwrap();

    stores.conversations.fail_appends_after(0);
    let response = reqwest::Client::new()
        .post(format!("{}/conversations/messages", handle.url()))
        .bearer_auth(token("alice@example.com"))
        .json(&json!({ "message": "Hello" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["kind"], "store");
    assert_eq!(body["userMessageSaved"], false);
    assert!(body["conversationId"].is_string());

    handle.shutdown().await;
}
