use crate::api::{AssistantAnswer, ChatRequest};
use crate::client::Client;
use crate::error::InferenceError;
use crate::traffic_log;
use crate::ChatModel;
use async_trait::async_trait;

use super::api::{RunsyncRequest, RunsyncResponse};

/// A serverless RunPod endpoint called through `runsync`.
#[derive(Clone)]
pub struct RunpodChatModel {
    client: Client,
    base_url: String,
    endpoint_id: String,
}

impl RunpodChatModel {
    pub fn new(client: Client, base_url: String, endpoint_id: String) -> Self {
        RunpodChatModel {
            client,
            base_url,
            endpoint_id,
        }
    }

    fn runsync_url(&self) -> String {
        format!("{}/{}/runsync", self.base_url, self.endpoint_id)
    }
}

#[async_trait]
impl ChatModel for RunpodChatModel {
    fn name(&self) -> &str {
        &self.endpoint_id
    }

    async fn chat(&self, request: &ChatRequest) -> Result<AssistantAnswer, InferenceError> {
        let runpod_request = RunsyncRequest::from_request(request);
        traffic_log::log_request(&self.endpoint_id, &runpod_request);

        let result = self
            .client
            .post::<_, _, RunsyncResponse>(self.runsync_url(), &runpod_request)
            .await
            .and_then(|response| {
                traffic_log::log_response(&self.endpoint_id, &response);
                AssistantAnswer::try_from(response)
            });

        if let Err(e) = &result {
            traffic_log::log_error(&self.endpoint_id, &e.to_string());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::RunpodProvider;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use std::time::Duration;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/v2", addr)
    }

    fn model(base_url: &str, timeout: Duration) -> RunpodChatModel {
        RunpodProvider::new(base_url, "ep-123", "test-key", timeout)
            .unwrap()
            .chat_model()
    }

    #[tokio::test]
    async fn test_successful_runsync() {
        let app = Router::new().route(
            "/v2/:endpoint/runsync",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer test-key");
                assert_eq!(body["input"]["query"], "ping");
                assert_eq!(body["input"]["user"], "alice@example.com");
                Json(json!({
                    "id": "job-1",
                    "status": "COMPLETED",
                    "output": {"body": {"answer": "pong", "metadata": {"grounding": true}}}
                }))
            }),
        );
        let base = serve(app).await;

        let request = ChatRequest::new("ping", "alice@example.com", vec![]);
        let answer = model(&base, Duration::from_secs(5)).chat(&request).await.unwrap();

        assert_eq!(answer.answer, "pong");
        assert!(answer.grounding);
    }

    #[tokio::test]
    async fn test_error_status_maps_to_server_error() {
        let app = Router::new().route(
            "/v2/:endpoint/runsync",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "no workers") }),
        );
        let base = serve(app).await;

        let request = ChatRequest::new("ping", "alice@example.com", vec![]);
        let err = model(&base, Duration::from_secs(5)).chat(&request).await.unwrap_err();

        match err {
            InferenceError::ServerError { status, body } => {
                assert_eq!(status, Some(503));
                assert_eq!(body, "no workers");
            }
            other => panic!("expected ServerError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slow_endpoint_times_out() {
        let app = Router::new().route(
            "/v2/:endpoint/runsync",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"output": {"body": {"answer": "late"}}}))
            }),
        );
        let base = serve(app).await;

        let request = ChatRequest::new("ping", "alice@example.com", vec![]);
        let err = model(&base, Duration::from_millis(200))
            .chat(&request)
            .await
            .unwrap_err();

        assert!(matches!(err, InferenceError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_non_json_body_is_bad_response() {
        let app = Router::new().route("/v2/:endpoint/runsync", post(|| async { "<html>oops</html>" }));
        let base = serve(app).await;

        let request = ChatRequest::new("ping", "alice@example.com", vec![]);
        let err = model(&base, Duration::from_secs(5)).chat(&request).await.unwrap_err();

        assert!(matches!(err, InferenceError::BadResponse(_)));
    }
}
