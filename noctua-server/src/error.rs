//! JSON error responses
//!
//! Every failure carries `userMessageSaved`, so a client can tell "the message
//! is stored, retry the reply" apart from "nothing was stored, resend".

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use llm::{InferenceError, InferenceErrorKind};
use noctua_core::ChatError;
use serde::Serialize;
use tracing::error;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
    pub user_message_saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inference_error: Option<InferenceErrorKind>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    fn plain(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: message.into(),
                kind,
                user_message_saved: false,
                conversation_id: None,
                inference_error: None,
            },
        }
    }

    pub fn unauthorized() -> Self {
        Self::plain(StatusCode::UNAUTHORIZED, "unauthorized", "Unauthorized")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::plain(StatusCode::BAD_REQUEST, "validation", message)
    }
}

fn inference_status(err: &InferenceError) -> StatusCode {
    match err {
        InferenceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        InferenceError::ServerError { .. } | InferenceError::BadResponse(_) => StatusCode::BAD_GATEWAY,
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        let (status, message, inference_error) = match &err {
            ChatError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone(), None),
            ChatError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone(), None),
            ChatError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone(), None),
            ChatError::QueueFull { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many messages waiting in this conversation".to_string(),
                None,
            ),
            ChatError::Store { operation, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to {}", operation),
                None,
            ),
            ChatError::Inference { source, .. } => (
                inference_status(source),
                format!("The assistant could not answer: {}", source),
                Some(source.kind()),
            ),
            ChatError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                None,
            ),
        };

        if status.is_server_error() {
            error!(kind = err.kind(), "request failed: {}", err);
        }

        Self {
            status,
            body: ErrorBody {
                error: message,
                kind: err.kind(),
                user_message_saved: err.user_message_persisted(),
                conversation_id: err.conversation_id().map(|id| id.to_string()),
                inference_error,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
