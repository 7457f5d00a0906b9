use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Why an inference call produced no answer.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("inference service error{}: {body}", status_suffix(.status))]
    ServerError { status: Option<u16>, body: String },

    #[error("malformed inference response: {0}")]
    BadResponse(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceErrorKind {
    Timeout,
    BadResponse,
    ServerError,
}

impl InferenceErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InferenceErrorKind::Timeout => "timeout",
            InferenceErrorKind::BadResponse => "bad_response",
            InferenceErrorKind::ServerError => "server_error",
        }
    }
}

impl InferenceError {
    pub fn kind(&self) -> InferenceErrorKind {
        match self {
            InferenceError::Timeout(_) => InferenceErrorKind::Timeout,
            InferenceError::ServerError { .. } => InferenceErrorKind::ServerError,
            InferenceError::BadResponse(_) => InferenceErrorKind::BadResponse,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        InferenceError::ServerError {
            status: None,
            body: message.into(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_display() {
        let err = InferenceError::ServerError {
            status: Some(503),
            body: "worker unavailable".to_string(),
        };
        assert_eq!(err.kind(), InferenceErrorKind::ServerError);
        assert_eq!(
            err.to_string(),
            "inference service error (HTTP 503): worker unavailable"
        );

        let err = InferenceError::transport("connection refused");
        assert_eq!(err.to_string(), "inference service error: connection refused");

        let err = InferenceError::Timeout(Duration::from_secs(120));
        assert_eq!(err.kind().as_str(), "timeout");
        assert_eq!(err.to_string(), "inference timed out after 120s");
    }
}
