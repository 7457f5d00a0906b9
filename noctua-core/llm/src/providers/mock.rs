//! Scripted model for tests and local runs without an endpoint

use crate::ChatModel;
use crate::api::{AssistantAnswer, ChatRequest};
use crate::error::{InferenceError, InferenceErrorKind};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Clone, Debug)]
pub enum MockReply {
    Answer(AssistantAnswer),
    Fail(InferenceErrorKind),
    /// Answer with `echo: <query>`
    Echo,
    /// Sleep, then reply
    Delayed(Duration, Box<MockReply>),
}

/// Replies from a queue of scripted responses, then falls back to echoing.
/// Every request is recorded.
#[derive(Default)]
pub struct MockChatModel {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<ChatRequest>>,
    delay: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockChatModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every reply by `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_replies(self, replies: impl IntoIterator<Item = MockReply>) -> Self {
        lock(&self.replies).extend(replies);
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }

    pub fn calls(&self) -> usize {
        lock(&self.requests).len()
    }

    async fn resolve(&self, reply: MockReply, request: &ChatRequest) -> Result<AssistantAnswer, InferenceError> {
        let mut reply = reply;
        loop {
            match reply {
                MockReply::Answer(answer) => return Ok(answer),
                MockReply::Echo => return Ok(AssistantAnswer::text(format!("echo: {}", request.query))),
                MockReply::Fail(kind) => return Err(failure(kind)),
                MockReply::Delayed(delay, next) => {
                    tokio::time::sleep(delay).await;
                    reply = *next;
                }
            }
        }
    }
}

fn failure(kind: InferenceErrorKind) -> InferenceError {
    match kind {
        InferenceErrorKind::Timeout => InferenceError::Timeout(Duration::ZERO),
        InferenceErrorKind::ServerError => InferenceError::ServerError {
            status: Some(500),
            body: "mock failure".to_string(),
        },
        InferenceErrorKind::BadResponse => {
            InferenceError::BadResponse("mock response without answer".to_string())
        }
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<AssistantAnswer, InferenceError> {
        lock(&self.requests).push(request.clone());
        let reply = lock(&self.replies).pop_front().unwrap_or(MockReply::Echo);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.resolve(reply, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_then_echo() {
        let model = MockChatModel::new().with_replies([
            MockReply::Answer(AssistantAnswer::text("first")),
            MockReply::Fail(InferenceErrorKind::BadResponse),
        ]);
        let request = ChatRequest::new("hello", "a@example.com", vec![]);

        assert_eq!(model.chat(&request).await.unwrap().answer, "first");
        assert!(matches!(
            model.chat(&request).await.unwrap_err(),
            InferenceError::BadResponse(_)
        ));
        assert_eq!(model.chat(&request).await.unwrap().answer, "echo: hello");
        assert_eq!(model.calls(), 3);
    }
}
