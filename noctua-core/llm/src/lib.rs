//! Client for the external completion service
//!
//! A [`ChatModel`] takes the new query plus prior transcript and returns a
//! normalized [`AssistantAnswer`] or a typed [`InferenceError`].

use async_trait::async_trait;
use std::sync::Arc;

pub mod api;
mod client;
pub mod error;
pub mod providers;
pub mod traffic_log;

pub use api::*;
pub use client::Client;
pub use error::{InferenceError, InferenceErrorKind};
pub use providers::{MockChatModel, MockReply, RunpodChatModel, RunpodProvider};

#[async_trait]
pub trait ChatModel {
    fn name(&self) -> &str;

    async fn chat(&self, request: &ChatRequest) -> Result<AssistantAnswer, InferenceError>;
}

#[async_trait]
impl ChatModel for Arc<dyn ChatModel + Send + Sync> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn chat(&self, request: &ChatRequest) -> Result<AssistantAnswer, InferenceError> {
        (**self).chat(request).await
    }
}
