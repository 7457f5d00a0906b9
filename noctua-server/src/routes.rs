//! HTTP route handlers
//!
//! Handlers only authenticate, parse and map results; all conversation logic
//! lives in `noctua_core`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{Next, from_fn};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use noctua_core::storage::StorageTypes;
use noctua_core::{Attachment, ConversationId};
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;
use tracing::{Instrument, info, info_span};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

pub const CONVERSATION_ID_HEADER: &str = "x-conversation-id";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl SendMessageBody {
    fn attachment(&self) -> Option<Attachment> {
        self.image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| Attachment {
                image_url: url.to_string(),
            })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TitleBody {
    #[serde(default)]
    pub message: String,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

pub fn build_router<S: StorageTypes>(state: AppState<S>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/conversations",
            post(create_conversation::<S>).get(list_conversations::<S>),
        )
        .route("/conversations/messages", post(send_to_new_conversation::<S>))
        .route(
            "/conversations/:id",
            delete(delete_conversation::<S>).patch(update_title::<S>),
        )
        .route(
            "/conversations/:id/messages",
            post(send_message::<S>).get(get_messages::<S>),
        )
        .route("/conversations/:id/messages/retry", post(retry_reply::<S>))
        .route("/conversations/:id/status", get(queue_status::<S>))
        .layer(from_fn(trace_request))
        .with_state(state)
}

async fn trace_request(req: Request, next: Next) -> Response {
    let span = info_span!("http.request", method = %req.method(), path = %req.uri().path());
    async move {
        let started = Instant::now();
        let response = next.run(req).await;
        info!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request complete"
        );
        response
    }
    .instrument(span)
    .await
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn create_conversation<S: StorageTypes>(
    State(state): State<AppState<S>>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, ApiError> {
    let id = state.repository().create_conversation(&user).await?;
    Ok((StatusCode::CREATED, Json(json!({ "conversationId": id }))).into_response())
}

async fn list_conversations<S: StorageTypes>(
    State(state): State<AppState<S>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conversations = state.repository().list_conversations(&user.email).await?;
    Ok(Json(json!({ "conversations": conversations })))
}

async fn delete_conversation<S: StorageTypes>(
    State(state): State<AppState<S>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = ConversationId::from_string(id);
    state.orchestrator.delete_conversation(&user, &id).await?;
    Ok(Json(json!({ "message": "Conversation deleted" })))
}

async fn update_title<S: StorageTypes>(
    State(state): State<AppState<S>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<TitleBody>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let payload = body(payload)?;
    let id = ConversationId::from_string(id);
    let title = state
        .repository()
        .set_title_from_message(&user.email, &id, &payload.message)
        .await?;
    Ok(Json(json!({ "title": title })))
}

async fn send_message<S: StorageTypes>(
    State(state): State<AppState<S>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<SendMessageBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let payload = body(payload)?;
    let outcome = state
        .orchestrator
        .send_message(
            &user,
            Some(ConversationId::from_string(id)),
            &payload.message,
            payload.attachment(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        [(CONVERSATION_ID_HEADER, outcome.conversation_id.to_string())],
        Json(outcome.message),
    )
        .into_response())
}

async fn send_to_new_conversation<S: StorageTypes>(
    State(state): State<AppState<S>>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<SendMessageBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let payload = body(payload)?;
    let outcome = state
        .orchestrator
        .send_message(&user, None, &payload.message, payload.attachment())
        .await?;

    Ok((
        StatusCode::CREATED,
        [(CONVERSATION_ID_HEADER, outcome.conversation_id.to_string())],
        Json(outcome),
    )
        .into_response())
}

async fn retry_reply<S: StorageTypes>(
    State(state): State<AppState<S>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let outcome = state
        .orchestrator
        .retry_reply(&user, &ConversationId::from_string(id))
        .await?;
    Ok((StatusCode::CREATED, Json(outcome.message)).into_response())
}

async fn get_messages<S: StorageTypes>(
    State(state): State<AppState<S>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let messages = state
        .repository()
        .messages(&user.email, &ConversationId::from_string(id))
        .await?;
    Ok(Json(json!({ "messages": messages })))
}

async fn queue_status<S: StorageTypes>(
    State(state): State<AppState<S>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<noctua_core::QueueStatus>, ApiError> {
    let status = state
        .orchestrator
        .queue_status(&user, &ConversationId::from_string(id))
        .await?;
    Ok(Json(status))
}
