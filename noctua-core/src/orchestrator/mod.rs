//! Message Orchestrator
//!
//! Runs one exchange per user message:
//!
//! ```text
//! New -> UserMessagePersisted -> ModelCalled -> AssistantMessagePersisted
//!   \             \                   \
//!    +-------------+-------------------+--> Failed
//! ```
//!
//! Exchanges on one conversation are serialized by its queue lane, held from
//! the transcript read until the reply is stored, so a user message and its
//! reply are always adjacent. Once the user message is stored the rest of the
//! exchange runs on its own task and completes even if the caller goes away.

use chrono::Utc;
use llm::{ChatModel, ChatRequest, InferenceError, TranscriptMessage};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::TranscriptCache;
use crate::error::{ChatError, Result};
use crate::queue::{ConversationQueue, QueueStatus, QueueTicket};
use crate::repository::ConversationRepository;
use crate::storage::{
    ConversationId, ConversationPatch, ConversationStore, Identity, Message, StorageTypes,
    derive_title,
};


/// When the title derived from the first message is written
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TitleTiming {
    /// Together with the user message, so it survives a failed reply
    #[default]
    WithUserMessage,
    /// Only once the assistant reply is stored
    AfterReply,
}

impl FromStr for TitleTiming {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "with_user_message" => Ok(TitleTiming::WithUserMessage),
            "after_reply" => Ok(TitleTiming::AfterReply),
            other => Err(format!("unknown title timing: {}", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    pub inference_timeout: Duration,
    pub title_timing: TitleTiming,
    pub max_queue_depth: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            inference_timeout: Duration::from_secs(120),
            title_timing: TitleTiming::default(),
            max_queue_depth: 16,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeState {
    New,
    UserMessagePersisted,
    ModelCalled,
    AssistantMessagePersisted,
    Failed,
}

/// Image sent along with a message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub image_url: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    pub conversation_id: ConversationId,
    /// Whether this call created the conversation
    pub created: bool,
    /// The stored assistant reply
    pub message: Message,
}

pub struct MessageOrchestrator<S: StorageTypes> {
    repository: ConversationRepository<S>,
    model: Arc<dyn ChatModel + Send + Sync>,
    queue: ConversationQueue,
    config: OrchestratorConfig,
}

impl<S: StorageTypes> Clone for MessageOrchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            model: self.model.clone(),
            queue: self.queue.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: StorageTypes> MessageOrchestrator<S> {
    pub fn new(
        repository: ConversationRepository<S>,
        model: Arc<dyn ChatModel + Send + Sync>,
        config: OrchestratorConfig,
    ) -> Self {
        let queue = ConversationQueue::new(config.max_queue_depth);
        Self {
            repository,
            model,
            queue,
            config,
        }
    }

    pub fn repository(&self) -> &ConversationRepository<S> {
        &self.repository
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Send a user message and wait for the stored assistant reply.
    ///
    /// With no `conversation_id` a new conversation is created first.
    pub async fn send_message(
        &self,
        owner: &Identity,
        conversation_id: Option<ConversationId>,
        text: &str,
        attachment: Option<Attachment>,
    ) -> Result<SendOutcome> {
        if text.trim().is_empty() {
            return Err(ChatError::Validation("Message is required".to_string()));
        }

        let (id, created) = match conversation_id {
            Some(id) => {
                self.repository.assert_access(&owner.email, &id).await?;
                (id, false)
            }
            None => (self.repository.create_conversation(owner).await?, true),
        };

        let ticket = self.queue.acquire(&id).await?;
        let history = self.load_transcript(&id).await?;
        let first_exchange = history.is_empty();

        let request = ChatRequest::new(text, owner.email.clone(), transcript(&history))
            .with_image_url(attachment.map(|a| a.image_url));
        let title = first_exchange.then(|| (text.to_string(), self.config.title_timing));

        let user_message = Message::user(text, Utc::now());
        self.append(&id, user_message, false).await?;
        debug!(conversation_id = %id, state = ?ExchangeState::UserMessagePersisted, "exchange");

        // Nothing may await between the append and the spawn
        let reply = self.spawn_reply(id.clone(), request, title, ticket);
        let message = join_reply(reply).await?;
        Ok(SendOutcome {
            conversation_id: id,
            created,
            message,
        })
    }

    /// Ask for a reply to a stored user message that never got one.
    ///
    /// Fails with `Validation` unless the last stored message is from the user.
    /// Attachments are not stored, so the retried request carries none.
    pub async fn retry_reply(&self, owner: &Identity, id: &ConversationId) -> Result<SendOutcome> {
        self.repository.assert_access(&owner.email, id).await?;
        let ticket = self.queue.acquire(id).await?;
        let history = self.load_transcript(id).await?;

        let Some((last, earlier)) = history.split_last() else {
            return Err(ChatError::Validation(
                "Conversation has no message to reply to".to_string(),
            ));
        };
        if !last.is_user() {
            return Err(ChatError::Validation(
                "Last message already has a reply".to_string(),
            ));
        }

        let title = (earlier.is_empty() && self.config.title_timing == TitleTiming::AfterReply)
            .then(|| (last.content.clone(), TitleTiming::AfterReply));
        let request = ChatRequest::new(last.content.clone(), owner.email.clone(), transcript(earlier));

        info!(conversation_id = %id, "retrying reply");
        let message = join_reply(self.spawn_reply(id.clone(), request, title, ticket)).await?;
        Ok(SendOutcome {
            conversation_id: id.clone(),
            created: false,
            message,
        })
    }

    /// Soft-delete once the exchanges already queued on the conversation have
    /// finished. Exchanges queued after the delete find it gone.
    pub async fn delete_conversation(&self, owner: &Identity, id: &ConversationId) -> Result<()> {
        self.repository.assert_access(&owner.email, id).await?;
        let _ticket = self.queue.acquire_unbounded(id).await;
        self.repository.delete_conversation(&owner.email, id).await
    }

    /// Waiting and running exchanges of an owned conversation
    pub async fn queue_status(&self, owner: &Identity, id: &ConversationId) -> Result<QueueStatus> {
        self.repository.assert_access(&owner.email, id).await?;
        Ok(self.queue.status(id))
    }

    async fn load_transcript(&self, id: &ConversationId) -> Result<Vec<Message>> {
        let cache = self.repository.cache();
        if let Some(messages) = cache.get(id).await {
            return Ok(messages);
        }
        let conversation = self.repository.get_conversation(id).await?;
        let messages = conversation.into_content().messages;
        cache.put(id, messages.clone()).await;
        Ok(messages)
    }

    async fn append(&self, id: &ConversationId, message: Message, after_user_message: bool) -> Result<()> {
        append_message(&self.repository, id, message, after_user_message).await
    }

    /// Finish the exchange on a detached task that owns the queue ticket:
    /// the early title write, inference, the reply append and a deferred title.
    fn spawn_reply(
        &self,
        id: ConversationId,
        request: ChatRequest,
        title: Option<(String, TitleTiming)>,
        ticket: QueueTicket,
    ) -> JoinHandle<Result<Message>> {
        let reply = ReplyTask {
            repository: self.repository.clone(),
            model: self.model.clone(),
            timeout: self.config.inference_timeout,
            id,
            request,
            title,
            _ticket: ticket,
        };
        tokio::spawn(reply.run())
    }
}

async fn join_reply(handle: JoinHandle<Result<Message>>) -> Result<Message> {
    handle
        .await
        .map_err(|e| ChatError::Internal(format!("exchange task failed: {}", e)))?
}

struct ReplyTask<S: StorageTypes> {
    repository: ConversationRepository<S>,
    model: Arc<dyn ChatModel + Send + Sync>,
    timeout: Duration,
    id: ConversationId,
    request: ChatRequest,
    title: Option<(String, TitleTiming)>,
    _ticket: QueueTicket,
}

impl<S: StorageTypes> ReplyTask<S> {
    async fn run(self) -> Result<Message> {
        let id = &self.id;
        if let Some((text, TitleTiming::WithUserMessage)) = &self.title {
            persist_title(self.repository.conversation_store(), id, text).await;
        }

        let answer = match tokio::time::timeout(self.timeout, self.model.chat(&self.request)).await {
            Ok(result) => result,
            Err(_) => Err(InferenceError::Timeout(self.timeout)),
        };
        debug!(conversation_id = %id, state = ?ExchangeState::ModelCalled, "exchange");

        let answer = match answer {
            Ok(answer) => answer,
            Err(e) => {
                warn!(
                    conversation_id = %id,
                    state = ?ExchangeState::Failed,
                    kind = e.kind().as_str(),
                    "inference failed: {}",
                    e
                );
                return Err(ChatError::Inference {
                    conversation_id: id.clone(),
                    source: e,
                });
            }
        };

        let reply = Message::assistant(answer, Utc::now());
        if let Err(e) = append_message(&self.repository, id, reply.clone(), true).await {
            warn!(conversation_id = %id, state = ?ExchangeState::Failed, "reply not stored: {}", e);
            return Err(e);
        }

        if let Some((text, TitleTiming::AfterReply)) = &self.title {
            persist_title(self.repository.conversation_store(), id, text).await;
        }

        info!(
            conversation_id = %id,
            state = ?ExchangeState::AssistantMessagePersisted,
            model = self.model.name(),
            "exchange complete"
        );
        Ok(reply)
    }
}

/// Append one message and mirror it into the cache. Any store failure drops
/// the cache entry so the next exchange rereads the store.
async fn append_message<S: StorageTypes>(
    repository: &ConversationRepository<S>,
    id: &ConversationId,
    message: Message,
    after_user_message: bool,
) -> Result<()> {
    let cache: &TranscriptCache = repository.cache();
    let result = repository
        .conversation_store()
        .append_messages(id, vec![message.clone()], message.timestamp)
        .await;

    match result {
        Ok(()) => {
            cache.extend(id, &[message]).await;
            Ok(())
        }
        Err(e) => {
            cache.invalidate(id).await;
            Err(if after_user_message {
                ChatError::store_after_user_message("append assistant message", id, e)
            } else {
                ChatError::store("append user message", Some(id), e)
            })
        }
    }
}

/// Title writes never fail an exchange; the message is already stored.
async fn persist_title<C: ConversationStore + ?Sized>(store: &C, id: &ConversationId, text: &str) {
    let title = derive_title(text);
    if let Err(e) = store
        .update_conversation(id, ConversationPatch::title(title.clone(), Utc::now()))
        .await
    {
        warn!(conversation_id = %id, "failed to store title: {:#}", e);
    } else {
        debug!(conversation_id = %id, title = %title, "stored title");
    }
}

fn transcript(messages: &[Message]) -> Vec<TranscriptMessage> {
    messages.iter().map(TranscriptMessage::from).collect()
}
