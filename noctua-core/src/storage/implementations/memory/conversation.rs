//! In-memory ConversationStore implementation

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use super::lock;
use crate::storage::ids::ConversationId;
use crate::storage::traits::ConversationStore;
use crate::storage::types::{
    Conversation, ConversationPatch, Message, Stored, StoredConversation,
};

#[derive(Debug, Default)]
pub struct MemoryConversationStore {
    conversations: Mutex<HashMap<ConversationId, Conversation>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn create_conversation(&self, conversation: Conversation) -> Result<ConversationId> {
        let id = ConversationId::new();
        lock(&self.conversations)?.insert(id.clone(), conversation);
        Ok(id)
    }

    async fn get_conversation(&self, id: &ConversationId) -> Result<Option<StoredConversation>> {
        Ok(lock(&self.conversations)?
            .get(id)
            .map(|c| Stored::new(id.clone(), c.clone())))
    }

    async fn get_conversations(&self, ids: &[ConversationId]) -> Result<Vec<StoredConversation>> {
        let conversations = lock(&self.conversations)?;
        Ok(ids
            .iter()
            .filter_map(|id| conversations.get(id).map(|c| Stored::new(id.clone(), c.clone())))
            .collect())
    }

    async fn conversation_exists(&self, id: &ConversationId) -> Result<bool> {
        Ok(lock(&self.conversations)?.contains_key(id))
    }

    async fn append_messages(
        &self,
        id: &ConversationId,
        messages: Vec<Message>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conversations = lock(&self.conversations)?;
        let Some(conversation) = conversations.get_mut(id) else {
            bail!("conversation {} not found", id);
        };
        conversation.messages.extend(messages);
        conversation.updated_at = updated_at;
        Ok(())
    }

    async fn update_conversation(
        &self,
        id: &ConversationId,
        patch: ConversationPatch,
    ) -> Result<()> {
        let mut conversations = lock(&self.conversations)?;
        let Some(conversation) = conversations.get_mut(id) else {
            bail!("conversation {} not found", id);
        };
        conversation.apply(&patch);
        Ok(())
    }
}
