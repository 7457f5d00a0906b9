//! ConversationStore trait for the `Conversations` collection

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::storage::ids::ConversationId;
use crate::storage::types::{Conversation, ConversationPatch, Message, StoredConversation};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Insert a new document under a store-generated id
    async fn create_conversation(&self, conversation: Conversation) -> Result<ConversationId>;

    /// Fetch a document. Tombstoned documents are returned as-is.
    async fn get_conversation(&self, id: &ConversationId) -> Result<Option<StoredConversation>>;

    /// Fetch several documents, skipping ids that do not exist
    async fn get_conversations(&self, ids: &[ConversationId]) -> Result<Vec<StoredConversation>>;

    async fn conversation_exists(&self, id: &ConversationId) -> Result<bool>;

    /// Append messages in order and bump `updated_at`, as one atomic write.
    /// Fails if the conversation does not exist.
    async fn append_messages(
        &self,
        id: &ConversationId,
        messages: Vec<Message>,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Partial update of scalar fields. Fails if the conversation does not exist.
    async fn update_conversation(&self, id: &ConversationId, patch: ConversationPatch)
    -> Result<()>;
}
