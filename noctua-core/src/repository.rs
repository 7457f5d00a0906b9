//! Conversation Repository
//!
//! Maps a user to the conversations they may touch. Access is decided only by
//! membership in the owner's `conversation_ids`, never by the cache.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::cache::TranscriptCache;
use crate::error::{ChatError, Result};
use crate::storage::{
    Conversation, ConversationId, ConversationPatch, ConversationStore, ConversationSummary,
    Identity, Message, StorageTypes, Stores, StoredConversation, User, UserStore, derive_title,
    placeholder_title,
};

pub struct ConversationRepository<S: StorageTypes> {
    users: Arc<S::User>,
    conversations: Arc<S::Conversation>,
    cache: TranscriptCache,
}

impl<S: StorageTypes> Clone for ConversationRepository<S> {
    fn clone(&self) -> Self {
        Self {
            users: self.users.clone(),
            conversations: self.conversations.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<S: StorageTypes> ConversationRepository<S> {
    pub fn new(stores: &impl Stores<S>, cache: TranscriptCache) -> Self {
        Self {
            users: stores.user(),
            conversations: stores.conversation(),
            cache,
        }
    }

    pub fn cache(&self) -> &TranscriptCache {
        &self.cache
    }

    pub(crate) fn conversation_store(&self) -> &S::Conversation {
        &self.conversations
    }

    /// Create an empty conversation titled `Conversation N` and add it to the
    /// owner's set, creating the owner's record on first use.
    ///
    /// A failure after the conversation document is written leaves it orphaned.
    pub async fn create_conversation(&self, owner: &Identity) -> Result<ConversationId> {
        let existing = self
            .users
            .get_user(&owner.email)
            .await
            .map_err(|e| ChatError::store("load user", None, e))?
            .map_or(0, |user| user.conversation_ids.len());

        let now = Utc::now();
        let conversation =
            Conversation::new(owner.email.clone(), Some(placeholder_title(existing)), now);
        let id = self
            .conversations
            .create_conversation(conversation)
            .await
            .map_err(|e| ChatError::store("create conversation", None, e))?;

        let created_user = self
            .users
            .ensure_user(User::new(owner, now))
            .await
            .map_err(|e| ChatError::store("create user", Some(&id), e))?;
        if created_user {
            info!(user = %owner.email, "created user record");
        }

        self.users
            .append_conversation_id(&owner.email, &id)
            .await
            .map_err(|e| ChatError::store("register conversation with owner", Some(&id), e))?;

        info!(conversation_id = %id, user = %owner.email, "created conversation");
        Ok(id)
    }

    /// Fails with `NotFound` if the owner has no record and `Forbidden` if the
    /// conversation is not in the owner's set. Read-only.
    pub async fn assert_access(&self, owner_email: &str, id: &ConversationId) -> Result<()> {
        let user = self
            .users
            .get_user(owner_email)
            .await
            .map_err(|e| ChatError::store("load user", Some(id), e))?
            .ok_or_else(|| ChatError::NotFound("User not found".to_string()))?;

        if !user.owns(id) {
            debug!(conversation_id = %id, user = %owner_email, "access denied");
            return Err(ChatError::Forbidden(
                "You do not have access to this conversation".to_string(),
            ));
        }
        Ok(())
    }

    /// Fetch a live conversation. Missing and soft-deleted ones are `NotFound`.
    pub async fn get_conversation(&self, id: &ConversationId) -> Result<StoredConversation> {
        let conversation = self
            .conversations
            .get_conversation(id)
            .await
            .map_err(|e| ChatError::store("load conversation", Some(id), e))?;

        match conversation {
            Some(conversation) if !conversation.is_deleted => Ok(conversation),
            _ => Err(ChatError::NotFound("Conversation not found".to_string())),
        }
    }

    pub async fn get_owned_conversation(
        &self,
        owner_email: &str,
        id: &ConversationId,
    ) -> Result<StoredConversation> {
        self.assert_access(owner_email, id).await?;
        self.get_conversation(id).await
    }

    pub async fn messages(&self, owner_email: &str, id: &ConversationId) -> Result<Vec<Message>> {
        Ok(self
            .get_owned_conversation(owner_email, id)
            .await?
            .into_content()
            .messages)
    }

    /// Soft delete: tombstone the document, then drop it from the owner's set.
    ///
    /// If the tombstone lands but the owner update fails, the conversation is
    /// already invisible everywhere, so the failure is logged and not returned.
    pub async fn delete_conversation(&self, owner_email: &str, id: &ConversationId) -> Result<()> {
        self.get_owned_conversation(owner_email, id).await?;

        self.conversations
            .update_conversation(id, ConversationPatch::tombstone(Utc::now()))
            .await
            .map_err(|e| ChatError::store("mark conversation deleted", Some(id), e))?;
        self.cache.invalidate(id).await;

        if let Err(e) = self.users.remove_conversation_id(owner_email, id).await {
            error!(
                conversation_id = %id,
                user = %owner_email,
                "conversation tombstoned but owner still lists it: {:#}",
                e
            );
        }

        info!(conversation_id = %id, user = %owner_email, "deleted conversation");
        Ok(())
    }

    /// Live conversations of the owner, most recently active first.
    pub async fn list_conversations(&self, owner_email: &str) -> Result<Vec<ConversationSummary>> {
        let Some(user) = self
            .users
            .get_user(owner_email)
            .await
            .map_err(|e| ChatError::store("load user", None, e))?
        else {
            return Ok(Vec::new());
        };

        let conversations = self
            .conversations
            .get_conversations(&user.conversation_ids)
            .await
            .map_err(|e| ChatError::store("load conversations", None, e))?;

        let mut live: Vec<_> = conversations
            .into_iter()
            .filter(|c| !c.is_deleted)
            .collect();
        live.sort_by(|a, b| b.activity_at().cmp(&a.activity_at()));

        Ok(live
            .iter()
            .map(|c| ConversationSummary::from_conversation(c.id.clone(), c))
            .collect())
    }

    /// Rename a conversation using the same rule as the first-message title.
    pub async fn set_title_from_message(
        &self,
        owner_email: &str,
        id: &ConversationId,
        message: &str,
    ) -> Result<String> {
        if message.trim().is_empty() {
            return Err(ChatError::Validation("Message is required".to_string()));
        }
        self.get_owned_conversation(owner_email, id).await?;

        let title = derive_title(message);
        self.conversations
            .update_conversation(id, ConversationPatch::title(title.clone(), Utc::now()))
            .await
            .map_err(|e| ChatError::store("update title", Some(id), e))?;

        debug!(conversation_id = %id, title = %title, "updated title");
        Ok(title)
    }
}
