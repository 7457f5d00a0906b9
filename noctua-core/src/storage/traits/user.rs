//! UserStore trait for the `Users` collection

use anyhow::Result;
use async_trait::async_trait;

use crate::storage::ids::ConversationId;
use crate::storage::types::User;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, email: &str) -> Result<Option<User>>;

    async fn user_exists(&self, email: &str) -> Result<bool>;

    /// Write the whole document, replacing any existing one
    async fn create_user(&self, user: User) -> Result<()>;

    /// Insert the document only if no user with that email exists.
    /// Returns whether it was inserted.
    async fn ensure_user(&self, user: User) -> Result<bool>;

    /// Atomic array-union on `conversation_ids`. Fails if the user is missing.
    async fn append_conversation_id(&self, email: &str, id: &ConversationId) -> Result<()>;

    /// Atomic array-remove on `conversation_ids`
    async fn remove_conversation_id(&self, email: &str, id: &ConversationId) -> Result<()>;
}
