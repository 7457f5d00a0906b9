//! In-memory UserStore implementation

use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::lock;
use crate::storage::ids::ConversationId;
use crate::storage::traits::UserStore;
use crate::storage::types::User;

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_user(&self, email: &str) -> Result<Option<User>> {
        Ok(lock(&self.users)?.get(email).cloned())
    }

    async fn user_exists(&self, email: &str) -> Result<bool> {
        Ok(lock(&self.users)?.contains_key(email))
    }

    async fn create_user(&self, user: User) -> Result<()> {
        lock(&self.users)?.insert(user.email.clone(), user);
        Ok(())
    }

    async fn ensure_user(&self, user: User) -> Result<bool> {
        let mut users = lock(&self.users)?;
        if users.contains_key(&user.email) {
            return Ok(false);
        }
        users.insert(user.email.clone(), user);
        Ok(true)
    }

    async fn append_conversation_id(&self, email: &str, id: &ConversationId) -> Result<()> {
        let mut users = lock(&self.users)?;
        let Some(user) = users.get_mut(email) else {
            bail!("user {} not found", email);
        };
        if !user.conversation_ids.contains(id) {
            user.conversation_ids.push(id.clone());
        }
        Ok(())
    }

    async fn remove_conversation_id(&self, email: &str, id: &ConversationId) -> Result<()> {
        if let Some(user) = lock(&self.users)?.get_mut(email) {
            user.conversation_ids.retain(|c| c != id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::Identity;
    use chrono::Utc;

    fn user(email: &str) -> User {
        User::new(&Identity::new(email), Utc::now())
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemoryUserStore::new();
        assert!(!store.user_exists("a@example.com").await.unwrap());

        store.create_user(user("a@example.com")).await.unwrap();

        assert!(store.user_exists("a@example.com").await.unwrap());
        let fetched = store.get_user("a@example.com").await.unwrap().unwrap();
        assert_eq!(fetched.email, "a@example.com");
        assert!(fetched.conversation_ids.is_empty());
    }

    #[tokio::test]
    async fn test_append_is_a_set_union() {
        let store = MemoryUserStore::new();
        store.create_user(user("a@example.com")).await.unwrap();

        let first = ConversationId::from_string("c1");
        let second = ConversationId::from_string("c2");
        store.append_conversation_id("a@example.com", &first).await.unwrap();
        store.append_conversation_id("a@example.com", &second).await.unwrap();
        store.append_conversation_id("a@example.com", &first).await.unwrap();

        let fetched = store.get_user("a@example.com").await.unwrap().unwrap();
        assert_eq!(fetched.conversation_ids, vec![first.clone(), second.clone()]);

        store.remove_conversation_id("a@example.com", &first).await.unwrap();
        let fetched = store.get_user("a@example.com").await.unwrap().unwrap();
        assert_eq!(fetched.conversation_ids, vec![second]);
    }

    #[tokio::test]
    async fn test_ensure_user_keeps_existing_document() {
        let store = MemoryUserStore::new();
        store.create_user(user("a@example.com")).await.unwrap();
        store
            .append_conversation_id("a@example.com", &ConversationId::from_string("c1"))
            .await
            .unwrap();

        assert!(!store.ensure_user(user("a@example.com")).await.unwrap());
        let fetched = store.get_user("a@example.com").await.unwrap().unwrap();
        assert_eq!(fetched.conversation_ids.len(), 1);

        assert!(store.ensure_user(user("b@example.com")).await.unwrap());
    }

    #[tokio::test]
    async fn test_append_to_missing_user_fails() {
        let store = MemoryUserStore::new();
        let result = store
            .append_conversation_id("ghost@example.com", &ConversationId::new())
            .await;
        assert!(result.is_err());
    }
}
