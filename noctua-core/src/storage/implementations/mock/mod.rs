//! Failure-injecting stores for exercising partial-failure paths
//!
//! Each mock wraps the in-memory store and can be told to fail specific
//! operations. Everything not told to fail behaves exactly like memory.

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use super::memory::{MemoryConversationStore, MemoryUserStore};
use crate::storage::ids::ConversationId;
use crate::storage::traits::{ConversationStore, StorageTypes, Stores, UserStore};
use crate::storage::types::{
    Conversation, ConversationPatch, Message, StoredConversation, User,
};

/// Sentinel for "no append limit"
const UNLIMITED: usize = usize::MAX;

#[derive(Debug, Default)]
pub struct MockUserStore {
    inner: MemoryUserStore,
    fail_append: AtomicBool,
    fail_remove: AtomicBool,
    fail_create: AtomicBool,
}

impl MockUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_append_conversation_id(&self, fail: bool) {
        self.fail_append.store(fail, Ordering::SeqCst);
    }

    pub fn fail_remove_conversation_id(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::SeqCst);
    }

    pub fn fail_create_user(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserStore for MockUserStore {
    async fn get_user(&self, email: &str) -> Result<Option<User>> {
        self.inner.get_user(email).await
    }

    async fn user_exists(&self, email: &str) -> Result<bool> {
        self.inner.user_exists(email).await
    }

    async fn create_user(&self, user: User) -> Result<()> {
        if self.fail_create.load(Ordering::SeqCst) {
            bail!("injected failure: create_user");
        }
        self.inner.create_user(user).await
    }

    async fn ensure_user(&self, user: User) -> Result<bool> {
        if self.fail_create.load(Ordering::SeqCst) {
            bail!("injected failure: ensure_user");
        }
        self.inner.ensure_user(user).await
    }

    async fn append_conversation_id(&self, email: &str, id: &ConversationId) -> Result<()> {
        if self.fail_append.load(Ordering::SeqCst) {
            bail!("injected failure: append_conversation_id");
        }
        self.inner.append_conversation_id(email, id).await
    }

    async fn remove_conversation_id(&self, email: &str, id: &ConversationId) -> Result<()> {
        if self.fail_remove.load(Ordering::SeqCst) {
            bail!("injected failure: remove_conversation_id");
        }
        self.inner.remove_conversation_id(email, id).await
    }
}

#[derive(Debug)]
pub struct MockConversationStore {
    inner: MemoryConversationStore,
    /// Appends still allowed before every further append fails
    append_budget: AtomicUsize,
    append_calls: AtomicUsize,
    fail_reads: AtomicBool,
    fail_updates: AtomicBool,
    /// Milliseconds every update waits before applying, like a remote store
    update_delay_ms: AtomicU64,
}

impl Default for MockConversationStore {
    fn default() -> Self {
        Self {
            inner: MemoryConversationStore::new(),
            append_budget: AtomicUsize::new(UNLIMITED),
            append_calls: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
            update_delay_ms: AtomicU64::new(0),
        }
    }
}

impl MockConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let the next `n` appends succeed, then fail all later ones.
    pub fn fail_appends_after(&self, n: usize) {
        self.append_budget.store(n, Ordering::SeqCst);
    }

    pub fn clear_append_failures(&self) {
        self.append_budget.store(UNLIMITED, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn delay_updates(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.update_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Number of append calls seen, failed ones included
    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    fn take_append_budget(&self) -> bool {
        self.append_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |budget| match budget {
                UNLIMITED => Some(UNLIMITED),
                0 => None,
                n => Some(n - 1),
            })
            .is_ok()
    }
}

#[async_trait]
impl ConversationStore for MockConversationStore {
    async fn create_conversation(&self, conversation: Conversation) -> Result<ConversationId> {
        self.inner.create_conversation(conversation).await
    }

    async fn get_conversation(&self, id: &ConversationId) -> Result<Option<StoredConversation>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("injected failure: get_conversation");
        }
        self.inner.get_conversation(id).await
    }

    async fn get_conversations(&self, ids: &[ConversationId]) -> Result<Vec<StoredConversation>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("injected failure: get_conversations");
        }
        self.inner.get_conversations(ids).await
    }

    async fn conversation_exists(&self, id: &ConversationId) -> Result<bool> {
        self.inner.conversation_exists(id).await
    }

    async fn append_messages(
        &self,
        id: &ConversationId,
        messages: Vec<Message>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        if !self.take_append_budget() {
            bail!("injected failure: append_messages");
        }
        self.inner.append_messages(id, messages, updated_at).await
    }

    async fn update_conversation(
        &self,
        id: &ConversationId,
        patch: ConversationPatch,
    ) -> Result<()> {
        let delay = self.update_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_updates.load(Ordering::SeqCst) {
            bail!("injected failure: update_conversation");
        }
        self.inner.update_conversation(id, patch).await
    }
}

pub struct MockStorage;

impl StorageTypes for MockStorage {
    type User = MockUserStore;
    type Conversation = MockConversationStore;
}

#[derive(Clone, Default)]
pub struct MockStores {
    pub users: Arc<MockUserStore>,
    pub conversations: Arc<MockConversationStore>,
}

impl MockStores {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stores<MockStorage> for MockStores {
    fn user(&self) -> Arc<MockUserStore> {
        self.users.clone()
    }

    fn conversation(&self) -> Arc<MockConversationStore> {
        self.conversations.clone()
    }
}
