//! In-memory storage
//!
//! The default backend when no database path is configured, and the one
//! unit tests run against.

mod conversation;
mod user;

pub use conversation::MemoryConversationStore;
pub use user::MemoryUserStore;

use anyhow::{Result, anyhow};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::storage::traits::{StorageTypes, Stores};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

pub struct MemoryStorage;

impl StorageTypes for MemoryStorage {
    type User = MemoryUserStore;
    type Conversation = MemoryConversationStore;
}

#[derive(Clone, Default)]
pub struct MemoryStores {
    users: Arc<MemoryUserStore>,
    conversations: Arc<MemoryConversationStore>,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stores<MemoryStorage> for MemoryStores {
    fn user(&self) -> Arc<MemoryUserStore> {
        self.users.clone()
    }

    fn conversation(&self) -> Arc<MemoryConversationStore> {
        self.conversations.clone()
    }
}
