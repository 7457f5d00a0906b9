//! Bounded transcript cache
//!
//! Saves a store read at the start of each exchange. The store stays
//! authoritative: entries are only ever written after a successful store
//! write, and are dropped on any failure or delete.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::storage::{ConversationId, Message};

struct CachedTranscript {
    messages: Vec<Message>,
    timestamp: Instant,
}

#[derive(Clone)]
pub struct TranscriptCache {
    entries: Arc<RwLock<HashMap<ConversationId, CachedTranscript>>>,
    ttl: Duration,
    max_entries: usize,
}

impl TranscriptCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            max_entries,
        }
    }

    /// Cache with a 5 minute TTL
    pub fn with_default_ttl(max_entries: usize) -> Self {
        Self::new(Duration::from_secs(300), max_entries)
    }

    pub async fn get(&self, id: &ConversationId) -> Option<Vec<Message>> {
        {
            let entries = self.entries.read().await;
            match entries.get(id) {
                Some(entry) if entry.timestamp.elapsed() < self.ttl => {
                    return Some(entry.messages.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        // Expired
        self.entries.write().await.remove(id);
        None
    }

    pub async fn put(&self, id: &ConversationId, messages: Vec<Message>) {
        if self.max_entries == 0 {
            return;
        }
        let mut entries = self.entries.write().await;
        if !entries.contains_key(id) && entries.len() >= self.max_entries {
            entries.retain(|_, entry| entry.timestamp.elapsed() < self.ttl);
            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.timestamp)
                    .map(|(key, _)| key.clone());
                if let Some(key) = oldest {
                    entries.remove(&key);
                }
            }
        }
        entries.insert(
            id.clone(),
            CachedTranscript {
                messages,
                timestamp: Instant::now(),
            },
        );
    }

    /// Append to a cached transcript. Does nothing if the id is not cached.
    pub async fn extend(&self, id: &ConversationId, messages: &[Message]) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(id) {
            entry.messages.extend_from_slice(messages);
            entry.timestamp = Instant::now();
        }
    }

    pub async fn invalidate(&self, id: &ConversationId) {
        self.entries.write().await.remove(id);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
