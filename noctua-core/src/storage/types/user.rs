//! User documents and the identity behind a request

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::ids::ConversationId;

/// A user document in the `Users` collection, keyed by email.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    /// Conversations the user may access, in creation order
    #[serde(default)]
    pub conversation_ids: Vec<ConversationId>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(identity: &Identity, now: DateTime<Utc>) -> Self {
        Self {
            email: identity.email.clone(),
            name: identity.name.clone(),
            image: identity.image.clone(),
            conversation_ids: Vec::new(),
            created_at: now,
        }
    }

    pub fn owns(&self, id: &ConversationId) -> bool {
        self.conversation_ids.contains(id)
    }
}

/// The authenticated caller, as established by the session layer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

impl Identity {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            image: None,
        }
    }

    pub fn with_profile(mut self, name: Option<String>, image: Option<String>) -> Self {
        self.name = name;
        self.image = image;
        self
    }
}
