//! Conversation documents and the messages embedded in them

use chrono::{DateTime, Utc};
use llm::{AssistantAnswer, ImageRef, Resource, Role, TranscriptMessage};
use serde::{Deserialize, Serialize};

use crate::storage::ids::ConversationId;

/// Longest derived title, in characters, before the ellipsis
pub const TITLE_MAX_CHARS: usize = 40;

/// Extra data carried by assistant messages
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default)]
    pub grounding: bool,
}

/// A single entry of a conversation. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl Message {
    pub fn user(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp,
            metadata: None,
        }
    }

    pub fn assistant(answer: AssistantAnswer, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: Role::Assistant,
            content: answer.answer,
            timestamp,
            metadata: Some(MessageMetadata {
                resources: answer.resources,
                images: answer.images,
                grounding: answer.grounding,
            }),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

impl From<&Message> for TranscriptMessage {
    fn from(message: &Message) -> Self {
        TranscriptMessage::new(message.role, message.content.clone())
    }
}

/// A conversation document as held in the `Conversations` collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(default)]
    pub title: Option<String>,
    /// Owner email
    pub user_id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "isDeleted", default)]
    pub is_deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn new(user_id: impl Into<String>, title: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            title,
            user_id: user_id.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }

    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.messages.last().map(|m| m.timestamp)
    }

    /// Timestamp used to order the conversation list
    pub fn activity_at(&self) -> DateTime<Utc> {
        self.last_message_at().unwrap_or(self.updated_at)
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, patch: &ConversationPatch) {
        if let Some(title) = &patch.title {
            self.title = Some(title.clone());
        }
        if let Some(updated_at) = patch.updated_at {
            self.updated_at = updated_at;
        }
        if let Some(is_deleted) = patch.is_deleted {
            self.is_deleted = is_deleted;
        }
        if let Some(deleted_at) = patch.deleted_at {
            self.deleted_at = Some(deleted_at);
        }
    }
}

/// Partial update of a conversation's scalar fields. `None` leaves a field as-is.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConversationPatch {
    pub title: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_deleted: Option<bool>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ConversationPatch {
    pub fn title(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            title: Some(title.into()),
            updated_at: Some(now),
            ..Default::default()
        }
    }

    pub fn tombstone(now: DateTime<Utc>) -> Self {
        Self {
            updated_at: Some(now),
            is_deleted: Some(true),
            deleted_at: Some(now),
            ..Default::default()
        }
    }
}

/// Row of the conversation list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub message_count: usize,
}

impl ConversationSummary {
    pub fn from_conversation(id: ConversationId, conversation: &Conversation) -> Self {
        Self {
            id,
            title: conversation.title.clone(),
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
            last_message_at: conversation.last_message_at(),
            message_count: conversation.messages.len(),
        }
    }
}

/// Title derived from the first user message: trimmed, cut to 40 chars plus `...`.
pub fn derive_title(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > TITLE_MAX_CHARS {
        let head: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        trimmed.to_string()
    }
}

/// Title given to an empty conversation before its first message.
pub fn placeholder_title(existing: usize) -> String {
    format!("Conversation {}", existing + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_title_truncates_long_text() {
        assert_eq!(
            derive_title("Explain the halting problem in simple terms please"),
            "Explain the halting problem in simple te..."
        );
    }

    #[test]
    fn test_derive_title_keeps_short_text() {
        assert_eq!(derive_title("Hi"), "Hi");
        assert_eq!(derive_title("   padded question   "), "padded question");
    }

    #[test]
    fn test_derive_title_boundary() {
        let exactly = "a".repeat(40);
        assert_eq!(derive_title(&exactly), exactly);

        let over = "a".repeat(41);
        assert_eq!(derive_title(&over), format!("{}...", "a".repeat(40)));
    }

    #[test]
    fn test_derive_title_counts_chars_not_bytes() {
        let text = "ü".repeat(41);
        let title = derive_title(&text);
        assert_eq!(title.chars().count(), 43);
    }

    #[test]
    fn test_placeholder_title() {
        assert_eq!(placeholder_title(0), "Conversation 1");
        assert_eq!(placeholder_title(4), "Conversation 5");
    }

    #[test]
    fn test_conversation_wire_names() {
        let now = Utc::now();
        let conversation = Conversation::new("a@example.com", None, now);
        let value = serde_json::to_value(&conversation).unwrap();
        assert_eq!(value["isDeleted"], false);
        assert!(value.get("deleted_at").is_none());
    }

    #[test]
    fn test_assistant_message_carries_metadata() {
        let answer = AssistantAnswer {
            answer: "42".to_string(),
            grounding: true,
            ..Default::default()
        };
        let message = Message::assistant(answer, Utc::now());
        assert_eq!(message.role, Role::Assistant);
        assert!(message.metadata.unwrap().grounding);
    }

    #[test]
    fn test_tombstone_patch() {
        let now = Utc::now();
        let mut conversation = Conversation::new("a@example.com", Some("t".into()), now);
        let later = now + chrono::Duration::seconds(5);
        conversation.apply(&ConversationPatch::tombstone(later));

        assert!(conversation.is_deleted);
        assert_eq!(conversation.deleted_at, Some(later));
        assert_eq!(conversation.updated_at, later);
        assert_eq!(conversation.title.as_deref(), Some("t"));
    }
}
