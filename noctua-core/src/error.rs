use llm::InferenceError;
use thiserror::Error;

use crate::storage::ConversationId;

/// Failure of a repository or orchestrator operation.
///
/// Every variant answers whether the user's message ended up persisted, so
/// callers can tell "retry the reply" apart from "resubmit the message".
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("conversation {conversation_id} has too many messages in flight")]
    QueueFull { conversation_id: ConversationId },

    #[error("failed to {operation}: {source}")]
    Store {
        operation: &'static str,
        conversation_id: Option<ConversationId>,
        user_message_persisted: bool,
        #[source]
        source: anyhow::Error,
    },

    #[error("{source}")]
    Inference {
        conversation_id: ConversationId,
        #[source]
        source: InferenceError,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;

impl ChatError {
    pub fn store(
        operation: &'static str,
        conversation_id: Option<&ConversationId>,
        source: anyhow::Error,
    ) -> Self {
        ChatError::Store {
            operation,
            conversation_id: conversation_id.cloned(),
            user_message_persisted: false,
            source,
        }
    }

    /// Store failure that happened after the user message was written
    pub fn store_after_user_message(
        operation: &'static str,
        conversation_id: &ConversationId,
        source: anyhow::Error,
    ) -> Self {
        ChatError::Store {
            operation,
            conversation_id: Some(conversation_id.clone()),
            user_message_persisted: true,
            source,
        }
    }

    pub fn user_message_persisted(&self) -> bool {
        match self {
            ChatError::Store {
                user_message_persisted,
                ..
            } => *user_message_persisted,
            ChatError::Inference { .. } => true,
            _ => false,
        }
    }

    pub fn conversation_id(&self) -> Option<&ConversationId> {
        match self {
            ChatError::QueueFull { conversation_id } => Some(conversation_id),
            ChatError::Store {
                conversation_id, ..
            } => conversation_id.as_ref(),
            ChatError::Inference {
                conversation_id, ..
            } => Some(conversation_id),
            _ => None,
        }
    }

    /// Stable machine-readable name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::Validation(_) => "validation",
            ChatError::Forbidden(_) => "forbidden",
            ChatError::NotFound(_) => "not_found",
            ChatError::QueueFull { .. } => "queue_full",
            ChatError::Store { .. } => "store",
            ChatError::Inference { .. } => "inference",
            ChatError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_persisted_flag_by_variant() {
        let id = ConversationId::from_string("c1");

        assert!(!ChatError::Validation("empty".into()).user_message_persisted());
        assert!(!ChatError::store("append message", Some(&id), anyhow!("down")).user_message_persisted());
        assert!(
            ChatError::store_after_user_message("append reply", &id, anyhow!("down"))
                .user_message_persisted()
        );

        let inference = ChatError::Inference {
            conversation_id: id.clone(),
            source: InferenceError::BadResponse("no answer".into()),
        };
        assert!(inference.user_message_persisted());
        assert_eq!(inference.conversation_id(), Some(&id));
        assert_eq!(inference.kind(), "inference");
    }

    #[test]
    fn test_store_display_includes_cause() {
        let err = ChatError::store("load conversation", None, anyhow!("disk full"));
        assert_eq!(err.to_string(), "failed to load conversation: disk full");
    }
}
