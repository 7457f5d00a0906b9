pub mod conversation;
pub mod stored;
pub mod user;

pub use conversation::{
    Conversation, ConversationPatch, ConversationSummary, Message, MessageMetadata,
    derive_title, placeholder_title,
};
pub use stored::Stored;
pub use user::{Identity, User};

use crate::storage::ids::ConversationId;

pub type StoredConversation = Stored<ConversationId, Conversation>;
