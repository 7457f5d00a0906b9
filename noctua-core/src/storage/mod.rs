//! Document Store Adapter
//!
//! Two keyed collections, `Users` and `Conversations`, behind async traits.
//! The store is the only source of truth for conversation state.

pub mod ids;
pub mod implementations;
pub mod traits;
pub mod types;

pub use ids::ConversationId;
pub use implementations::memory::{MemoryConversationStore, MemoryStorage, MemoryStores, MemoryUserStore};
pub use implementations::mock::{MockConversationStore, MockStorage, MockStores, MockUserStore};
#[cfg(feature = "sqlite")]
pub use implementations::sqlite::{SqliteStorage, SqliteStore, SqliteStores};
pub use traits::{ConversationStore, StorageTypes, Stores, UserStore};
pub use types::{
    Conversation, ConversationPatch, ConversationSummary, Identity, Message, MessageMetadata,
    Stored, StoredConversation, User, derive_title, placeholder_title,
};
