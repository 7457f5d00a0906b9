//! Storage trait definitions
//!
//! Implementations live in `implementations/`.

mod conversation;
mod user;

pub use conversation::ConversationStore;
pub use user::UserStore;

use std::sync::Arc;

/// Bundles the store types of one backend into a single type parameter.
///
/// ```ignore
/// pub struct AppStorage;
///
/// impl StorageTypes for AppStorage {
///     type User = SqliteStore;
///     type Conversation = SqliteStore;
/// }
///
/// type AppRepository = ConversationRepository<AppStorage>;
/// ```
pub trait StorageTypes: Send + Sync + 'static {
    /// `Users` collection
    type User: UserStore + Send + Sync;
    /// `Conversations` collection
    type Conversation: ConversationStore + Send + Sync;
}

/// Provides access to store instances.
///
/// A backend can hand out the same underlying store for both accessors.
pub trait Stores<S: StorageTypes>: Send + Sync {
    fn user(&self) -> Arc<S::User>;
    fn conversation(&self) -> Arc<S::Conversation>;
}
