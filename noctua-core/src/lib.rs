//! Conversation core for the noctua chat backend
//!
//! This crate provides:
//! - **Storage**: `UserStore` and `ConversationStore` traits with memory, mock
//!   and SQLite backends
//! - **Repository**: `ConversationRepository` for ownership checks, listing,
//!   titles and soft deletes
//! - **Orchestrator**: `MessageOrchestrator` running one exchange per user
//!   message against a `ChatModel`
//! - **Queue**: `ConversationQueue`, FIFO per conversation id
//!
//! # Example
//!
//! ```ignore
//! use noctua_core::{ConversationRepository, MessageOrchestrator, TranscriptCache};
//!
//! let repository = ConversationRepository::new(&stores, TranscriptCache::with_default_ttl(256));
//! let orchestrator = MessageOrchestrator::new(repository, model, Default::default());
//! let outcome = orchestrator.send_message(&identity, None, "Hello", None).await?;
//! ```
pub mod cache;
pub mod error;
pub mod orchestrator;
pub mod queue;
pub mod repository;
pub mod storage;

pub use cache::TranscriptCache;
pub use error::{ChatError, Result};
pub use orchestrator::{
    Attachment, ExchangeState, MessageOrchestrator, OrchestratorConfig, SendOutcome, TitleTiming,
};
pub use queue::{ConversationQueue, QueueStatus};
pub use repository::ConversationRepository;
pub use storage::{ConversationId, Identity};

pub use llm;
