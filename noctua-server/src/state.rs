use noctua_core::storage::StorageTypes;
use noctua_core::{ConversationRepository, MessageOrchestrator};
use std::sync::Arc;

use crate::auth::Authenticator;

/// Shared by every handler
pub struct AppState<S: StorageTypes> {
    pub orchestrator: MessageOrchestrator<S>,
    pub auth: Arc<Authenticator>,
}

impl<S: StorageTypes> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: self.orchestrator.clone(),
            auth: self.auth.clone(),
        }
    }
}

impl<S: StorageTypes> AppState<S> {
    pub fn new(orchestrator: MessageOrchestrator<S>, auth: Authenticator) -> Self {
        Self {
            orchestrator,
            auth: Arc::new(auth),
        }
    }

    pub fn repository(&self) -> &ConversationRepository<S> {
        self.orchestrator.repository()
    }
}
