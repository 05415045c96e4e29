use std::sync::Arc;

use crate::config::EngineSettings;
use crate::db::InMemoryStore;
use crate::services::FeedEngine;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<FeedEngine>,
}

impl AppState {
    pub fn new(engine: FeedEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// State backed entirely by one in-memory store
    pub fn in_memory(store: InMemoryStore, settings: EngineSettings) -> Self {
        Self::new(FeedEngine::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store),
            settings,
        ))
    }
}
