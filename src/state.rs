// src/state.rs
// Application state shared across HTTP handlers.

use std::sync::Arc;

use crate::debate::orchestrator::Orchestrator;
use crate::store::SqliteStore;

/// Capabilities injected into the HTTP layer. Cloning is cheap; everything
/// heavy sits behind an `Arc` or a pool.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub store: SqliteStore,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, store: SqliteStore) -> Self {
        Self {
            orchestrator,
            store,
        }
    }
}
