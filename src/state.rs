//! Shared application state

use std::sync::Arc;

use crate::store::{PortalStore, SessionStore};

/// Application state shared across route handlers
pub struct AppState<P, S> {
    pub store: Arc<P>,
    pub sessions: Arc<S>,
}

impl<P: PortalStore, S: SessionStore> AppState<P, S> {
    pub fn new(store: P, sessions: S) -> Self {
        Self {
            store: Arc::new(store),
            sessions: Arc::new(sessions),
        }
    }

    /// Build state from pre-wrapped stores, so tests can keep their own
    /// handles for seeding fixtures
    pub fn new_with_arcs(store: Arc<P>, sessions: Arc<S>) -> Self {
        Self { store, sessions }
    }
}
