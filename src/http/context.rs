//! Shared state for HTTP handlers.

use std::sync::Arc;

use crate::intake::EventIntake;
use crate::storage::Storage;

/// Application state cloned into each handler.
#[derive(Clone)]
pub struct WebContext {
    pub intake: Arc<EventIntake>,
    /// Storage handle used by the health probe.
    pub storage: Arc<dyn Storage>,
}

impl WebContext {
    pub fn new(intake: Arc<EventIntake>, storage: Arc<dyn Storage>) -> Self {
        Self { intake, storage }
    }
}
