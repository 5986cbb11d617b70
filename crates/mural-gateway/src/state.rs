//! Gateway shared state.

use std::sync::Arc;

use mural_core::config::Config;
use mural_store::ChunkStore;

use crate::registry::SessionRegistry;

/// State shared by every connection handler.
pub struct GatewayState {
    pub config: Arc<Config>,
    pub store: Arc<dyn ChunkStore>,
    pub registry: SessionRegistry,
}

impl GatewayState {
    pub fn new(config: Arc<Config>, store: Arc<dyn ChunkStore>) -> Self {
        Self {
            config,
            store,
            registry: SessionRegistry::new(),
        }
    }
}
