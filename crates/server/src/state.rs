use std::sync::Arc;

use dfufleet_core::{Config, DfuOrchestrator};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<DfuOrchestrator>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: Arc<DfuOrchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> &DfuOrchestrator {
        &self.orchestrator
    }
}
