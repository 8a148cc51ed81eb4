//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{LobbyRegistry, TickDriver};
use crate::gateway::SessionGateway;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<LobbyRegistry>,
    pub gateway: Arc<SessionGateway>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // One registry for the whole process, shared by driver and gateway
        let registry = Arc::new(LobbyRegistry::new());
        let gateway = Arc::new(SessionGateway::new(registry.clone()));

        Self {
            config,
            registry,
            gateway,
        }
    }

    /// Tick driver bound to this state's registry
    pub fn tick_driver(&self) -> TickDriver {
        TickDriver::new(self.registry.clone(), self.config.tick_rate)
    }
}
