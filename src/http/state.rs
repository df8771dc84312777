use crate::config::Config;
use crate::relay::Relay;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Relay shared by every websocket connection
    pub relay: Arc<Relay>,
}

impl AppState {
    pub fn new(config: Config, relay: Relay) -> Self {
        Self {
            config: Arc::new(config),
            relay: Arc::new(relay),
        }
    }

    pub fn from_config(config: Config) -> crate::error::Result<Self> {
        let relay = Relay::from_config(&config)?;
        Ok(Self::new(config, relay))
    }
}
