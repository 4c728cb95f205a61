//! Application state management

use anyhow::Result;
use sessionsync_discovery::DiscoverySession;
use std::sync::Arc;

use crate::config::Config;

/// Shared application state
pub struct AppState {
    /// The process-wide discovery session
    pub session: Arc<DiscoverySession>,
    /// Configuration
    pub config: Config,
}

impl AppState {
    /// Create the session; must be called inside the runtime
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let session = Arc::new(DiscoverySession::new(config.discovery.clone())?);
        Ok(Arc::new(Self { session, config }))
    }
}
