//! Error types for the discovery session

use thiserror::Error;

/// Result type alias for discovery operations
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Errors raised while setting up discovery
///
/// None of these stop a running session; callers log them and carry on in
/// whatever mode is still available.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Local interfaces could not be listed
    #[error("Failed to list network interfaces: {0}")]
    Interfaces(String),

    /// Passive service discovery is not supported on this host
    #[error("Passive service discovery unavailable: {0}")]
    ListenerUnavailable(String),

    /// Failed to browse for a service type
    #[error("Failed to browse for service type '{service_type}': {reason}")]
    BrowseFailed { service_type: String, reason: String },

    /// Classifier rules failed to compile
    #[error(transparent)]
    Classifier(#[from] sessionsync_core::ClassifierError),
}
