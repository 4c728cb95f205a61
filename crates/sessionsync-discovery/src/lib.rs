//! SessionSync Discovery - Hybrid discovery of mixing consoles
//!
//! This crate combines two discovery methods into one registry:
//! - Active UDP probing of every address on the local /24 subnets
//! - Passive mDNS service advertisement, when the host supports it
//!
//! Responders are classified into console models, merged into a deduplicated
//! registry, confirmed with a second query and announced to subscribers.

pub mod config;
pub mod error;
pub mod interfaces;
pub mod listener;
pub mod notify;
pub mod probe;
pub mod session;
pub mod verify;

pub use config::SessionConfig;
pub use error::{DiscoveryError, Result};
pub use interfaces::{derive_candidates, list_interfaces, LocalInterface, ProbeTarget};
pub use listener::{detect_listener, MdnsListener, NoopListener, ServiceEvent, ServiceListener};
pub use notify::{DiscoveryEvent, Notifier};
pub use probe::{ProbeResponse, ScanMode};
pub use session::DiscoverySession;
