//! SessionSync OSC - Open Sound Control over UDP
//!
//! This crate provides the wire codec for OSC messages and the async
//! request/response transport used to probe and confirm mixing consoles.

pub mod message;
pub mod query;
pub mod transport;

pub use message::{OscArg, OscError, OscMessage};
pub use query::{confirm_device, query_packet, QueryError, INFO_ADDRESS, XINFO_ADDRESS};
pub use transport::{OscTransport, UdpOscTransport};
