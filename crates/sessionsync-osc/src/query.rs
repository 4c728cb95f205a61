//! Console queries over OSC

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::message::{OscError, OscMessage};
use crate::transport::OscTransport;

/// Liveness query answered by both X32/M32 and Wing consoles
pub const XINFO_ADDRESS: &str = "/xinfo";

/// Confirmation query for consoles found through service advertisement
pub const INFO_ADDRESS: &str = "/info";

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("No response from {target} within {deadline:?}")]
    Timeout {
        target: SocketAddr,
        deadline: Duration,
    },
    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid response: {0}")]
    InvalidResponse(#[from] OscError),
}

/// Encode a no-argument query for `address`
pub fn query_packet(address: &str) -> Vec<u8> {
    OscMessage::new(address).encode()
}

/// Send the query at `address` and require a well-formed OSC reply
pub async fn confirm_device(
    transport: &dyn OscTransport,
    target: SocketAddr,
    address: &str,
    deadline: Duration,
) -> Result<OscMessage, QueryError> {
    let reply = transport
        .transceive(target, &query_packet(address), deadline)
        .await?;
    let message = OscMessage::decode(&reply)?;
    debug!(
        target = %target,
        address = %message.address,
        args = message.args.len(),
        "Console confirmed"
    );
    Ok(message)
}
