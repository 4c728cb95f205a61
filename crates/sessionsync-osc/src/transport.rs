//! Async UDP transport for OSC queries

use async_trait::async_trait;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::trace;

use crate::query::QueryError;

/// Request/response exchange with a console
///
/// Each call is one exchange: send a single packet, then return the first
/// datagram that arrives before the deadline.
#[async_trait]
pub trait OscTransport: Send + Sync {
    async fn transceive(
        &self,
        target: SocketAddr,
        packet: &[u8],
        deadline: Duration,
    ) -> Result<Vec<u8>, QueryError>;
}

/// Real UDP transport; every exchange binds its own ephemeral socket
#[derive(Debug, Clone)]
pub struct UdpOscTransport {
    mtu: usize,
}

impl UdpOscTransport {
    pub fn new() -> Self {
        Self { mtu: 2048 }
    }
}

impl Default for UdpOscTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OscTransport for UdpOscTransport {
    async fn transceive(
        &self,
        target: SocketAddr,
        packet: &[u8],
        deadline: Duration,
    ) -> Result<Vec<u8>, QueryError> {
        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;

        trace!(target = %target, len = packet.len(), "Sending OSC query");
        socket.send_to(packet, target).await?;

        let mut buf = vec![0u8; self.mtu];
        let (len, from) = timeout(deadline, socket.recv_from(&mut buf))
            .await
            .map_err(|_| QueryError::Timeout { target, deadline })??;

        // The socket is dropped on return, so later datagrams are discarded
        trace!(target = %target, from = %from, len, "Received OSC response");
        buf.truncate(len);
        Ok(buf)
    }
}
