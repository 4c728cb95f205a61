//! Active UDP probing for console presence

use sessionsync_core::model::X32_PORT;
use sessionsync_core::{
    Classification, Classifier, Confidence, ConsoleModel, DeviceRecord, DiscoveryMethod, Family,
};
use sessionsync_osc::{query_packet, OscTransport, XINFO_ADDRESS};
use std::borrow::Cow;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, trace};

use crate::interfaces::ProbeTarget;

/// Which deadline a probe runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Periodic full-subnet scan
    Bulk,
    /// Operator-initiated single probe
    Manual,
}

/// Raw answer to a liveness query
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub target: ProbeTarget,
    pub payload: Vec<u8>,
}

impl ProbeResponse {
    /// Payload as text for classification
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Send `/xinfo` to one target and wait for one datagram
///
/// Any datagram counts as alive. Timeouts and socket errors both yield `None`
/// and are not retried; the next rescan covers the address again.
pub async fn probe(
    transport: &dyn OscTransport,
    target: ProbeTarget,
    deadline: Duration,
) -> Option<ProbeResponse> {
    match transport
        .transceive(target.socket_addr(), &query_packet(XINFO_ADDRESS), deadline)
        .await
    {
        Ok(payload) => {
            debug!(ip = %target.ip, port = target.port, len = payload.len(), "Console responded");
            Some(ProbeResponse { target, payload })
        }
        Err(e) => {
            trace!(ip = %target.ip, port = target.port, error = %e, "No console");
            None
        }
    }
}

/// Build a record from a probe response
///
/// Falls back to the family assumed for the probed port when the payload does
/// not classify; such records carry `Confidence::FamilyDefault`.
pub fn identify(classifier: &Classifier, response: &ProbeResponse) -> DeviceRecord {
    let target = response.target;
    let classification = classifier
        .classify(&response.text())
        .unwrap_or_else(|| Classification {
            model: assumed_model(target.family, target.port),
            confidence: Confidence::FamilyDefault,
        });
    let model = classification.model;
    let ip = IpAddr::V4(target.ip);

    if classification.confidence == Confidence::FamilyDefault {
        debug!(ip = %ip, port = target.port, model = %model, "Model assumed from family");
    }

    DeviceRecord::new(
        model,
        DeviceRecord::probed_name(model, ip),
        ip,
        target.port,
        DiscoveryMethod::Probed,
    )
    .with_confidence(classification.confidence)
}

// X32 and M32 share a port, so the port cannot tell them apart; an X32/M32
// responder on any other port is assumed to be an M32.
fn assumed_model(family: Family, port: u16) -> ConsoleModel {
    match family {
        Family::X32M32 if port == X32_PORT => ConsoleModel::X32,
        Family::X32M32 => ConsoleModel::M32,
        Family::Wing => ConsoleModel::Wing,
    }
}
