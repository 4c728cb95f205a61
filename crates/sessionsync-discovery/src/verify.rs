//! Secondary confirmation of newly registered consoles

use sessionsync_core::{DeviceRecord, DiscoveryMethod};
use sessionsync_osc::{confirm_device, OscTransport, INFO_ADDRESS, XINFO_ADDRESS};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, warn};

/// Query used to confirm a record found through `method`
pub fn confirmation_address(method: DiscoveryMethod) -> &'static str {
    match method {
        DiscoveryMethod::Probed => XINFO_ADDRESS,
        DiscoveryMethod::Advertised => INFO_ADDRESS,
    }
}

/// Confirm that `record` answers its confirmation query with well-formed OSC
///
/// Failure is reported as an error string stored on the record, never raised.
pub async fn verify(
    transport: &dyn OscTransport,
    record: &DeviceRecord,
    deadline: Duration,
) -> Result<(), String> {
    let target = SocketAddr::new(record.ip, record.port);
    let address = confirmation_address(record.method);
    match confirm_device(transport, target, address, deadline).await {
        Ok(reply) => {
            debug!(device = %record.id, address = %reply.address, "Verification succeeded");
            Ok(())
        }
        Err(e) => {
            warn!(device = %record.id, query = address, error = %e, "Verification failed");
            Err(e.to_string())
        }
    }
}
