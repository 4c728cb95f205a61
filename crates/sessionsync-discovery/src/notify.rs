//! Change notification fan-out

use sessionsync_core::DeviceRecord;
use tokio::sync::broadcast;
use tracing::trace;

/// Observable registry change
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    DeviceDiscovered(DeviceRecord),
    DeviceUpdated(DeviceRecord),
    DeviceRemoved(DeviceRecord),
}

impl DiscoveryEvent {
    pub fn record(&self) -> &DeviceRecord {
        match self {
            Self::DeviceDiscovered(record)
            | Self::DeviceUpdated(record)
            | Self::DeviceRemoved(record) => record,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeviceDiscovered(_) => "device_discovered",
            Self::DeviceUpdated(_) => "device_updated",
            Self::DeviceRemoved(_) => "device_removed",
        }
    }
}

/// Fire-and-forget publisher
///
/// A subscriber that falls more than the channel capacity behind misses the
/// oldest events; publishing never waits on a subscriber.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<DiscoveryEvent>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: DiscoveryEvent) {
        trace!(kind = event.kind(), device = %event.record().id, "Publishing event");
        // No subscribers is not an error
        let _ = self.tx.send(event);
    }
}
