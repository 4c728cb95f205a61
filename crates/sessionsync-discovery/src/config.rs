//! Discovery session configuration

use serde::{Deserialize, Serialize};
use sessionsync_core::model::{WING_PORT, X32_PORT};
use sessionsync_core::Family;
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::probe::ScanMode;

/// Session tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Full subnet rescan interval in seconds
    pub rescan_interval_secs: u64,
    /// Probe deadline during bulk subnet scans
    pub bulk_timeout_ms: u64,
    /// Probe deadline for operator-initiated probes
    pub manual_timeout_ms: u64,
    /// Deadline for the confirmation query
    pub verify_timeout_ms: u64,
    /// Pause after every Nth candidate address
    pub throttle_every: usize,
    /// Length of the throttle pause
    pub throttle_pause_ms: u64,
    /// Host numbers probed before the rest of each subnet
    pub priority_hosts: Vec<u8>,
    /// Local addresses whose /24 is scanned in place of the enumerated
    /// interfaces; empty scans every interface
    pub scan_addresses: Vec<Ipv4Addr>,
    /// OSC port probed for the X32/M32 family
    pub x32_port: u16,
    /// OSC port probed for the Wing family
    pub wing_port: u16,
    /// Enable passive mDNS discovery when the host supports it
    pub passive: bool,
    /// Advertised service type to browse
    pub service_type: String,
    /// Buffered events per subscriber before it starts missing events
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rescan_interval_secs: 30,
            bulk_timeout_ms: 200,
            manual_timeout_ms: 500,
            verify_timeout_ms: 1000,
            throttle_every: 10,
            throttle_pause_ms: 100,
            // Common static addresses for dedicated audio hardware
            priority_hosts: vec![1, 2, 10, 100, 200],
            scan_addresses: Vec::new(),
            x32_port: X32_PORT,
            wing_port: WING_PORT,
            passive: true,
            service_type: "_osc._udp.local.".to_string(),
            event_capacity: 100,
        }
    }
}

impl SessionConfig {
    pub fn rescan_interval(&self) -> Duration {
        Duration::from_secs(self.rescan_interval_secs)
    }

    pub fn probe_timeout(&self, mode: ScanMode) -> Duration {
        match mode {
            ScanMode::Bulk => Duration::from_millis(self.bulk_timeout_ms),
            ScanMode::Manual => Duration::from_millis(self.manual_timeout_ms),
        }
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }

    pub fn throttle_pause(&self) -> Duration {
        Duration::from_millis(self.throttle_pause_ms)
    }

    /// (family, port) pairs probed on every candidate address
    pub fn probe_ports(&self) -> [(Family, u16); 2] {
        [(Family::X32M32, self.x32_port), (Family::Wing, self.wing_port)]
    }
}
