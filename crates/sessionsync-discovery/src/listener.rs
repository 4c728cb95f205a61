//! Passive service-advertisement discovery
//!
//! Passive listening is an optional capability. [`detect_listener`] resolves it
//! once, returning either the mDNS adapter or [`NoopListener`]; the session
//! never checks for mDNS support anywhere else.

use async_trait::async_trait;
use mdns_sd::{ServiceDaemon, ServiceEvent as MdnsEvent};
use sessionsync_core::{Classifier, Confidence, DeviceRecord, DiscoveryMethod};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{DiscoveryError, Result};

/// Service announcement forwarded to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    Up {
        name: String,
        addresses: Vec<IpAddr>,
        port: u16,
    },
    Down {
        name: String,
    },
}

/// Source of service up/down announcements
#[async_trait]
pub trait ServiceListener: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Whether this listener can deliver events at all
    fn is_available(&self) -> bool;

    /// Start browsing `service_type`, forwarding events until unsubscribed
    async fn subscribe(
        &self,
        service_type: &str,
        events: mpsc::UnboundedSender<ServiceEvent>,
    ) -> Result<()>;

    /// Stop browsing; safe to call when not subscribed
    async fn unsubscribe(&self);
}

/// Listener used when passive discovery is unavailable
#[derive(Debug, Default)]
pub struct NoopListener;

#[async_trait]
impl ServiceListener for NoopListener {
    fn name(&self) -> &'static str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn subscribe(
        &self,
        _service_type: &str,
        _events: mpsc::UnboundedSender<ServiceEvent>,
    ) -> Result<()> {
        Ok(())
    }

    async fn unsubscribe(&self) {}
}

/// mDNS browser backed by `mdns-sd`
pub struct MdnsListener {
    daemon: ServiceDaemon,
    browse: Mutex<Option<(String, JoinHandle<()>)>>,
}

impl MdnsListener {
    pub fn new() -> Result<Self> {
        let daemon =
            ServiceDaemon::new().map_err(|e| DiscoveryError::ListenerUnavailable(e.to_string()))?;
        Ok(Self {
            daemon,
            browse: Mutex::new(None),
        })
    }
}

#[async_trait]
impl ServiceListener for MdnsListener {
    fn name(&self) -> &'static str {
        "mdns"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn subscribe(
        &self,
        service_type: &str,
        events: mpsc::UnboundedSender<ServiceEvent>,
    ) -> Result<()> {
        let mut browse = self.browse.lock().await;
        if let Some((previous, task)) = browse.take() {
            stop_browse(&self.daemon, &previous, task);
        }

        let receiver = self
            .daemon
            .browse(service_type)
            .map_err(|e| DiscoveryError::BrowseFailed {
                service_type: service_type.to_string(),
                reason: e.to_string(),
            })?;

        let ty = service_type.to_string();
        let task = tokio::spawn(async move {
            while let Ok(event) = receiver.recv_async().await {
                let forwarded = match event {
                    MdnsEvent::ServiceResolved(info) => {
                        let mut addresses: Vec<IpAddr> =
                            info.get_addresses().iter().copied().collect();
                        addresses.sort_by_key(|addr| (addr.is_ipv6(), *addr));
                        Some(ServiceEvent::Up {
                            name: instance_name(info.get_fullname(), &ty),
                            addresses,
                            port: info.get_port(),
                        })
                    }
                    MdnsEvent::ServiceRemoved(_, fullname) => Some(ServiceEvent::Down {
                        name: instance_name(&fullname, &ty),
                    }),
                    _ => None,
                };

                if let Some(event) = forwarded {
                    if events.send(event).is_err() {
                        break;
                    }
                }
            }
            debug!(service_type = %ty, "mDNS browse task stopped");
        });

        info!(service_type, "mDNS browsing started");
        *browse = Some((service_type.to_string(), task));
        Ok(())
    }

    async fn unsubscribe(&self) {
        if let Some((service_type, task)) = self.browse.lock().await.take() {
            stop_browse(&self.daemon, &service_type, task);
            info!(service_type = %service_type, "mDNS browsing stopped");
        }
    }
}

impl Drop for MdnsListener {
    fn drop(&mut self) {
        let _ = self.daemon.shutdown();
    }
}

fn stop_browse(daemon: &ServiceDaemon, service_type: &str, task: JoinHandle<()>) {
    if let Err(e) = daemon.stop_browse(service_type) {
        debug!(service_type, error = %e, "Failed to stop mDNS browse");
    }
    task.abort();
}

/// Instance part of a full service name (`FOH X32._osc._udp.local.` -> `FOH X32`)
fn instance_name(fullname: &str, service_type: &str) -> String {
    fullname
        .strip_suffix(service_type)
        .map(|name| name.trim_end_matches('.'))
        .unwrap_or(fullname)
        .to_string()
}

/// Pick the passive listener for this host, once per session
pub fn detect_listener(enabled: bool) -> Arc<dyn ServiceListener> {
    if !enabled {
        info!("Passive discovery disabled by configuration");
        return Arc::new(NoopListener);
    }
    match MdnsListener::new() {
        Ok(listener) => Arc::new(listener),
        Err(e) => {
            warn!(error = %e, "mDNS not available, falling back to probe-only discovery");
            Arc::new(NoopListener)
        }
    }
}

/// Build a record from an advertised service
///
/// Returns `None` when the service name does not classify or carries no address.
pub fn identify(
    classifier: &Classifier,
    name: &str,
    addresses: &[IpAddr],
    port: u16,
) -> Option<DeviceRecord> {
    let classification = classifier.classify(name)?;
    let ip = addresses
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addresses.first())
        .copied()?;
    let model = classification.model;
    let port = if port == 0 { model.default_port() } else { port };

    if classification.confidence == Confidence::FamilyDefault {
        debug!(name, model = %model, "Model assumed from family");
    }

    Some(
        DeviceRecord::new(
            model,
            name.to_string(),
            ip,
            port,
            DiscoveryMethod::Advertised,
        )
        .with_confidence(classification.confidence),
    )
}
