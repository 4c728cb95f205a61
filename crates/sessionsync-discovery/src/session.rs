//! Discovery session: lifecycle, scanning and the registry actor
//!
//! The registry is owned by a single actor task. Probe completions, service
//! announcements and verification results all reach it as messages, so every
//! merge and its notification happen as one step with no locking.

use sessionsync_core::{Classifier, DeviceId, DeviceRecord, Family, Registry};
use sessionsync_osc::{OscTransport, UdpOscTransport};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::Result;
use crate::interfaces::{
    derive_candidates, distinct_subnets, list_interfaces, probe_targets, LocalInterface,
    ProbeTarget,
};
use crate::listener::{self, detect_listener, ServiceEvent, ServiceListener};
use crate::notify::{DiscoveryEvent, Notifier};
use crate::probe::{self, ScanMode};
use crate::verify::verify;

enum Command {
    Merge(DeviceRecord),
    ServiceDown(String),
    Snapshot(oneshot::Sender<Vec<DeviceRecord>>),
}

/// Verification result tagged with the insertion episode it was started for
type Verification = (DeviceId, u64, std::result::Result<(), String>);

struct RegistryActor {
    registry: Registry,
    notifier: Notifier,
    transport: Arc<dyn OscTransport>,
    verify_timeout: Duration,
    verified_tx: mpsc::UnboundedSender<Verification>,
}

impl RegistryActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut verified: mpsc::UnboundedReceiver<Verification>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some((id, episode, result)) = verified.recv() => {
                    self.resolve(&id, episode, result)
                }
            }
        }
        debug!("Registry actor stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Merge(record) => self.merge(record),
            Command::ServiceDown(name) => {
                if let Some(removed) = self.registry.remove_advertised_by_name(&name) {
                    info!(device = %removed.id, name = %name, "Console service removed");
                    self.notifier.publish(DiscoveryEvent::DeviceRemoved(removed));
                } else {
                    debug!(name = %name, "Removal for unknown service");
                }
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.registry.snapshot());
            }
        }
    }

    fn merge(&mut self, record: DeviceRecord) {
        let outcome = self.registry.upsert(record);
        let needs_verification = outcome.needs_verification();

        if outcome.is_new {
            info!(
                device = %outcome.record.id,
                name = %outcome.record.name,
                via = ?outcome.record.method,
                confidence = ?outcome.record.confidence,
                "Console discovered"
            );
            self.notifier
                .publish(DiscoveryEvent::DeviceDiscovered(outcome.record.clone()));
        } else if outcome.is_updated {
            self.notifier
                .publish(DiscoveryEvent::DeviceUpdated(outcome.record.clone()));
        }

        if needs_verification {
            self.spawn_verification(outcome.record, outcome.episode);
        }
    }

    fn spawn_verification(&self, record: DeviceRecord, episode: u64) {
        let transport = self.transport.clone();
        let deadline = self.verify_timeout;
        let tx = self.verified_tx.clone();
        tokio::spawn(async move {
            let result = verify(transport.as_ref(), &record, deadline).await;
            let _ = tx.send((record.id, episode, result));
        });
    }

    fn resolve(&mut self, id: &DeviceId, episode: u64, result: std::result::Result<(), String>) {
        if let Some(record) = self.registry.resolve_verification(id, episode, result) {
            self.notifier.publish(DiscoveryEvent::DeviceUpdated(record));
        }
    }
}

/// Everything a scan needs, cheap to clone into spawned tasks
#[derive(Clone)]
struct ScanContext {
    config: SessionConfig,
    transport: Arc<dyn OscTransport>,
    classifier: Arc<Classifier>,
    commands: mpsc::UnboundedSender<Command>,
}

impl ScanContext {
    /// Interfaces to scan: the configured addresses, else every local interface
    fn scan_set(&self) -> Result<Vec<LocalInterface>> {
        if self.config.scan_addresses.is_empty() {
            return list_interfaces();
        }
        Ok(self
            .config
            .scan_addresses
            .iter()
            .map(|ip| LocalInterface::new("configured", *ip, None))
            .collect())
    }

    async fn scan_all(&self) -> usize {
        match self.scan_set() {
            Ok(interfaces) => self.scan_interfaces(&interfaces).await,
            Err(e) => {
                warn!(error = %e, "Skipping scan");
                0
            }
        }
    }

    /// Launch probes for every candidate on every distinct subnet
    ///
    /// Probes are detached; the call returns once all of them are launched.
    async fn scan_interfaces(&self, interfaces: &[LocalInterface]) -> usize {
        let ports = self.config.probe_ports();
        let deadline = self.config.probe_timeout(ScanMode::Bulk);
        let every = self.config.throttle_every.max(1);
        let mut launched = 0;

        for iface in distinct_subnets(interfaces) {
            let [a, b, c] = iface.subnet();
            debug!(interface = %iface.name, "Scanning {}.{}.{}.0/24", a, b, c);

            let candidates = derive_candidates(&iface, &self.config.priority_hosts);
            for (index, chunk) in candidates.chunks(every).enumerate() {
                if index > 0 {
                    tokio::time::sleep(self.config.throttle_pause()).await;
                }
                for target in probe_targets(chunk, &ports) {
                    self.spawn_probe(target, deadline);
                    launched += 1;
                }
            }
        }

        debug!("Launched {} probes", launched);
        launched
    }

    fn spawn_probe(&self, target: ProbeTarget, deadline: Duration) {
        let ctx = self.clone();
        tokio::spawn(async move {
            ctx.probe_and_merge(target, deadline).await;
        });
    }

    async fn probe_and_merge(&self, target: ProbeTarget, deadline: Duration) -> bool {
        match probe::probe(self.transport.as_ref(), target, deadline).await {
            Some(response) => {
                let record = probe::identify(&self.classifier, &response);
                let _ = self.commands.send(Command::Merge(record));
                true
            }
            None => false,
        }
    }

    fn forward_services(
        &self,
        mut services: mpsc::UnboundedReceiver<ServiceEvent>,
    ) -> JoinHandle<()> {
        let ctx = self.clone();
        tokio::spawn(async move {
            while let Some(event) = services.recv().await {
                let command = match event {
                    ServiceEvent::Up {
                        name,
                        addresses,
                        port,
                    } => match listener::identify(&ctx.classifier, &name, &addresses, port) {
                        Some(record) => Command::Merge(record),
                        None => {
                            debug!(name = %name, "Ignoring non-console service");
                            continue;
                        }
                    },
                    ServiceEvent::Down { name } => Command::ServiceDown(name),
                };
                if ctx.commands.send(command).is_err() {
                    break;
                }
            }
        })
    }
}

/// One discovery session per process
pub struct DiscoverySession {
    context: ScanContext,
    listener: Arc<dyn ServiceListener>,
    notifier: Notifier,
    active: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DiscoverySession {
    /// Session over real UDP with the passive listener this host supports
    pub fn new(config: SessionConfig) -> Result<Self> {
        let listener = detect_listener(config.passive);
        Self::with_components(config, Arc::new(UdpOscTransport::new()), listener)
    }

    /// Session over an explicit transport and listener
    ///
    /// Spawns the registry actor, so this must run inside a Tokio runtime.
    pub fn with_components(
        config: SessionConfig,
        transport: Arc<dyn OscTransport>,
        listener: Arc<dyn ServiceListener>,
    ) -> Result<Self> {
        let classifier = Arc::new(Classifier::builtin()?);
        let notifier = Notifier::new(config.event_capacity);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (verified_tx, verified_rx) = mpsc::unbounded_channel();

        let actor = RegistryActor {
            registry: Registry::new(),
            notifier: notifier.clone(),
            transport: transport.clone(),
            verify_timeout: config.verify_timeout(),
            verified_tx,
        };
        tokio::spawn(actor.run(commands_rx, verified_rx));

        info!(
            listener = listener.name(),
            passive = listener.is_available(),
            "Discovery session created"
        );

        Ok(Self {
            context: ScanContext {
                config,
                transport,
                classifier,
                commands: commands_tx,
            },
            listener,
            notifier,
            active: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.context.config
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Whether passive advertisement listening is running alongside probing
    pub fn passive_available(&self) -> bool {
        self.listener.is_available()
    }

    /// Begin periodic scanning and passive listening; no-op when active
    pub async fn start(&self) {
        let mut tasks = self.tasks.lock().await;
        if self.active.swap(true, Ordering::SeqCst) {
            debug!("Discovery already active");
            return;
        }

        let (services_tx, services_rx) = mpsc::unbounded_channel();
        let service_type = &self.context.config.service_type;
        if let Err(e) = self.listener.subscribe(service_type, services_tx).await {
            warn!(error = %e, "Passive discovery unavailable, continuing with probing only");
        }
        tasks.push(self.context.forward_services(services_rx));

        let ctx = self.context.clone();
        let period = ctx.config.rescan_interval().max(Duration::from_secs(1));
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                ctx.scan_all().await;
            }
        }));

        info!(
            rescan_secs = period.as_secs(),
            passive = self.passive_available(),
            "Discovery started"
        );
    }

    /// Halt scanning and listening; no-op when inactive
    ///
    /// Probes already in flight are left to finish on their own.
    pub async fn stop(&self) {
        let mut tasks = self.tasks.lock().await;
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }

        self.listener.unsubscribe().await;
        for task in tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }
        info!("Discovery stopped");
    }

    /// Session tasks still running (rescan timer, service forwarder)
    pub async fn pending_tasks(&self) -> usize {
        self.tasks
            .lock()
            .await
            .iter()
            .filter(|task| !task.is_finished())
            .count()
    }

    /// Probe a single address with the manual deadline
    ///
    /// Returns whether anything answered; a responder is merged like any
    /// scan result.
    pub async fn probe_one(&self, ip: Ipv4Addr, port: u16, family: Family) -> bool {
        let deadline = self.context.config.probe_timeout(ScanMode::Manual);
        let found = self
            .context
            .probe_and_merge(ProbeTarget::new(ip, port, family), deadline)
            .await;
        info!(ip = %ip, port, found, "Manual probe finished");
        found
    }

    /// Run one scan of the configured or local subnets now
    pub async fn scan_once(&self) -> usize {
        self.context.scan_all().await
    }

    /// Run one scan of the given interfaces' subnets
    pub async fn scan_interfaces(&self, interfaces: &[LocalInterface]) -> usize {
        self.context.scan_interfaces(interfaces).await
    }

    /// Current registry entries in insertion order
    pub async fn snapshot(&self) -> Vec<DeviceRecord> {
        let (tx, rx) = oneshot::channel();
        if self.context.commands.send(Command::Snapshot(tx)).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.notifier.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::NoopListener;
    use async_trait::async_trait;
    use sessionsync_core::{Confidence, ConsoleModel, DiscoveryMethod, VerificationState};
    use sessionsync_osc::{
        query_packet, OscArg, OscMessage, QueryError, INFO_ADDRESS, XINFO_ADDRESS,
    };
    use std::collections::HashMap;
    use std::net::{IpAddr, SocketAddr};
    use tokio::sync::Semaphore;
    use tokio::time::Instant;

    /// In-memory consoles keyed by socket address and query
    #[derive(Default)]
    struct SimulatedTransport {
        replies: HashMap<(SocketAddr, &'static str), Vec<u8>>,
        gate: Option<Arc<Semaphore>>,
    }

    impl SimulatedTransport {
        /// Console answering `/xinfo` the way X32 and Wing firmware does
        fn console(mut self, addr: &str, model: &str) -> Self {
            let addr: SocketAddr = addr.parse().unwrap();
            let reply = OscMessage::new(XINFO_ADDRESS)
                .with_arg(OscArg::Str(addr.ip().to_string()))
                .with_arg(OscArg::Str(model.to_string()))
                .with_arg(OscArg::Str("4.06".to_string()))
                .encode();
            self.replies.insert((addr, XINFO_ADDRESS), reply);
            self
        }

        /// Device answering `/xinfo` with bytes that are not OSC
        fn raw_console(mut self, addr: &str, payload: &str) -> Self {
            let addr: SocketAddr = addr.parse().unwrap();
            self.replies
                .insert((addr, XINFO_ADDRESS), payload.as_bytes().to_vec());
            self
        }

        /// Answer `/info`, the query advertised consoles are confirmed with
        fn confirming(mut self, addr: SocketAddr) -> Self {
            let reply = OscMessage::new(INFO_ADDRESS)
                .with_arg(OscArg::Str("V2.07".to_string()))
                .encode();
            self.replies.insert((addr, INFO_ADDRESS), reply);
            self
        }

        /// Hold confirmation queries until the gate has permits
        fn gated(mut self, gate: Arc<Semaphore>) -> Self {
            self.gate = Some(gate);
            self
        }
    }

    #[async_trait]
    impl OscTransport for SimulatedTransport {
        async fn transceive(
            &self,
            target: SocketAddr,
            packet: &[u8],
            deadline: Duration,
        ) -> std::result::Result<Vec<u8>, QueryError> {
            // Only verification runs with the verification deadline
            if deadline == test_config().verify_timeout() {
                if let Some(gate) = &self.gate {
                    gate.acquire().await.unwrap().forget();
                }
            }
            let address = if packet == query_packet(INFO_ADDRESS).as_slice() {
                INFO_ADDRESS
            } else {
                XINFO_ADDRESS
            };
            self.replies
                .get(&(target, address))
                .cloned()
                .ok_or(QueryError::Timeout { target, deadline })
        }
    }

    /// Silent network that records when each query was sent
    #[derive(Default)]
    struct CountingTransport {
        sent: std::sync::Mutex<Vec<Instant>>,
    }

    impl CountingTransport {
        fn sent(&self) -> Vec<Instant> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OscTransport for CountingTransport {
        async fn transceive(
            &self,
            target: SocketAddr,
            _packet: &[u8],
            deadline: Duration,
        ) -> std::result::Result<Vec<u8>, QueryError> {
            self.sent.lock().unwrap().push(Instant::now());
            Err(QueryError::Timeout { target, deadline })
        }
    }

    #[derive(Default)]
    struct FakeListener {
        events: std::sync::Mutex<Option<mpsc::UnboundedSender<ServiceEvent>>>,
    }

    impl FakeListener {
        fn announce(&self, event: ServiceEvent) {
            let events = self.events.lock().unwrap();
            events.as_ref().unwrap().send(event).unwrap();
        }
    }

    #[async_trait]
    impl ServiceListener for FakeListener {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn subscribe(
            &self,
            _service_type: &str,
            events: mpsc::UnboundedSender<ServiceEvent>,
        ) -> Result<()> {
            *self.events.lock().unwrap() = Some(events);
            Ok(())
        }

        async fn unsubscribe(&self) {
            self.events.lock().unwrap().take();
        }
    }

    fn test_config() -> SessionConfig {
        SessionConfig {
            throttle_pause_ms: 1,
            // Periodic scans stay off the host's real subnets
            scan_addresses: vec![Ipv4Addr::new(192, 0, 2, 1)],
            ..SessionConfig::default()
        }
    }

    fn session(transport: SimulatedTransport) -> DiscoverySession {
        DiscoverySession::with_components(
            test_config(),
            Arc::new(transport),
            Arc::new(NoopListener),
        )
        .unwrap()
    }

    async fn next_event(rx: &mut broadcast::Receiver<DiscoveryEvent>) -> DiscoveryEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .unwrap()
    }

    async fn next_verified(rx: &mut broadcast::Receiver<DiscoveryEvent>) -> DeviceRecord {
        loop {
            if let DiscoveryEvent::DeviceUpdated(record) = next_event(rx).await {
                if record.verification == VerificationState::Verified {
                    return record;
                }
            }
        }
    }

    #[tokio::test]
    async fn test_manual_discovery_and_verification() {
        let session = session(SimulatedTransport::default().console("10.0.0.10:10023", "X32 RACK"));
        let mut events = session.subscribe();

        assert!(
            session
                .probe_one(Ipv4Addr::new(10, 0, 0, 10), 10023, Family::X32M32)
                .await
        );

        let DiscoveryEvent::DeviceDiscovered(found) = next_event(&mut events).await else {
            panic!("expected discovery event");
        };
        assert_eq!(found.id.as_str(), "X32_RACK-10.0.0.10");
        assert_eq!(found.model, ConsoleModel::X32Rack);
        assert_eq!(found.family.as_str(), "X32/M32");
        assert_eq!(found.method, DiscoveryMethod::Probed);
        assert_eq!(found.confidence, Confidence::Exact);
        assert_eq!(found.verification, VerificationState::Unverified);

        let DiscoveryEvent::DeviceUpdated(verified) = next_event(&mut events).await else {
            panic!("expected update event");
        };
        assert_eq!(verified.id, found.id);
        assert_eq!(verified.verification, VerificationState::Verified);

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].verification, VerificationState::Verified);
    }

    #[tokio::test]
    async fn test_silent_address() {
        let session = session(SimulatedTransport::default());
        assert!(
            !session
                .probe_one(Ipv4Addr::new(10, 0, 0, 11), 10023, Family::X32M32)
                .await
        );
        assert!(session.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_repeat_discovery_is_idempotent() {
        let gate = Arc::new(Semaphore::new(0));
        let transport = SimulatedTransport::default()
            .console("10.0.0.10:10023", "X32")
            .gated(gate.clone());
        let session = session(transport);
        let mut events = session.subscribe();
        let ip = Ipv4Addr::new(10, 0, 0, 10);

        assert!(session.probe_one(ip, 10023, Family::X32M32).await);
        assert!(session.probe_one(ip, 10023, Family::X32M32).await);
        assert_eq!(session.snapshot().await.len(), 1);

        assert!(matches!(
            next_event(&mut events).await,
            DiscoveryEvent::DeviceDiscovered(_)
        ));
        assert!(events.try_recv().is_err());

        // Release the single pending verification
        gate.add_permits(1);
        let DiscoveryEvent::DeviceUpdated(record) = next_event(&mut events).await else {
            panic!("expected update event");
        };
        assert_eq!(record.verification, VerificationState::Verified);

        assert_eq!(session.snapshot().await.len(), 1);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_non_osc_reply_fails_verification() {
        let transport = SimulatedTransport::default().raw_console("10.0.0.20:2222", "WING");
        let session = session(transport);
        let mut events = session.subscribe();

        assert!(
            session
                .probe_one(Ipv4Addr::new(10, 0, 0, 20), 2222, Family::Wing)
                .await
        );
        next_event(&mut events).await;

        let DiscoveryEvent::DeviceUpdated(record) = next_event(&mut events).await else {
            panic!("expected update event");
        };
        assert_eq!(record.model, ConsoleModel::Wing);
        assert_eq!(record.verification, VerificationState::Failed);
        assert!(record.error.unwrap().starts_with("Invalid response"));
    }

    #[tokio::test]
    async fn test_family_guess_is_flagged() {
        let transport = SimulatedTransport::default().console("10.0.0.21:2222", "ngc-console");
        let session = session(transport);
        let mut events = session.subscribe();

        assert!(
            session
                .probe_one(Ipv4Addr::new(10, 0, 0, 21), 2222, Family::Wing)
                .await
        );
        let DiscoveryEvent::DeviceDiscovered(found) = next_event(&mut events).await else {
            panic!("expected discovery event");
        };
        assert_eq!(found.model, ConsoleModel::Wing);
        assert_eq!(found.confidence, Confidence::FamilyDefault);
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let session = session(SimulatedTransport::default());

        // Stop before start is safe
        session.stop().await;
        assert!(!session.is_active());

        session.start().await;
        session.start().await;
        assert!(session.is_active());
        assert!(session.pending_tasks().await >= 1);

        session.stop().await;
        assert!(!session.is_active());
        assert_eq!(session.pending_tasks().await, 0);

        session.stop().await;
        assert!(!session.is_active());
        assert_eq!(session.pending_tasks().await, 0);
    }

    #[tokio::test]
    async fn test_degraded_mode() {
        let session = session(SimulatedTransport::default());
        assert!(!session.passive_available());
        session.start().await;
        assert!(session.is_active());
        session.stop().await;
    }

    #[tokio::test]
    async fn test_advertised_service_up_and_down() {
        let addr: SocketAddr = "10.0.0.30:10023".parse().unwrap();
        let transport = SimulatedTransport::default().confirming(addr);
        let listener = Arc::new(FakeListener::default());
        let session =
            DiscoverySession::with_components(test_config(), Arc::new(transport), listener.clone())
                .unwrap();
        let mut events = session.subscribe();

        session.start().await;
        assert!(session.passive_available());

        listener.announce(ServiceEvent::Up {
            name: "Printer".to_string(),
            addresses: vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 40))],
            port: 631,
        });
        listener.announce(ServiceEvent::Up {
            name: "X32 FOH".to_string(),
            addresses: vec![addr.ip()],
            port: 10023,
        });

        let DiscoveryEvent::DeviceDiscovered(found) = next_event(&mut events).await else {
            panic!("expected discovery event");
        };
        assert_eq!(found.id.as_str(), "X32-10.0.0.30");
        assert_eq!(found.name, "X32 FOH");
        assert_eq!(found.method, DiscoveryMethod::Advertised);

        let DiscoveryEvent::DeviceUpdated(verified) = next_event(&mut events).await else {
            panic!("expected update event");
        };
        assert_eq!(verified.verification, VerificationState::Verified);

        listener.announce(ServiceEvent::Down {
            name: "X32 FOH".to_string(),
        });
        let DiscoveryEvent::DeviceRemoved(removed) = next_event(&mut events).await else {
            panic!("expected removal event");
        };
        assert_eq!(removed.id, found.id);
        assert!(session.snapshot().await.is_empty());

        session.stop().await;
    }

    #[tokio::test]
    async fn test_advertised_entry_survives_scan() {
        let addr: SocketAddr = "10.0.0.30:10023".parse().unwrap();
        let transport = SimulatedTransport::default()
            .console("10.0.0.30:10023", "X32")
            .confirming(addr);
        let listener = Arc::new(FakeListener::default());
        let session =
            DiscoverySession::with_components(test_config(), Arc::new(transport), listener.clone())
                .unwrap();
        let mut events = session.subscribe();
        session.start().await;

        listener.announce(ServiceEvent::Up {
            name: "X32 FOH".to_string(),
            addresses: vec![addr.ip()],
            port: 10023,
        });
        let DiscoveryEvent::DeviceDiscovered(found) = next_event(&mut events).await else {
            panic!("expected discovery event");
        };
        next_verified(&mut events).await;

        // The same console also answers a scan
        assert!(
            session
                .probe_one(Ipv4Addr::new(10, 0, 0, 30), 10023, Family::X32M32)
                .await
        );
        let reverified = next_verified(&mut events).await;
        assert_eq!(reverified.id, found.id);

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "X32 FOH");
        assert_eq!(snapshot[0].method, DiscoveryMethod::Advertised);

        listener.announce(ServiceEvent::Down {
            name: "X32 FOH".to_string(),
        });
        let DiscoveryEvent::DeviceRemoved(removed) = next_event(&mut events).await else {
            panic!("expected removal event");
        };
        assert_eq!(removed.id, found.id);
        assert!(session.snapshot().await.is_empty());

        session.stop().await;
    }

    #[tokio::test]
    async fn test_scan_interfaces() {
        let transport = SimulatedTransport::default()
            .console("10.0.0.10:10023", "X32 RACK")
            .console("10.0.0.200:2222", "WING COMPACT");
        let session = session(transport);
        let mut events = session.subscribe();

        let interfaces = vec![
            LocalInterface::new("eth0", Ipv4Addr::new(10, 0, 0, 5), None),
            LocalInterface::new("eth0:1", Ipv4Addr::new(10, 0, 0, 6), None),
        ];
        // One subnet, 253 candidates, two ports each
        assert_eq!(session.scan_interfaces(&interfaces).await, 506);

        for _ in 0..2 {
            next_verified(&mut events).await;
        }

        let mut ids: Vec<String> = session
            .snapshot()
            .await
            .into_iter()
            .map(|d| d.id.0)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["WING_COMPACT-10.0.0.200", "X32_RACK-10.0.0.10"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_pauses_between_batches() {
        let transport = Arc::new(CountingTransport::default());
        let config = SessionConfig::default();
        let session = DiscoverySession::with_components(
            config.clone(),
            transport.clone(),
            Arc::new(NoopListener),
        )
        .unwrap();
        let interfaces = vec![LocalInterface::new("eth0", Ipv4Addr::new(10, 0, 0, 5), None)];

        let start = Instant::now();
        assert_eq!(session.scan_interfaces(&interfaces).await, 506);
        // Let the last batch of detached queries run
        tokio::time::sleep(Duration::from_millis(1)).await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 506);

        // Queries launched at the same instant form one batch
        let mut batches: Vec<(Instant, usize)> = Vec::new();
        for at in sent {
            match batches.last_mut() {
                Some((instant, count)) if *instant == at => *count += 1,
                _ => batches.push((at, 1)),
            }
        }

        let per_batch = config.throttle_every * config.probe_ports().len();
        assert_eq!(batches.len(), 26);
        assert_eq!(batches[0].0, start);
        assert!(batches.iter().all(|(_, count)| *count <= per_batch));
        assert_eq!(batches[0].1, per_batch);
        assert_eq!(batches[25].1, 6);
        for pair in batches.windows(2) {
            assert!(pair[1].0 - pair[0].0 >= config.throttle_pause());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescan_runs_on_interval() {
        let transport = Arc::new(CountingTransport::default());
        let config = SessionConfig {
            scan_addresses: vec![Ipv4Addr::new(10, 0, 0, 5)],
            ..SessionConfig::default()
        };
        let session =
            DiscoverySession::with_components(config, transport.clone(), Arc::new(NoopListener))
                .unwrap();

        session.start().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(transport.sent().len(), 506);

        // Next tick at 30s; the scan takes about 2.5s of throttle pauses
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(transport.sent().len(), 1012);

        session.stop().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.sent().len(), 1012);
    }
}
