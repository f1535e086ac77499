//! Broadcast service: the caller-facing facade.
//!
//! [`BroadcastService`] wires the registry, scan orchestrator, session
//! manager and selection policy together over one set of adapters. The
//! orchestration layer above it (UI, lifecycle owner) talks only to this
//! type; the radio stack feeds it through the `on_*` callbacks.
//!
//! ```text
//!  ScannerPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                  │       BroadcastService        │
//!     GattPort ◀──▶│ Scan · Registry · Selection   │──▶ DeviceList
//!                  └──────────────────────────────┘
//! ```

use std::sync::Arc;

use log::info;

use crate::codec::receive_state::{ReceiveState, decode_receive_state};
use crate::config::AuracastConfig;
use crate::error::{RefreshError, ScanError};
use crate::protocol::PeerAddress;
use crate::registry::{BroadcastDevice, DeviceList, DeviceRegistry};
use crate::scan::{AdvertisementReport, ScanOrchestrator, ScanState};
use crate::selection::{SelectionOutcome, SelectionPolicy};
use crate::transport::SessionManager;

use super::events::BroadcastEvent;
use super::ports::{AuthorizationPort, Delay, EventSink, GattPort, ScannerPort};

pub struct BroadcastService<S, D, G, A, E> {
    config: AuracastConfig,
    registry: Arc<DeviceRegistry>,
    scan: ScanOrchestrator<S, D, A, E>,
    transport: Arc<SessionManager<G, A, E>>,
    selection: SelectionPolicy<G, A, E>,
    sink: Arc<E>,
}

impl<S, D, G, A, E> BroadcastService<S, D, G, A, E>
where
    S: ScannerPort,
    D: Delay,
    G: GattPort,
    A: AuthorizationPort,
    E: EventSink,
{
    pub fn new(
        config: AuracastConfig,
        scanner: S,
        delay: D,
        gatt: G,
        auth: A,
        sink: E,
    ) -> Self {
        let auth = Arc::new(auth);
        let sink = Arc::new(sink);
        let registry = Arc::new(DeviceRegistry::new());
        let scan = ScanOrchestrator::new(
            scanner,
            delay,
            Arc::clone(&auth),
            Arc::clone(&sink),
            Arc::clone(&registry),
            &config,
        );
        let transport = Arc::new(SessionManager::new(
            gatt,
            Arc::clone(&auth),
            Arc::clone(&sink),
            &config,
        ));
        let selection = SelectionPolicy::new(
            Arc::clone(&transport),
            Arc::clone(&registry),
            Arc::clone(&sink),
        );
        Self {
            config,
            registry,
            scan,
            transport,
            selection,
            sink,
        }
    }

    pub fn config(&self) -> &AuracastConfig {
        &self.config
    }

    pub fn transport(&self) -> &SessionManager<G, A, E> {
        &self.transport
    }

    // ── Scanning ──────────────────────────────────────────────

    pub fn start_scan(&self) -> Result<(), ScanError> {
        self.scan.start()
    }

    /// Stops observation only; in-flight deliveries carry on.
    pub fn stop_scan(&self) {
        self.scan.stop();
    }

    pub fn scan_state(&self) -> ScanState {
        self.scan.state()
    }

    pub fn reset_devices(&self) {
        self.registry.reset();
        self.sink.emit(&BroadcastEvent::DevicesCleared);
    }

    // ── Device list ───────────────────────────────────────────

    pub fn device_list(&self) -> DeviceList {
        self.registry.device_list()
    }

    pub fn device(&self, address: &PeerAddress) -> Option<BroadcastDevice> {
        self.registry.get(address)
    }

    pub fn set_source_id(&self, address: &PeerAddress, source_id: u8) -> Option<BroadcastDevice> {
        self.registry.set_source_id(address, source_id)
    }

    pub fn set_broadcast_code(&self, address: &PeerAddress, code: &[u8]) -> Option<BroadcastDevice> {
        self.registry.set_broadcast_code(address, code)
    }

    // ── Selection ─────────────────────────────────────────────

    pub async fn select_channels(
        &self,
        device: &BroadcastDevice,
        indexes: &[u8],
    ) -> SelectionOutcome {
        self.selection.select_channels(device, indexes).await
    }

    /// Read the delegator's receive state and fold it into the registry.
    /// `Ok(None)` when the delegator has no source registered.
    pub async fn refresh_source(
        &self,
        address: PeerAddress,
    ) -> Result<Option<ReceiveState>, RefreshError> {
        let value = self
            .transport
            .read(
                address,
                self.config.control_service_uuid(),
                self.config.receive_state_uuid(),
            )
            .await?;
        let Some(state) = decode_receive_state(&value)? else {
            info!("service: {} reports no registered source", address);
            return Ok(None);
        };
        info!(
            "service: {} source {} synced {:?}",
            address,
            state.source_id,
            state.synced_indexes()
        );
        self.registry.apply_receive_state(&address, &state);
        Ok(Some(state))
    }

    // ── Radio callbacks ───────────────────────────────────────

    pub fn on_advertisement(&self, report: &AdvertisementReport) -> Option<BroadcastDevice> {
        self.scan.on_advertisement(report)
    }

    pub async fn on_scan_failed(&self, code: i32) -> ScanState {
        self.scan.on_scan_failed(code).await
    }

    // ── Teardown ──────────────────────────────────────────────

    pub async fn close_session(&self, address: PeerAddress) -> bool {
        self.transport.close(address).await
    }

    /// Stop scanning and close every session.
    pub async fn shutdown(&self) {
        self.scan.stop();
        self.transport.close_all().await;
    }
}
