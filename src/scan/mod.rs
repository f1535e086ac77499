//! Scan orchestrator.
//!
//! ```text
//!          start()              on_scan_failed() [retry available]
//!   Idle ──────────▶ Scanning ─────────────────────────────▶ Retrying
//!    ▲                 │  │                                    │
//!    │      stop()     │  │ on_scan_failed() [retry spent]     │ delay elapsed:
//!    └─────────────────┘  ▼                                    │ stop, clear, start
//!                      Stopped(err) ◀── start failed ──────────┘
//! ```
//!
//! Advertisements are accepted only while `Scanning`. Each one is filtered
//! on the announcement marker, decoded (service data plus every
//! manufacturer payload), and merged into the registry.
//!
//! The single automatic restart is tracked by [`RetryBudget`]: spent by
//! the first failure, restored by the next accepted advertisement. A
//! `stop()` during the retry delay wins and the restart is abandoned.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};

use crate::app::events::BroadcastEvent;
use crate::app::ports::{AuthorizationPort, Capability, Delay, EventSink, ScanFilter, ScannerPort};
use crate::codec::{BroadcastInfo, decode_broadcast_info};
use crate::config::AuracastConfig;
use crate::error::ScanError;
use crate::protocol::PeerAddress;
use crate::registry::{BroadcastDevice, DeviceRegistry};

// ───────────────────────────────────────────────────────────────
// State
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    /// Waiting out the delay before the automatic restart.
    Retrying,
    /// Terminal for this scanning session; `start()` begins a new one.
    Stopped(ScanError),
}

impl ScanState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Scanning | Self::Retrying)
    }
}

/// One automatic restart per scanning session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryBudget {
    Available,
    Spent,
}

struct Inner {
    state: ScanState,
    budget: RetryBudget,
    /// Bumped by every start/stop; a pending restart checks it.
    epoch: u64,
}

// ───────────────────────────────────────────────────────────────
// Advertisement input
// ───────────────────────────────────────────────────────────────

/// One advertisement as delivered by the radio stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvertisementReport {
    pub address: PeerAddress,
    pub name: Option<String>,
    pub rssi: i16,
    /// Advertised service identifiers (full form).
    pub service_uuids: Vec<u128>,
    /// Service data keyed by service identifier.
    pub service_data: Vec<(u128, Vec<u8>)>,
    /// Manufacturer-specific data keyed by company id.
    pub manufacturer_data: Vec<(u16, Vec<u8>)>,
}

impl AdvertisementReport {
    pub fn carries_service(&self, uuid: u128) -> bool {
        self.service_uuids.contains(&uuid) || self.service_data.iter().any(|(u, _)| *u == uuid)
    }

    pub fn service_payload(&self, uuid: u128) -> Option<&[u8]> {
        self.service_data
            .iter()
            .find(|(u, _)| *u == uuid)
            .map(|(_, data)| data.as_slice())
    }

    /// Decode the service payload and every manufacturer payload into one
    /// result.
    pub fn decode(&self, service_uuid: u128) -> BroadcastInfo {
        let mut info = self
            .service_payload(service_uuid)
            .map(decode_broadcast_info)
            .unwrap_or_default();
        for (_, payload) in &self.manufacturer_data {
            info.absorb(decode_broadcast_info(payload));
        }
        info
    }
}

// ───────────────────────────────────────────────────────────────
// ScanOrchestrator
// ───────────────────────────────────────────────────────────────

pub struct ScanOrchestrator<S, D, A, E> {
    scanner: S,
    delay: D,
    auth: Arc<A>,
    sink: Arc<E>,
    registry: Arc<DeviceRegistry>,
    filter: ScanFilter,
    retry_delay: Duration,
    redacted_name: String,
    inner: Mutex<Inner>,
}

impl<S, D, A, E> ScanOrchestrator<S, D, A, E>
where
    S: ScannerPort,
    D: Delay,
    A: AuthorizationPort,
    E: EventSink,
{
    pub fn new(
        scanner: S,
        delay: D,
        auth: Arc<A>,
        sink: Arc<E>,
        registry: Arc<DeviceRegistry>,
        config: &AuracastConfig,
    ) -> Self {
        Self {
            scanner,
            delay,
            auth,
            sink,
            registry,
            filter: ScanFilter {
                service_uuid: config.announcement_uuid(),
            },
            retry_delay: config.scan_retry_delay(),
            redacted_name: config.redacted_name.clone(),
            inner: Mutex::new(Inner {
                state: ScanState::Idle,
                budget: RetryBudget::Available,
                epoch: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `to` and return the event to publish once the guard is gone.
    fn transition(inner: &mut Inner, to: ScanState) -> Option<BroadcastEvent> {
        let from = inner.state;
        if from == to {
            return None;
        }
        inner.state = to;
        info!("scan: {:?} -> {:?}", from, to);
        Some(BroadcastEvent::ScanStateChanged { from, to })
    }

    fn publish(&self, event: Option<BroadcastEvent>) {
        if let Some(event) = event {
            self.sink.emit(&event);
        }
    }

    pub fn state(&self) -> ScanState {
        self.lock().state
    }

    pub fn retry_budget(&self) -> RetryBudget {
        self.lock().budget
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Begin filtered observation. No-op while already scanning.
    pub fn start(&self) -> Result<(), ScanError> {
        let epoch = {
            let mut inner = self.lock();
            if inner.state.is_active() {
                debug!("scan: start ignored, already {:?}", inner.state);
                return Ok(());
            }
            inner.epoch += 1;
            inner.budget = RetryBudget::Available;
            inner.epoch
        };
        let next = self.begin();
        match self.settle(epoch, next) {
            ScanState::Stopped(e) => Err(e),
            _ => Ok(()),
        }
    }

    /// Cancel observation and any pending restart. Idempotent.
    pub fn stop(&self) {
        let (was_active, change) = {
            let mut inner = self.lock();
            inner.epoch += 1;
            let was_active = inner.state.is_active();
            (was_active, Self::transition(&mut inner, ScanState::Idle))
        };
        if was_active {
            self.scanner.stop_scan();
        }
        self.publish(change);
    }

    /// Ask the radio to start; returns the state to move to.
    fn begin(&self) -> ScanState {
        if !self.auth.is_granted(Capability::Scan) {
            warn!("scan: capability not granted");
            return ScanState::Stopped(ScanError::Unauthorized);
        }
        match self.scanner.start_scan(&self.filter) {
            Ok(()) => ScanState::Scanning,
            Err(e) => {
                warn!("scan: start failed: {}", e);
                ScanState::Stopped(e)
            }
        }
    }

    /// Record the outcome of [`begin`](Self::begin) unless a `stop()` ran
    /// in the meantime, in which case the radio is stopped again.
    fn settle(&self, epoch: u64, next: ScanState) -> ScanState {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            let current = inner.state;
            drop(inner);
            debug!("scan: start overtaken, staying {:?}", current);
            if next == ScanState::Scanning {
                self.scanner.stop_scan();
            }
            return current;
        }
        let change = Self::transition(&mut inner, next);
        drop(inner);
        self.publish(change);
        next
    }

    // ── Radio callbacks ───────────────────────────────────────

    /// Merge one advertisement. Returns the updated record, or `None` when
    /// the report was dropped (not scanning, or no announcement marker).
    pub fn on_advertisement(&self, report: &AdvertisementReport) -> Option<BroadcastDevice> {
        {
            let mut inner = self.lock();
            if inner.state != ScanState::Scanning {
                return None;
            }
            if !report.carries_service(self.filter.service_uuid) {
                debug!("scan: {} dropped, no announcement marker", report.address);
                return None;
            }
            inner.budget = RetryBudget::Available;
        }

        let info = report.decode(self.filter.service_uuid);
        let name = if self.auth.is_granted(Capability::NameDisclosure) {
            report.name.as_deref()
        } else {
            Some(self.redacted_name.as_str())
        };

        let before = self.registry.version();
        let device = self.registry.observe(report.address, name, report.rssi, &info);
        if self.registry.version() != before {
            self.sink.emit(&BroadcastEvent::DeviceUpdated {
                address: device.address,
                rssi: device.rssi,
                channels: device.bis_channels.len(),
            });
        }
        Some(device)
    }

    /// Handle an internal scan failure. Resolves once the retry (if any)
    /// has run, returning the resulting state.
    pub async fn on_scan_failed(&self, code: i32) -> ScanState {
        let (epoch, change) = {
            let mut inner = self.lock();
            if inner.state != ScanState::Scanning {
                debug!("scan: failure {} ignored in {:?}", code, inner.state);
                return inner.state;
            }
            let budget = inner.budget;
            match budget {
                RetryBudget::Available => {
                    warn!("scan: failed (code {}), restarting in {:?}", code, self.retry_delay);
                    inner.budget = RetryBudget::Spent;
                    let change = Self::transition(&mut inner, ScanState::Retrying);
                    (inner.epoch, change)
                }
                RetryBudget::Spent => {
                    warn!("scan: failed again (code {}), giving up", code);
                    let stopped = ScanState::Stopped(ScanError::Internal(code));
                    let change = Self::transition(&mut inner, stopped);
                    drop(inner);
                    self.scanner.stop_scan();
                    self.publish(change);
                    return stopped;
                }
            }
        };
        self.publish(change);

        self.delay.sleep(self.retry_delay).await;

        {
            let inner = self.lock();
            if inner.epoch != epoch || inner.state != ScanState::Retrying {
                debug!("scan: restart abandoned");
                return inner.state;
            }
        }
        self.scanner.stop_scan();
        self.registry.reset();
        self.sink.emit(&BroadcastEvent::DevicesCleared);
        let next = self.begin();
        self.settle(epoch, next)
    }
}
