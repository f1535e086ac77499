//! Per-peer session record.
//!
//! ```text
//! Disconnected ─▶ Connecting ─▶ DiscoveringServices ─▶ Ready ◀─▶ Writing
//!      ▲              │                 │                 │          │
//!      └──────────────┴─────────────────┴─────────────────┴──────────┘
//!                  failure / link drop / close
//! ```
//!
//! Any state other than `Ready` at the start of a delivery means the
//! previous delivery never finished (its future was dropped or the link
//! fell over); the session is rebuilt from scratch.

use std::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;

use crate::app::ports::GattService;
use crate::error::DeliveryError;
use crate::protocol::PeerAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    DiscoveringServices,
    Ready,
    Writing,
}

#[derive(Debug)]
pub struct PeerSession {
    address: PeerAddress,
    pub(super) state: SessionState,
    services: Vec<GattService>,
    /// Successful writes over the lifetime of this link.
    pub(super) writes: u32,
}

impl PeerSession {
    pub fn new(address: PeerAddress) -> Self {
        Self {
            address,
            state: SessionState::Disconnected,
            services: Vec::new(),
            writes: 0,
        }
    }

    pub fn address(&self) -> PeerAddress {
        self.address
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn writes(&self) -> u32 {
        self.writes
    }

    pub(super) fn set_services(&mut self, services: Vec<GattService>) {
        self.services = services;
        self.state = SessionState::Ready;
    }

    /// Forget the link and everything discovered on it.
    pub(super) fn reset(&mut self) {
        self.state = SessionState::Disconnected;
        self.services.clear();
    }

    /// Check that `service` exposes `characteristic`.
    pub fn resolve(&self, service: u128, characteristic: u128) -> Result<(), DeliveryError> {
        let svc = self
            .services
            .iter()
            .find(|s| s.uuid == service)
            .ok_or(DeliveryError::ServiceNotFound(service))?;
        if svc.has_characteristic(characteristic) {
            Ok(())
        } else {
            Err(DeliveryError::CharacteristicNotFound(characteristic))
        }
    }
}

/// Map entry: the session behind its per-address lock, plus a closed flag
/// readable without taking the lock.
///
/// A closed slot stays in the map until whoever next holds its lock has
/// torn the link down, so no second session for the same address can
/// start while the old one is still live.
pub(super) struct SessionSlot {
    closed: AtomicBool,
    retired: AtomicBool,
    pub(super) session: Mutex<CriticalSectionRawMutex, PeerSession>,
}

impl SessionSlot {
    pub(super) fn new(address: PeerAddress) -> Self {
        Self {
            closed: AtomicBool::new(false),
            retired: AtomicBool::new(false),
            session: Mutex::new(PeerSession::new(address)),
        }
    }

    /// Claim the teardown. Only the first caller gets `true`; callers hold
    /// the session lock.
    pub(super) fn retire(&self) -> bool {
        !self.retired.swap(true, Ordering::AcqRel)
    }

    /// Returns `true` if this call closed the slot.
    pub(super) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub(super) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
