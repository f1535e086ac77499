//! Port traits: the hexagonal boundary between the protocol core and the
//! radio stack.
//!
//! ```text
//!   radio adapter ──▶ Port trait ──▶ ScanOrchestrator / SessionManager
//! ```
//!
//! Driven adapters (scanner, GATT client, capability check, event sink,
//! timer) implement these traits. The core consumes them via generics, so
//! it never touches a platform radio API directly and every path can be
//! exercised with mock adapters.
//!
//! Async ports return non-`Send` futures; they are driven by a
//! single-threaded cooperative executor.

#![allow(async_fn_in_trait)]

use std::time::Duration;

use crate::error::{GattError, ScanError};
use crate::protocol::PeerAddress;

// ───────────────────────────────────────────────────────────────
// Scanner port (driven adapter: domain → radio)
// ───────────────────────────────────────────────────────────────

/// Hardware-level advertisement filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanFilter {
    /// Full 128-bit service identifier an advertisement must carry.
    pub service_uuid: u128,
}

/// Starts and stops filtered observation. Results flow back through
/// [`BroadcastService::on_advertisement`](super::service::BroadcastService::on_advertisement).
pub trait ScannerPort {
    fn start_scan(&self, filter: &ScanFilter) -> Result<(), ScanError>;

    /// Idempotent.
    fn stop_scan(&self);
}

// ───────────────────────────────────────────────────────────────
// GATT client port (driven adapter: domain ↔ remote peer)
// ───────────────────────────────────────────────────────────────

/// One discovered service and the characteristics it exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: u128,
    pub characteristics: Vec<u128>,
}

impl GattService {
    pub fn has_characteristic(&self, uuid: u128) -> bool {
        self.characteristics.contains(&uuid)
    }
}

/// How far a write got before the adapter returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAck {
    /// The peer acknowledged the write.
    Confirmed,
    /// Queued for transmission; no acknowledgement will follow.
    Accepted,
}

/// Connection-oriented client keyed by peer address.
///
/// Every method suspends until the matching stack callback arrives
/// (connected, discovery complete, write complete) or fails.
pub trait GattPort {
    async fn connect(&self, address: PeerAddress) -> Result<(), GattError>;

    async fn discover_services(&self, address: PeerAddress) -> Result<Vec<GattService>, GattError>;

    async fn write(
        &self,
        address: PeerAddress,
        service: u128,
        characteristic: u128,
        value: &[u8],
    ) -> Result<WriteAck, GattError>;

    async fn read(
        &self,
        address: PeerAddress,
        service: u128,
        characteristic: u128,
    ) -> Result<Vec<u8>, GattError>;

    /// Tear the link down. Never fails.
    async fn disconnect(&self, address: PeerAddress);
}

// ───────────────────────────────────────────────────────────────
// Authorization port (environment → domain)
// ───────────────────────────────────────────────────────────────

/// Radio capabilities the environment may withhold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Observe advertisements.
    Scan,
    /// Open connections to peers.
    Connect,
    /// Show advertised device names.
    NameDisclosure,
}

/// Opaque capability check, consulted before every radio operation.
pub trait AuthorizationPort {
    fn is_granted(&self, capability: Capability) -> bool;
}

impl<F> AuthorizationPort for F
where
    F: Fn(Capability) -> bool,
{
    fn is_granted(&self, capability: Capability) -> bool {
        self(capability)
    }
}

/// Fixed capability set, for tools and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticGrants {
    pub scan: bool,
    pub connect: bool,
    pub name_disclosure: bool,
}

impl StaticGrants {
    pub const ALL: Self = Self {
        scan: true,
        connect: true,
        name_disclosure: true,
    };
    pub const NONE: Self = Self {
        scan: false,
        connect: false,
        name_disclosure: false,
    };
}

impl AuthorizationPort for StaticGrants {
    fn is_granted(&self, capability: Capability) -> bool {
        match capability {
            Capability::Scan => self.scan,
            Capability::Connect => self.connect,
            Capability::NameDisclosure => self.name_disclosure,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / UI bridge)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`BroadcastEvent`](super::events::BroadcastEvent)s
/// through this port. Takes `&self`: the core is shared between the
/// observation and delivery paths.
pub trait EventSink {
    fn emit(&self, event: &super::events::BroadcastEvent);
}

// ───────────────────────────────────────────────────────────────
// Delay port (driven adapter: domain → timer)
// ───────────────────────────────────────────────────────────────

pub trait Delay {
    async fn sleep(&self, duration: Duration);
}
