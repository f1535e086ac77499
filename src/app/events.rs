//! Outbound events.
//!
//! The core emits these through the [`EventSink`](super::ports::EventSink)
//! port. Adapters on the other side decide where they go: a log line, a UI
//! bridge, a test recorder.

use crate::protocol::PeerAddress;
use crate::scan::ScanState;

/// Structured events emitted by the protocol core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastEvent {
    /// The scan orchestrator moved between states.
    ScanStateChanged { from: ScanState, to: ScanState },

    /// An observation changed a registry record.
    DeviceUpdated { address: PeerAddress, rssi: i16, channels: usize },

    /// The registry was cleared (caller reset or scan restart).
    DevicesCleared,

    /// A selection was delivered and recorded.
    SelectionApplied { address: PeerAddress, indexes: Vec<u8> },

    /// A selection failed; the string is the human-readable reason.
    SelectionRejected { address: PeerAddress, reason: String },

    /// A peer session was torn down.
    SessionClosed(PeerAddress),
}
