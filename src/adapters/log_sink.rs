//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing each [`BroadcastEvent`] as one
//! terse line through the `log` facade. A UI bridge would implement the
//! same trait.

use log::{Level, log};

use crate::app::events::BroadcastEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`BroadcastEvent`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

/// Level and line an event is logged with.
pub fn describe(event: &BroadcastEvent) -> (Level, String) {
    match event {
        BroadcastEvent::ScanStateChanged { from, to } => {
            (Level::Info, format!("SCAN | {:?} -> {:?}", from, to))
        }
        BroadcastEvent::DeviceUpdated {
            address,
            rssi,
            channels,
        } => (
            Level::Debug,
            format!("DEVICE | {} rssi={}dBm channels={}", address, rssi, channels),
        ),
        BroadcastEvent::DevicesCleared => (Level::Info, "DEVICE | list cleared".to_string()),
        BroadcastEvent::SelectionApplied { address, indexes } => {
            (Level::Info, format!("SELECT | {} applied {:?}", address, indexes))
        }
        BroadcastEvent::SelectionRejected { address, reason } => {
            (Level::Warn, format!("SELECT | {} rejected: {}", address, reason))
        }
        BroadcastEvent::SessionClosed(address) => {
            (Level::Info, format!("SESSION | {} closed", address))
        }
    }
}

impl EventSink for LogEventSink {
    fn emit(&self, event: &BroadcastEvent) {
        let (level, line) = describe(event);
        log!(level, "{}", line);
    }
}
