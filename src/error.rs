//! Typed error enums for every fallible subsystem.
//!
//! Each layer reports through its own enum so callers can match on the
//! exact failure class: terminal (authorization, missing peer or GATT
//! entity), transient (connection drop, write rejection, scan failure),
//! or cancellation. Decode anomalies are deliberately absent: the
//! advertisement decoder degrades to a partial result instead.

use core::fmt;

// ---------------------------------------------------------------------------
// Scan errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanError {
    /// The radio capability was not granted.
    Unauthorized,
    /// The radio refused to start a filtered scan.
    StartFailed(i32),
    /// The radio reported an internal failure while scanning.
    Internal(i32),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "scan not authorized"),
            Self::StartFailed(code) => write!(f, "scan start failed (code {code})"),
            Self::Internal(code) => write!(f, "scan failed internally (code {code})"),
        }
    }
}

impl std::error::Error for ScanError {}

// ---------------------------------------------------------------------------
// GATT adapter errors
// ---------------------------------------------------------------------------

/// Failures reported by a [`GattPort`](crate::app::ports::GattPort) adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattError {
    /// The radio capability was not granted.
    Unauthorized,
    /// The address could not be resolved to a remote device.
    PeerNotFound,
    /// The link could not be established.
    ConnectionFailed,
    /// The link dropped while an operation was pending.
    Disconnected,
    /// Service discovery did not complete.
    DiscoveryFailed,
    /// The peer or the local stack rejected the write.
    WriteRejected(u8),
    /// The characteristic read did not complete.
    ReadFailed(u8),
}

impl fmt::Display for GattError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "radio not authorized"),
            Self::PeerNotFound => write!(f, "peer address not resolvable"),
            Self::ConnectionFailed => write!(f, "connection failed"),
            Self::Disconnected => write!(f, "link disconnected"),
            Self::DiscoveryFailed => write!(f, "service discovery failed"),
            Self::WriteRejected(status) => write!(f, "write rejected (status 0x{status:02X})"),
            Self::ReadFailed(status) => write!(f, "read failed (status 0x{status:02X})"),
        }
    }
}

impl std::error::Error for GattError {}

// ---------------------------------------------------------------------------
// Delivery errors
// ---------------------------------------------------------------------------

/// Outcome classes of a single [`SessionManager`](crate::transport::SessionManager)
/// delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// Terminal: the radio capability was not granted.
    Unauthorized,
    /// Terminal: the peer address could not be resolved.
    PeerNotFound,
    /// Terminal: the peer does not expose the control service.
    ServiceNotFound(u128),
    /// Terminal: the control service lacks the target characteristic.
    CharacteristicNotFound(u128),
    /// The link could not be established.
    ConnectFailed(GattError),
    /// Service discovery did not complete.
    DiscoveryFailed(GattError),
    /// Every write attempt failed.
    WriteFailed { attempts: u8, last: GattError },
    /// A characteristic read failed.
    ReadFailed(GattError),
    /// The session was closed while this delivery was queued.
    SessionClosed,
    /// The command frame was empty (encoder fallback).
    EmptyCommand,
}

impl DeliveryError {
    /// Terminal failures are never retried.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized
                | Self::PeerNotFound
                | Self::ServiceNotFound(_)
                | Self::CharacteristicNotFound(_)
                | Self::EmptyCommand
        )
    }
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "radio not authorized"),
            Self::PeerNotFound => write!(f, "peer address not resolvable"),
            Self::ServiceNotFound(uuid) => {
                write!(f, "service {} not found", crate::protocol::format_uuid(*uuid))
            }
            Self::CharacteristicNotFound(uuid) => write!(
                f,
                "characteristic {} not found",
                crate::protocol::format_uuid(*uuid)
            ),
            Self::ConnectFailed(e) => write!(f, "connect: {e}"),
            Self::DiscoveryFailed(e) => write!(f, "discovery: {e}"),
            Self::WriteFailed { attempts, last } => {
                write!(f, "write failed after {attempts} attempt(s): {last}")
            }
            Self::ReadFailed(e) => write!(f, "read: {e}"),
            Self::SessionClosed => write!(f, "session closed"),
            Self::EmptyCommand => write!(f, "empty command frame"),
        }
    }
}

impl std::error::Error for DeliveryError {}

// ---------------------------------------------------------------------------
// Receive-state decode errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveStateError {
    /// The value ended before a mandatory field.
    Truncated,
}

impl fmt::Display for ReceiveStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "receive state truncated"),
        }
    }
}

impl std::error::Error for ReceiveStateError {}

/// Failure to refresh a source from its receive state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshError {
    Delivery(DeliveryError),
    Decode(ReceiveStateError),
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivery(e) => write!(f, "receive state read: {e}"),
            Self::Decode(e) => write!(f, "receive state decode: {e}"),
        }
    }
}

impl std::error::Error for RefreshError {}

impl From<DeliveryError> for RefreshError {
    fn from(e: DeliveryError) -> Self {
        Self::Delivery(e)
    }
}

impl From<ReceiveStateError> for RefreshError {
    fn from(e: ReceiveStateError) -> Self {
        Self::Decode(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    /// The document is not valid JSON for the config schema.
    Parse(serde_json::Error),
    /// A field failed range validation.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "config parse: {e}"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}
