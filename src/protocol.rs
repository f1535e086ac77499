//! Protocol identifiers and peer addressing.
//!
//! All GATT/advertising identifiers in this crate are 16-bit assigned
//! numbers expanded onto the Bluetooth base UUID:
//!
//! ```text
//! 0000xxxx-0000-1000-8000-00805F9B34FB
//!     ^^^^ 16-bit assigned number
//! ```

use core::fmt;
use core::str::FromStr;

// ───────────────────────────────────────────────────────────────
// Constants
// ───────────────────────────────────────────────────────────────

/// Bluetooth base UUID with the 16-bit slot zeroed.
pub const BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

/// Broadcast Audio Announcement service (advertisement marker).
pub const BROADCAST_AUDIO_ANNOUNCEMENT_UUID16: u16 = 0x1852;
/// Broadcast Audio Scan service on the scan delegator.
pub const BROADCAST_AUDIO_SCAN_SERVICE_UUID16: u16 = 0x184F;
/// Broadcast Audio Scan control point characteristic.
pub const CONTROL_POINT_UUID16: u16 = 0x2BC7;
/// Broadcast receive state characteristic.
pub const RECEIVE_STATE_UUID16: u16 = 0x2BC8;

/// Expand a 16-bit assigned number to its full 128-bit form.
pub const fn expand_uuid16(short: u16) -> u128 {
    ((short as u128) << 96) | BASE_UUID
}

/// Recover the 16-bit assigned number if `uuid` sits on the base pattern.
pub const fn shorten_uuid(uuid: u128) -> Option<u16> {
    let mask: u128 = 0xFFFF_u128 << 96;
    if uuid & !mask == BASE_UUID {
        Some((uuid >> 96) as u16)
    } else {
        None
    }
}

/// Canonical `8-4-4-4-12` rendering used in logs.
pub fn format_uuid(uuid: u128) -> String {
    let b = uuid.to_be_bytes();
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7], b[8], b[9], b[10], b[11], b[12], b[13],
        b[14], b[15]
    )
}

// ───────────────────────────────────────────────────────────────
// Peer address
// ───────────────────────────────────────────────────────────────

/// 48-bit device address, most significant byte first (display order).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerAddress(pub [u8; 6]);

impl PeerAddress {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Build from the over-the-air little-endian byte order.
    pub fn from_le_bytes(raw: [u8; 6]) -> Self {
        let mut bytes = raw;
        bytes.reverse();
        Self(bytes)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Rejected textual address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressParseError;

impl fmt::Display for AddressParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "address must be six hex octets separated by ':'")
    }
}

impl std::error::Error for AddressParseError {}

impl FromStr for PeerAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut parts = s.trim().split(':');
        for slot in &mut bytes {
            let part = parts.next().ok_or(AddressParseError)?;
            if part.len() != 2 {
                return Err(AddressParseError);
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| AddressParseError)?;
        }
        if parts.next().is_some() {
            return Err(AddressParseError);
        }
        Ok(Self(bytes))
    }
}
