//! Control-point command encoder.
//!
//! Two frame shapes:
//!
//! ```text
//! Join   (0x01): ┌────┬─────┬───────┬─────────────────────┐
//!                │ op │ src │ count │ index_1 … index_n   │
//!                └────┴─────┴───────┴─────────────────────┘
//!
//! Modify (0x03): ┌────┬─────┬────────┬────────┬──────────────┬─────────┬──────────┐
//!                │ op │ src │ bmp lo │ bmp hi │ bcast id (3B)│ code len│ code …   │
//!                └────┴─────┴────────┴────────┴──────────────┴─────────┴──────────┘
//! ```
//!
//! The Modify bitmap sets bit `index - 1` per requested index; the
//! broadcast id is 24-bit little-endian. Frames live in a fixed-capacity
//! buffer. Input that cannot be framed (index out of range, oversized
//! code, too many indexes) yields an empty frame, which the transport
//! layer refuses to send.

use heapless::Vec;
use log::warn;

use crate::protocol::PeerAddress;

pub const OPCODE_JOIN: u8 = 0x01;
pub const OPCODE_MODIFY: u8 = 0x03;

/// Largest frame either shape can produce.
pub const MAX_COMMAND_LEN: usize = 32;
/// Largest broadcast code carried by a Modify frame.
pub const MAX_BROADCAST_CODE_LEN: usize = 16;
/// Highest index representable in the 16-bit Modify bitmap.
pub const MAX_BITMAP_INDEX: u8 = 16;
/// Largest 24-bit broadcast identifier.
pub const MAX_BROADCAST_ID: u32 = 0x00FF_FFFF;

const JOIN_HEADER_LEN: usize = 3;

/// Encoded frame bytes.
pub type CommandBytes = Vec<u8, MAX_COMMAND_LEN>;

/// Build a Join frame. Indexes are emitted in the order given.
pub fn encode_join(source_id: u8, indexes: &[u8]) -> CommandBytes {
    try_encode_join(source_id, indexes).unwrap_or_else(|| {
        warn!("encoder: join frame not representable ({} indexes)", indexes.len());
        CommandBytes::new()
    })
}

fn try_encode_join(source_id: u8, indexes: &[u8]) -> Option<CommandBytes> {
    if indexes.len() > MAX_COMMAND_LEN - JOIN_HEADER_LEN || indexes.contains(&0) {
        return None;
    }
    let mut out = CommandBytes::new();
    out.extend_from_slice(&[OPCODE_JOIN, source_id, indexes.len() as u8])
        .ok()?;
    out.extend_from_slice(indexes).ok()?;
    Some(out)
}

/// Build a Modify frame. `broadcast_code` of `None` encodes a zero length.
pub fn encode_modify(
    source_id: u8,
    indexes: &[u8],
    broadcast_id: u32,
    broadcast_code: Option<&[u8]>,
) -> CommandBytes {
    try_encode_modify(source_id, indexes, broadcast_id, broadcast_code).unwrap_or_else(|| {
        warn!("encoder: modify frame not representable");
        CommandBytes::new()
    })
}

fn try_encode_modify(
    source_id: u8,
    indexes: &[u8],
    broadcast_id: u32,
    broadcast_code: Option<&[u8]>,
) -> Option<CommandBytes> {
    let bitmap = bis_bitmap(indexes)?;
    if broadcast_id > MAX_BROADCAST_ID {
        return None;
    }
    let code = broadcast_code.unwrap_or(&[]);
    if code.len() > MAX_BROADCAST_CODE_LEN {
        return None;
    }

    let [lo, hi] = bitmap.to_le_bytes();
    let [b0, b1, b2, _] = broadcast_id.to_le_bytes();
    let mut out = CommandBytes::new();
    out.extend_from_slice(&[OPCODE_MODIFY, source_id, lo, hi, b0, b1, b2, code.len() as u8])
        .ok()?;
    out.extend_from_slice(code).ok()?;
    Some(out)
}

/// Fold 1-based indexes into the Modify bitmap. `None` if any index is
/// outside `1..=16`.
pub fn bis_bitmap(indexes: &[u8]) -> Option<u16> {
    indexes.iter().try_fold(0u16, |acc, &index| {
        if index == 0 || index > MAX_BITMAP_INDEX {
            None
        } else {
            Some(acc | (1 << (index - 1)))
        }
    })
}

/// Expand a bitmap back into ascending 1-based indexes.
pub fn bitmap_indexes(bitmap: u32) -> std::vec::Vec<u8> {
    (0..32u8).filter(|bit| bitmap & (1 << bit) != 0).map(|bit| bit + 1).collect()
}

// ───────────────────────────────────────────────────────────────
// Command envelope
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Join,
    Modify,
}

/// One frame addressed to one peer, consumed by a single delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPointCommand {
    pub address: PeerAddress,
    pub kind: CommandKind,
    pub bytes: CommandBytes,
    /// Close the peer session right after the write.
    pub close_after: bool,
}

impl ControlPointCommand {
    pub fn join(address: PeerAddress, source_id: u8, indexes: &[u8], close_after: bool) -> Self {
        Self {
            address,
            kind: CommandKind::Join,
            bytes: encode_join(source_id, indexes),
            close_after,
        }
    }

    pub fn modify(
        address: PeerAddress,
        source_id: u8,
        indexes: &[u8],
        broadcast_id: u32,
        broadcast_code: Option<&[u8]>,
        close_after: bool,
    ) -> Self {
        Self {
            address,
            kind: CommandKind::Modify,
            bytes: encode_modify(source_id, indexes, broadcast_id, broadcast_code),
            close_after,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn opcode(&self) -> Option<u8> {
        self.bytes.first().copied()
    }
}
