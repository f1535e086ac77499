//! Wire codec: advertisement decoding and control-point encoding.
//!
//! ```text
//!  advertisement payload ──▶ decoder ──▶ BroadcastInfo { id, [BisChannel] }
//!                               │
//!                               └── metadata (key=value tokenizer)
//!
//!  (source id, indexes, ...) ──▶ encoder ──▶ ControlPointCommand bytes
//!
//!  receive-state value ──▶ receive_state ──▶ ReceiveState
//! ```
//!
//! Everything here is pure: no I/O, no locks, no logging above `debug`
//! except for the encoder's defensive fallback.

pub mod decoder;
pub mod encoder;
pub mod metadata;
pub mod receive_state;

use serde::Serialize;

pub use decoder::decode_broadcast_info;
pub use encoder::{CommandKind, ControlPointCommand};

/// Language tag used when a subgroup carries no usable `lang` token.
pub const UNKNOWN_LANGUAGE: &str = "Unknown";

/// One independently selectable sub-stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BisChannel {
    /// Stream index, 1-based.
    pub index: u8,
    pub language: String,
    pub audio_role: Option<String>,
    pub stream_config: Option<String>,
}

impl BisChannel {
    /// Channel with no metadata beyond its index.
    pub fn bare(index: u8) -> Self {
        Self {
            index,
            language: UNKNOWN_LANGUAGE.to_string(),
            audio_role: None,
            stream_config: None,
        }
    }

    pub fn with_language(index: u8, language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Self::bare(index)
        }
    }
}

/// Everything learned from one advertisement payload.
///
/// A decode never fails. When the payload ends early, `truncated` is set
/// and the result holds every subgroup that was read completely before
/// the cut.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastInfo {
    /// 24-bit broadcast identifier.
    pub broadcast_id: Option<u32>,
    pub channels: Vec<BisChannel>,
    pub truncated: bool,
}

impl BroadcastInfo {
    /// Nothing learned from this packet.
    pub fn is_empty(&self) -> bool {
        self.broadcast_id.is_none() && self.channels.is_empty()
    }

    /// Fold another payload's result into this one.
    ///
    /// The first non-null broadcast id wins and channels accumulate in
    /// arrival order (the registry resolves duplicate indexes).
    pub fn absorb(&mut self, other: BroadcastInfo) {
        if self.broadcast_id.is_none() {
            self.broadcast_id = other.broadcast_id;
        }
        self.truncated |= other.truncated;
        self.channels.extend(other.channels);
    }
}
