//! Broadcast announcement decoder.
//!
//! Wire format (little-endian throughout):
//! ```text
//! ┌──────────────┬──────────┬─────────┬───────────── × N ──────────────────────────────┐
//! │ Broadcast ID │ Reserved │ N (1B)  │ BIS bitmap │ Codec ID │ CfgLen │ Cfg │ MdLen │ Md │
//! │ (3B LE)      │ (1B)     │         │ (1B)       │ (5B)     │ (1B)   │     │ (1B)  │    │
//! └──────────────┴──────────┴─────────┴────────────────────────────────────────────────┘
//! ```
//!
//! Bit `k` of the BIS bitmap announces stream index `k + 1`. Every index
//! in a subgroup shares that subgroup's metadata.
//!
//! Partial-decode contract: a payload shorter than [`MIN_PAYLOAD_LEN`]
//! yields an empty result. Otherwise decoding stops at the first field
//! that does not fit, `truncated` is set, and every subgroup completed
//! before that point is kept. Nothing here panics or returns an error.

use log::debug;

use super::metadata::parse_metadata;
use super::{BisChannel, BroadcastInfo};

/// Shortest payload worth looking at (broadcast id + reserved byte).
pub const MIN_PAYLOAD_LEN: usize = 4;

/// Fixed size of the codec identifier block.
const CODEC_ID_LEN: usize = 5;

/// Bits in the per-subgroup BIS bitmap.
const BITMAP_BITS: u8 = 8;

/// The next field does not fit in the remaining bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Truncated;

/// Bounds-checked forward reader.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Truncated> {
        let end = self.pos.checked_add(n).ok_or(Truncated)?;
        let bytes = self.buf.get(self.pos..end).ok_or(Truncated)?;
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, Truncated> {
        Ok(self.take(1)?[0])
    }

    fn u24_le(&mut self) -> Result<u32, Truncated> {
        let b = self.take(3)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], 0]))
    }

    fn skip(&mut self, n: usize) -> Result<(), Truncated> {
        self.take(n).map(|_| ())
    }
}

/// Decode a service-data or manufacturer-data payload.
pub fn decode_broadcast_info(payload: &[u8]) -> BroadcastInfo {
    if payload.len() < MIN_PAYLOAD_LEN {
        debug!("decoder: payload too short ({} bytes)", payload.len());
        return BroadcastInfo {
            truncated: true,
            ..BroadcastInfo::default()
        };
    }

    let mut cursor = Cursor::new(payload);
    let mut info = BroadcastInfo::default();
    if decode_into(&mut cursor, &mut info).is_err() {
        debug!(
            "decoder: truncated at byte {} of {}, kept {} channel(s)",
            cursor.pos,
            payload.len(),
            info.channels.len()
        );
        info.truncated = true;
    }
    info
}

fn decode_into(cursor: &mut Cursor<'_>, info: &mut BroadcastInfo) -> Result<(), Truncated> {
    info.broadcast_id = Some(cursor.u24_le()?);
    let _reserved = cursor.u8()?;
    let subgroups = cursor.u8()?;

    for _ in 0..subgroups {
        let channels = decode_subgroup(cursor)?;
        info.channels.extend(channels);
    }
    Ok(())
}

fn decode_subgroup(cursor: &mut Cursor<'_>) -> Result<Vec<BisChannel>, Truncated> {
    let bitmap = cursor.u8()?;
    cursor.skip(CODEC_ID_LEN)?;
    let config_len = cursor.u8()? as usize;
    cursor.skip(config_len)?;
    let metadata_len = cursor.u8()? as usize;
    let metadata_raw = cursor.take(metadata_len)?;

    let metadata = parse_metadata(&String::from_utf8_lossy(metadata_raw));

    Ok((0..BITMAP_BITS)
        .filter(|bit| bitmap & (1 << bit) != 0)
        .map(|bit| BisChannel {
            index: bit + 1,
            language: metadata.language.clone(),
            audio_role: metadata.audio_role.clone(),
            stream_config: metadata.stream_config.clone(),
        })
        .collect())
}
