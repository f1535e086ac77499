//! Receive-state characteristic decoder.
//!
//! The scan delegator publishes one receive state per registered source.
//! It is the authoritative place the source id (needed by every
//! control-point command) comes from.
//!
//! ```text
//! src_id │ addr_type │ addr (6B LE) │ adv_sid │ bcast_id (3B) │ pa_sync │ big_enc │ [bad_code 16B] │ N │ N × { bis_sync (4B LE) │ md_len │ md }
//! ```
//!
//! `bad_code` is present only when `big_enc` reports a bad code. An empty
//! value means no source is registered in that slot.

use serde::{Serialize, Serializer};

use crate::codec::encoder::bitmap_indexes;
use crate::error::ReceiveStateError;
use crate::protocol::PeerAddress;

const BAD_CODE_LEN: usize = 16;

/// BIS sync value meaning "failed to synchronize".
const BIS_SYNC_FAILED: u32 = 0xFFFF_FFFF;

/// Periodic-advertising sync state reported as synchronized.
const PA_SYNCHRONIZED: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BigEncryption {
    NotEncrypted,
    CodeRequired,
    Decrypting,
    BadCode,
    Reserved(u8),
}

impl From<u8> for BigEncryption {
    fn from(raw: u8) -> Self {
        match raw {
            0x00 => Self::NotEncrypted,
            0x01 => Self::CodeRequired,
            0x02 => Self::Decrypting,
            0x03 => Self::BadCode,
            other => Self::Reserved(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubgroupState {
    /// Bit `k` set: index `k + 1` is synchronized.
    pub bis_sync: u32,
    pub metadata: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiveState {
    pub source_id: u8,
    pub address_type: u8,
    #[serde(serialize_with = "as_display")]
    pub source_address: PeerAddress,
    pub adv_sid: u8,
    pub broadcast_id: u32,
    pub pa_sync_state: u8,
    pub big_encryption: BigEncryption,
    pub bad_code: Option<[u8; BAD_CODE_LEN]>,
    pub subgroups: Vec<SubgroupState>,
}

impl ReceiveState {
    pub fn is_pa_synchronized(&self) -> bool {
        self.pa_sync_state == PA_SYNCHRONIZED
    }

    /// Indexes the delegator reports as synchronized, ascending.
    pub fn synced_indexes(&self) -> Vec<u8> {
        let bitmap = self
            .subgroups
            .iter()
            .filter(|sg| sg.bis_sync != BIS_SYNC_FAILED)
            .fold(0u32, |acc, sg| acc | sg.bis_sync);
        bitmap_indexes(bitmap)
    }
}

fn as_display<S: Serializer>(addr: &PeerAddress, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(addr)
}

/// Decode one receive-state value. `Ok(None)` for an empty slot.
pub fn decode_receive_state(value: &[u8]) -> Result<Option<ReceiveState>, ReceiveStateError> {
    if value.is_empty() {
        return Ok(None);
    }
    let mut rest = value;

    let source_id = take_u8(&mut rest)?;
    let address_type = take_u8(&mut rest)?;
    let mut addr = [0u8; 6];
    addr.copy_from_slice(take(&mut rest, 6)?);
    let adv_sid = take_u8(&mut rest)?;
    let id = take(&mut rest, 3)?;
    let broadcast_id = u32::from_le_bytes([id[0], id[1], id[2], 0]);
    let pa_sync_state = take_u8(&mut rest)?;
    let big_encryption = BigEncryption::from(take_u8(&mut rest)?);

    let bad_code = if big_encryption == BigEncryption::BadCode {
        let mut code = [0u8; BAD_CODE_LEN];
        code.copy_from_slice(take(&mut rest, BAD_CODE_LEN)?);
        Some(code)
    } else {
        None
    };

    let count = take_u8(&mut rest)?;
    let mut subgroups = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let sync = take(&mut rest, 4)?;
        let bis_sync = u32::from_le_bytes([sync[0], sync[1], sync[2], sync[3]]);
        let md_len = take_u8(&mut rest)? as usize;
        let metadata = take(&mut rest, md_len)?.to_vec();
        subgroups.push(SubgroupState { bis_sync, metadata });
    }

    Ok(Some(ReceiveState {
        source_id,
        address_type,
        source_address: PeerAddress::from_le_bytes(addr),
        adv_sid,
        broadcast_id,
        pa_sync_state,
        big_encryption,
        bad_code,
        subgroups,
    }))
}

fn take<'a>(rest: &mut &'a [u8], n: usize) -> Result<&'a [u8], ReceiveStateError> {
    if rest.len() < n {
        return Err(ReceiveStateError::Truncated);
    }
    let (head, tail) = rest.split_at(n);
    *rest = tail;
    Ok(head)
}

fn take_u8(rest: &mut &[u8]) -> Result<u8, ReceiveStateError> {
    Ok(take(rest, 1)?[0])
}
