//! Device registry: merges repeated, noisy observations into one stable
//! record per peer address.
//!
//! Merge rules:
//! - `rssi` is overwritten on every observation.
//! - `name` is last-observed-wins but never downgrades to empty.
//! - Channels merge by index: a new index is added, an existing one is
//!   overwritten, nothing is ever removed.
//! - `broadcast_id` and `broadcast_code` are sticky: only a new non-null
//!   value replaces them.
//!
//! Records disappear only through [`DeviceRegistry::reset`]. Every
//! mutation that actually changes a record bumps a version counter and
//! wakes [`DeviceList::changed`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::debug;
use serde::{Serialize, Serializer};

use crate::codec::receive_state::ReceiveState;
use crate::codec::{BisChannel, BroadcastInfo};
use crate::protocol::PeerAddress;

// ───────────────────────────────────────────────────────────────
// BroadcastDevice
// ───────────────────────────────────────────────────────────────

/// Aggregate view of one broadcast source, keyed by address.
///
/// Equality compares every field, including the broadcast code byte for
/// byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BroadcastDevice {
    #[serde(serialize_with = "as_display")]
    pub address: PeerAddress,
    pub name: String,
    pub rssi: i16,
    /// Keyed (and therefore iterated) by index.
    pub bis_channels: BTreeMap<u8, BisChannel>,
    pub broadcast_id: Option<u32>,
    pub broadcast_code: Option<Vec<u8>>,
    pub source_id: Option<u8>,
    /// Indexes most recently applied by a selection; empty = never joined.
    pub selected_bis_indexes: Vec<u8>,
}

impl BroadcastDevice {
    pub fn new(address: PeerAddress, name: impl Into<String>, rssi: i16) -> Self {
        Self {
            address,
            name: name.into(),
            rssi,
            bis_channels: BTreeMap::new(),
            broadcast_id: None,
            broadcast_code: None,
            source_id: None,
            selected_bis_indexes: Vec::new(),
        }
    }

    /// Channels in ascending index order.
    pub fn channels(&self) -> impl Iterator<Item = &BisChannel> {
        self.bis_channels.values()
    }

    pub fn channel(&self, index: u8) -> Option<&BisChannel> {
        self.bis_channels.get(&index)
    }

    pub fn channel_indexes(&self) -> Vec<u8> {
        self.bis_channels.keys().copied().collect()
    }

    /// Protected streams carry a broadcast code.
    pub fn is_protected(&self) -> bool {
        self.broadcast_code.is_some()
    }

    pub fn has_joined(&self) -> bool {
        !self.selected_bis_indexes.is_empty()
    }

    /// Apply one observation in place.
    fn merge(&mut self, name: Option<&str>, rssi: i16, info: &BroadcastInfo) {
        self.rssi = rssi;
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            if self.name != name {
                self.name = name.to_string();
            }
        }
        if let Some(id) = info.broadcast_id {
            self.broadcast_id = Some(id);
        }
        for channel in &info.channels {
            self.bis_channels.insert(channel.index, channel.clone());
        }
    }
}

fn as_display<S: Serializer>(addr: &PeerAddress, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(addr)
}

// ───────────────────────────────────────────────────────────────
// DeviceRegistry
// ───────────────────────────────────────────────────────────────

struct Entry {
    /// Insertion sequence, used to break RSSI ties.
    seq: u64,
    device: BroadcastDevice,
}

#[derive(Default)]
struct Inner {
    devices: HashMap<PeerAddress, Entry>,
    next_seq: u64,
    version: u64,
}

pub struct DeviceRegistry {
    inner: Mutex<Inner>,
    changed: Signal<CriticalSectionRawMutex, u64>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            changed: Signal::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self, inner: &mut Inner) {
        inner.version += 1;
        self.changed.signal(inner.version);
    }

    /// Merge one observation, creating the record on first sight.
    ///
    /// A new record without a name is labelled with its address.
    pub fn observe(
        &self,
        address: PeerAddress,
        name: Option<&str>,
        rssi: i16,
        info: &BroadcastInfo,
    ) -> BroadcastDevice {
        let mut inner = self.lock();
        let (updated, changed) = if let Some(entry) = inner.devices.get_mut(&address) {
            let before = entry.device.clone();
            entry.device.merge(name, rssi, info);
            (entry.device.clone(), entry.device != before)
        } else {
            let seq = inner.next_seq;
            inner.next_seq += 1;
            let mut device = BroadcastDevice::new(address, address.to_string(), rssi);
            device.merge(name, rssi, info);
            debug!("registry: new device {} ({})", address, device.name);
            inner.devices.insert(
                address,
                Entry {
                    seq,
                    device: device.clone(),
                },
            );
            (device, true)
        };
        if changed {
            self.bump(&mut inner);
        }
        updated
    }

    /// Forget every record.
    pub fn reset(&self) {
        let mut inner = self.lock();
        if !inner.devices.is_empty() {
            debug!("registry: cleared {} device(s)", inner.devices.len());
            inner.devices.clear();
            self.bump(&mut inner);
        }
    }

    pub fn get(&self, address: &PeerAddress) -> Option<BroadcastDevice> {
        self.lock().devices.get(address).map(|e| e.device.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records, strongest signal first, ties in insertion order.
    pub fn snapshot(&self) -> Vec<BroadcastDevice> {
        let inner = self.lock();
        let mut entries: Vec<&Entry> = inner.devices.values().collect();
        entries.sort_by(|a, b| b.device.rssi.cmp(&a.device.rssi).then(a.seq.cmp(&b.seq)));
        entries.into_iter().map(|e| e.device.clone()).collect()
    }

    pub fn version(&self) -> u64 {
        self.lock().version
    }

    /// Resolves with the version of the latest mutation not yet observed.
    pub async fn changed(&self) -> u64 {
        self.changed.wait().await
    }

    /// Record the indexes a selection just applied.
    pub fn set_selected(&self, address: &PeerAddress, indexes: &[u8]) -> Option<BroadcastDevice> {
        self.update(address, |d| d.selected_bis_indexes = indexes.to_vec())
    }

    pub fn set_source_id(&self, address: &PeerAddress, source_id: u8) -> Option<BroadcastDevice> {
        self.update(address, |d| d.source_id = Some(source_id))
    }

    /// Mark the stream as protected. The code stays until replaced.
    pub fn set_broadcast_code(&self, address: &PeerAddress, code: &[u8]) -> Option<BroadcastDevice> {
        self.update(address, |d| d.broadcast_code = Some(code.to_vec()))
    }

    /// Take the source id from the delegator's receive state.
    ///
    /// When no selection has been recorded client-side but the delegator
    /// reports synchronized indexes, those seed `selected_bis_indexes` so
    /// the next selection is sent as a Modify instead of a second Join.
    pub fn apply_receive_state(
        &self,
        address: &PeerAddress,
        state: &ReceiveState,
    ) -> Option<BroadcastDevice> {
        let synced = state.synced_indexes();
        self.update(address, |d| {
            d.source_id = Some(state.source_id);
            if d.selected_bis_indexes.is_empty() && !synced.is_empty() {
                d.selected_bis_indexes = synced;
            }
        })
    }

    fn update(
        &self,
        address: &PeerAddress,
        f: impl FnOnce(&mut BroadcastDevice),
    ) -> Option<BroadcastDevice> {
        let mut inner = self.lock();
        let entry = inner.devices.get_mut(address)?;
        let before = entry.device.clone();
        f(&mut entry.device);
        let after = entry.device.clone();
        if after != before {
            self.bump(&mut inner);
        }
        Some(after)
    }

    /// Cloneable read handle for observers.
    pub fn device_list(self: &Arc<Self>) -> DeviceList {
        DeviceList {
            registry: Arc::clone(self),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// DeviceList
// ───────────────────────────────────────────────────────────────

/// Always-current, read-only view of the registry.
#[derive(Clone)]
pub struct DeviceList {
    registry: Arc<DeviceRegistry>,
}

impl DeviceList {
    pub fn snapshot(&self) -> Vec<BroadcastDevice> {
        self.registry.snapshot()
    }

    pub fn version(&self) -> u64 {
        self.registry.version()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub async fn changed(&self) -> u64 {
        self.registry.changed().await
    }
}
