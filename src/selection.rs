//! Selection policy: turns "activate these indexes on this device" into a
//! validated Join or Modify command and delivers it.
//!
//! Steps, each of which may end the selection with a [`SelectionFailure`]:
//!
//! 1. protected streams (broadcast code present) are rejected;
//! 2. requested indexes are intersected with the device's channels. The
//!    result follows channel-index order, whatever order the request used;
//! 3. at most one channel per language is kept (lowest index wins);
//! 4. Join when nothing has been selected yet, Modify otherwise. Both need
//!    a source id; Modify also needs the broadcast id;
//! 5. the frame is delivered with the session kept open. Only a delivered
//!    frame updates `selected_bis_indexes`.

use core::fmt;
use std::collections::HashSet;
use std::sync::Arc;

use log::{info, warn};

use crate::app::events::BroadcastEvent;
use crate::app::ports::{AuthorizationPort, EventSink, GattPort};
use crate::codec::{CommandKind, ControlPointCommand};
use crate::error::DeliveryError;
use crate::registry::{BroadcastDevice, DeviceRegistry};
use crate::transport::SessionManager;

// ───────────────────────────────────────────────────────────────
// Outcome types
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionFailure {
    /// The device carries a broadcast code.
    ProtectedStream,
    /// None of the requested indexes is known for the device.
    IndexesNotFound,
    /// The language fallback left nothing to select.
    NothingSelectable,
    MissingSourceId,
    MissingBroadcastId,
    /// The command could not be delivered.
    Delivery(DeliveryError),
}

impl fmt::Display for SelectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProtectedStream => write!(f, "protected broadcast streams are not supported"),
            Self::IndexesNotFound => write!(f, "indexes not found"),
            Self::NothingSelectable => write!(f, "no selectable channels"),
            Self::MissingSourceId => write!(f, "source id not known"),
            Self::MissingBroadcastId => write!(f, "broadcast id not known"),
            Self::Delivery(e) => write!(f, "delivery failed: {e}"),
        }
    }
}

impl std::error::Error for SelectionFailure {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    Success {
        device: BroadcastDevice,
        applied_indexes: Vec<u8>,
    },
    Failure {
        device: BroadcastDevice,
        reason: SelectionFailure,
    },
}

impl SelectionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn device(&self) -> &BroadcastDevice {
        match self {
            Self::Success { device, .. } | Self::Failure { device, .. } => device,
        }
    }

    /// Human-readable failure reason, `None` on success.
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { reason, .. } => Some(reason.to_string()),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Pure planning
// ───────────────────────────────────────────────────────────────

/// Validated selection, ready to encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPlan {
    pub kind: CommandKind,
    pub indexes: Vec<u8>,
    pub source_id: u8,
    pub broadcast_id: Option<u32>,
}

impl SelectionPlan {
    pub fn to_command(&self, device: &BroadcastDevice) -> ControlPointCommand {
        match (self.kind, self.broadcast_id) {
            (CommandKind::Modify, Some(broadcast_id)) => ControlPointCommand::modify(
                device.address,
                self.source_id,
                &self.indexes,
                broadcast_id,
                device.broadcast_code.as_deref(),
                false,
            ),
            _ => ControlPointCommand::join(device.address, self.source_id, &self.indexes, false),
        }
    }
}

/// Requested indexes the device knows, ascending, without repeats.
pub fn intersect_indexes(device: &BroadcastDevice, requested: &[u8]) -> Vec<u8> {
    device
        .bis_channels
        .keys()
        .copied()
        .filter(|i| requested.contains(i))
        .collect()
}

/// Keep the first index per language.
pub fn one_per_language(device: &BroadcastDevice, indexes: &[u8]) -> Vec<u8> {
    let mut languages = HashSet::new();
    indexes
        .iter()
        .copied()
        .filter(|i| {
            device
                .channel(*i)
                .is_some_and(|ch| languages.insert(ch.language.as_str()))
        })
        .collect()
}

/// Run every precondition. Never touches the device.
pub fn plan_selection(
    device: &BroadcastDevice,
    requested: &[u8],
) -> Result<SelectionPlan, SelectionFailure> {
    if device.is_protected() {
        return Err(SelectionFailure::ProtectedStream);
    }
    let known = intersect_indexes(device, requested);
    if known.is_empty() {
        return Err(SelectionFailure::IndexesNotFound);
    }
    let indexes = one_per_language(device, &known);
    if indexes.is_empty() {
        return Err(SelectionFailure::NothingSelectable);
    }

    let kind = if device.has_joined() {
        CommandKind::Modify
    } else {
        CommandKind::Join
    };
    let source_id = device.source_id.ok_or(SelectionFailure::MissingSourceId)?;
    if kind == CommandKind::Modify && device.broadcast_id.is_none() {
        return Err(SelectionFailure::MissingBroadcastId);
    }

    Ok(SelectionPlan {
        kind,
        indexes,
        source_id,
        broadcast_id: device.broadcast_id,
    })
}

// ───────────────────────────────────────────────────────────────
// SelectionPolicy
// ───────────────────────────────────────────────────────────────

pub struct SelectionPolicy<G, A, E> {
    transport: Arc<SessionManager<G, A, E>>,
    registry: Arc<DeviceRegistry>,
    sink: Arc<E>,
}

impl<G, A, E> SelectionPolicy<G, A, E>
where
    G: GattPort,
    A: AuthorizationPort,
    E: EventSink,
{
    pub fn new(
        transport: Arc<SessionManager<G, A, E>>,
        registry: Arc<DeviceRegistry>,
        sink: Arc<E>,
    ) -> Self {
        Self {
            transport,
            registry,
            sink,
        }
    }

    /// Validate, encode and deliver a selection.
    ///
    /// The registry's current record for the address is used when there is
    /// one, so out-of-band updates (source id, code) are honored even if
    /// `device` is a stale snapshot.
    pub async fn select_channels(
        &self,
        device: &BroadcastDevice,
        requested: &[u8],
    ) -> SelectionOutcome {
        let current = self
            .registry
            .get(&device.address)
            .unwrap_or_else(|| device.clone());

        let plan = match plan_selection(&current, requested) {
            Ok(plan) => plan,
            Err(reason) => return self.reject(current, reason),
        };

        let command = plan.to_command(&current);
        info!(
            "selection: {} {:?} indexes {:?}",
            current.address, plan.kind, plan.indexes
        );
        if let Err(e) = self.transport.deliver_command(&command).await {
            return self.reject(current, SelectionFailure::Delivery(e));
        }

        let device = self
            .registry
            .set_selected(&current.address, &plan.indexes)
            .unwrap_or_else(|| BroadcastDevice {
                selected_bis_indexes: plan.indexes.clone(),
                ..current
            });
        self.sink.emit(&BroadcastEvent::SelectionApplied {
            address: device.address,
            indexes: plan.indexes.clone(),
        });
        SelectionOutcome::Success {
            device,
            applied_indexes: plan.indexes,
        }
    }

    fn reject(&self, device: BroadcastDevice, reason: SelectionFailure) -> SelectionOutcome {
        warn!("selection: {} rejected: {}", device.address, reason);
        self.sink.emit(&BroadcastEvent::SelectionRejected {
            address: device.address,
            reason: reason.to_string(),
        });
        SelectionOutcome::Failure { device, reason }
    }
}
