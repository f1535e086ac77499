//! Transport session manager: delivers command frames to scan delegators.
//!
//! One [`PeerSession`] per address, kept in a keyed map and reused across
//! deliveries until closed. Each session sits behind its own async lock,
//! so deliveries to different peers run concurrently while deliveries to
//! the same peer are serialized.
//!
//! ## Failure classes
//!
//! | Class     | Errors                                              | Retried |
//! |-----------|-----------------------------------------------------|---------|
//! | terminal  | `Unauthorized`, `PeerNotFound`, `*NotFound`, `EmptyCommand` | no |
//! | transport | `ConnectFailed`, `DiscoveryFailed`                  | no      |
//! | write     | `WriteFailed { attempts, last }`                    | up to `max_write_attempts` total |
//! | cancelled | `SessionClosed`                                     | no      |
//!
//! No timeout is imposed here. A caller that wraps [`SessionManager::deliver`]
//! in its own timeout may drop the future at any suspension point; the
//! session is then left in a non-`Ready` state and rebuilt on next use.

pub mod session;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use crate::app::events::BroadcastEvent;
use crate::app::ports::{AuthorizationPort, Capability, EventSink, GattPort, WriteAck};
use crate::codec::ControlPointCommand;
use crate::config::AuracastConfig;
use crate::error::{DeliveryError, GattError};
use crate::protocol::PeerAddress;

pub use session::{PeerSession, SessionState};
use session::SessionSlot;

type SessionMap = HashMap<PeerAddress, Arc<SessionSlot>>;

pub struct SessionManager<G, A, E> {
    gatt: G,
    auth: Arc<A>,
    sink: Arc<E>,
    control_service: u128,
    control_point: u128,
    max_write_attempts: u8,
    sessions: Mutex<SessionMap>,
}

impl<G, A, E> SessionManager<G, A, E>
where
    G: GattPort,
    A: AuthorizationPort,
    E: EventSink,
{
    pub fn new(gatt: G, auth: Arc<A>, sink: Arc<E>, config: &AuracastConfig) -> Self {
        Self {
            gatt,
            auth,
            sink,
            control_service: config.control_service_uuid(),
            control_point: config.control_point_uuid(),
            max_write_attempts: config.max_write_attempts.max(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn gatt(&self) -> &G {
        &self.gatt
    }

    fn map(&self) -> MutexGuard<'_, SessionMap> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, address: PeerAddress) -> Arc<SessionSlot> {
        Arc::clone(
            self.map()
                .entry(address)
                .or_insert_with(|| Arc::new(SessionSlot::new(address))),
        )
    }

    /// Slot for a new operation. A slot already closed by someone else is
    /// waited out and torn down first, then replaced.
    async fn live_slot(&self, address: PeerAddress) -> Arc<SessionSlot> {
        loop {
            let slot = self.slot(address);
            if !slot.is_closed() {
                return slot;
            }
            let mut session = slot.session.lock().await;
            self.retire(&slot, &mut session).await;
        }
    }

    /// Remove `slot` from the map unless it has already been replaced.
    fn detach(&self, address: PeerAddress, slot: &Arc<SessionSlot>) {
        let mut map = self.map();
        if map.get(&address).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            map.remove(&address);
        }
    }

    /// Drop a slot whose link is down, unless another operation still holds
    /// it (the map and the caller account for two references).
    fn detach_idle(&self, address: PeerAddress, slot: &Arc<SessionSlot>) {
        let mut map = self.map();
        if map.get(&address).is_some_and(|s| Arc::ptr_eq(s, slot))
            && Arc::strong_count(slot) == 2
        {
            debug!("transport: {} dropping idle session", address);
            map.remove(&address);
        }
    }

    /// Tear a closed slot down (once) and drop it from the map. Must be
    /// called with the slot's session lock held.
    async fn retire(&self, slot: &Arc<SessionSlot>, session: &mut PeerSession) {
        if slot.retire() {
            self.teardown(session).await;
        }
        self.detach(session.address(), slot);
    }

    /// Addresses with an open (or opening) session.
    pub fn open_sessions(&self) -> Vec<PeerAddress> {
        let mut out: Vec<PeerAddress> = self
            .map()
            .iter()
            .filter(|(_, slot)| !slot.is_closed())
            .map(|(address, _)| *address)
            .collect();
        out.sort();
        out
    }

    /// Current state of a peer's session. Waits for any in-flight delivery.
    pub async fn session_state(&self, address: PeerAddress) -> Option<SessionState> {
        let slot = self.map().get(&address).cloned()?;
        let session = slot.session.lock().await;
        Some(session.state())
    }

    // ── Delivery ──────────────────────────────────────────────

    pub async fn deliver_command(
        &self,
        command: &ControlPointCommand,
    ) -> Result<WriteAck, DeliveryError> {
        self.deliver(command.address, command.as_bytes(), command.close_after)
            .await
    }

    /// Write `bytes` to the control point of `address`, establishing the
    /// session first if needed.
    pub async fn deliver(
        &self,
        address: PeerAddress,
        bytes: &[u8],
        close_after: bool,
    ) -> Result<WriteAck, DeliveryError> {
        if bytes.is_empty() {
            return Err(DeliveryError::EmptyCommand);
        }
        if !self.auth.is_granted(Capability::Connect) {
            warn!("transport: {} connect capability not granted", address);
            return Err(DeliveryError::Unauthorized);
        }

        let slot = self.live_slot(address).await;
        let mut session = slot.session.lock().await;
        if slot.is_closed() {
            debug!("transport: {} closed while delivery was queued", address);
            self.retire(&slot, &mut session).await;
            return Err(DeliveryError::SessionClosed);
        }

        let result = self.write_with_retry(&mut session, bytes).await;

        if close_after {
            slot.mark_closed();
            self.retire(&slot, &mut session).await;
        } else if result.is_err() && session.state() == SessionState::Disconnected {
            self.detach_idle(address, &slot);
        }
        result
    }

    async fn write_with_retry(
        &self,
        session: &mut PeerSession,
        bytes: &[u8],
    ) -> Result<WriteAck, DeliveryError> {
        let address = session.address();
        let mut attempt: u8 = 1;
        loop {
            self.ensure_ready(session).await?;
            session.resolve(self.control_service, self.control_point)?;

            session.state = SessionState::Writing;
            match self
                .gatt
                .write(address, self.control_service, self.control_point, bytes)
                .await
            {
                Ok(ack) => {
                    session.state = SessionState::Ready;
                    session.writes += 1;
                    if ack == WriteAck::Accepted {
                        debug!("transport: {} write accepted without confirmation", address);
                    }
                    info!(
                        "transport: {} wrote {} byte(s) on attempt {}",
                        address,
                        bytes.len(),
                        attempt
                    );
                    return Ok(ack);
                }
                Err(GattError::Unauthorized) => {
                    session.state = SessionState::Ready;
                    return Err(DeliveryError::Unauthorized);
                }
                Err(e) => {
                    warn!(
                        "transport: {} write attempt {}/{} failed: {}",
                        address, attempt, self.max_write_attempts, e
                    );
                    if e == GattError::Disconnected {
                        session.reset();
                    } else {
                        session.state = SessionState::Ready;
                    }
                    if attempt >= self.max_write_attempts {
                        return Err(DeliveryError::WriteFailed { attempts: attempt, last: e });
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Bring the session to `Ready`: connect, then discover services.
    async fn ensure_ready(&self, session: &mut PeerSession) -> Result<(), DeliveryError> {
        if session.is_ready() {
            return Ok(());
        }
        let address = session.address();
        if session.state() != SessionState::Disconnected {
            debug!("transport: {} stale session in {:?}, rebuilding", address, session.state());
            self.gatt.disconnect(address).await;
            session.reset();
        }

        session.state = SessionState::Connecting;
        if let Err(e) = self.gatt.connect(address).await {
            session.reset();
            warn!("transport: {} connect failed: {}", address, e);
            return Err(match e {
                GattError::Unauthorized => DeliveryError::Unauthorized,
                GattError::PeerNotFound => DeliveryError::PeerNotFound,
                other => DeliveryError::ConnectFailed(other),
            });
        }

        session.state = SessionState::DiscoveringServices;
        match self.gatt.discover_services(address).await {
            Ok(services) => {
                debug!("transport: {} discovered {} service(s)", address, services.len());
                session.set_services(services);
                Ok(())
            }
            Err(e) => {
                warn!("transport: {} discovery failed: {}", address, e);
                self.gatt.disconnect(address).await;
                session.reset();
                Err(DeliveryError::DiscoveryFailed(e))
            }
        }
    }

    /// Read a characteristic on the peer, reusing or opening its session.
    pub async fn read(
        &self,
        address: PeerAddress,
        service: u128,
        characteristic: u128,
    ) -> Result<Vec<u8>, DeliveryError> {
        if !self.auth.is_granted(Capability::Connect) {
            return Err(DeliveryError::Unauthorized);
        }
        let slot = self.live_slot(address).await;
        let mut session = slot.session.lock().await;
        if slot.is_closed() {
            self.retire(&slot, &mut session).await;
            return Err(DeliveryError::SessionClosed);
        }
        let result = self.read_on(&mut session, service, characteristic).await;
        if result.is_err() && session.state() == SessionState::Disconnected {
            self.detach_idle(address, &slot);
        }
        result
    }

    async fn read_on(
        &self,
        session: &mut PeerSession,
        service: u128,
        characteristic: u128,
    ) -> Result<Vec<u8>, DeliveryError> {
        self.ensure_ready(session).await?;
        session.resolve(service, characteristic)?;
        match self.gatt.read(session.address(), service, characteristic).await {
            Ok(value) => Ok(value),
            Err(e) => {
                if e == GattError::Disconnected {
                    session.reset();
                }
                Err(DeliveryError::ReadFailed(e))
            }
        }
    }

    // ── Teardown ──────────────────────────────────────────────

    async fn teardown(&self, session: &mut PeerSession) {
        let address = session.address();
        if session.state() != SessionState::Disconnected {
            self.gatt.disconnect(address).await;
        }
        session.reset();
        info!("transport: {} session closed after {} write(s)", address, session.writes());
        self.sink.emit(&BroadcastEvent::SessionClosed(address));
    }

    /// Close one peer's session. Deliveries queued behind the current one
    /// fail with `SessionClosed`; deliveries issued from here on wait for
    /// the teardown and then open a new session. Returns `false` if no
    /// session was open.
    pub async fn close(&self, address: PeerAddress) -> bool {
        let Some(slot) = self.map().get(&address).cloned() else {
            return false;
        };
        let was_open = slot.mark_closed();
        let mut session = slot.session.lock().await;
        self.retire(&slot, &mut session).await;
        was_open
    }

    /// Close every open session.
    pub async fn close_all(&self) {
        let slots: Vec<Arc<SessionSlot>> = self.map().values().cloned().collect();
        for slot in &slots {
            slot.mark_closed();
        }
        for slot in slots {
            let mut session = slot.session.lock().await;
            self.retire(&slot, &mut session).await;
        }
    }
}
