//! Session manager: establishment, reuse, retry, close, concurrency.

use std::pin::pin;

use auracast_assist::app::events::BroadcastEvent;
use auracast_assist::app::ports::{GattService, StaticGrants, WriteAck};
use auracast_assist::error::{DeliveryError, GattError};
use auracast_assist::protocol::expand_uuid16;
use auracast_assist::transport::SessionState;
use futures_lite::future::{block_on, poll_once, zip};

use crate::mock_radio::{GattCall, Harness, addr};

const FRAME: &[u8] = &[0x01, 0x01, 0x01, 0x01];

#[test]
fn first_delivery_connects_discovers_and_writes() {
    let h = Harness::new();
    let ack = block_on(h.service.transport().deliver(addr(1), FRAME, false)).unwrap();
    assert_eq!(ack, WriteAck::Confirmed);
    assert_eq!(
        h.gatt.calls(),
        vec![
            GattCall::Connect(addr(1)),
            GattCall::Discover(addr(1)),
            GattCall::Write(addr(1), FRAME.to_vec()),
        ]
    );
    assert_eq!(
        block_on(h.service.transport().session_state(addr(1))),
        Some(SessionState::Ready)
    );
}

#[test]
fn session_is_reused() {
    let h = Harness::new();
    let t = h.service.transport();
    block_on(t.deliver(addr(1), FRAME, false)).unwrap();
    block_on(t.deliver(addr(1), FRAME, false)).unwrap();
    assert_eq!(h.gatt.count(|c| matches!(c, GattCall::Connect(_))), 1);
    assert_eq!(h.gatt.writes_to(addr(1)).len(), 2);
}

#[test]
fn accepted_write_is_enough() {
    let h = Harness::new();
    h.gatt.script_writes(addr(1), [Ok(WriteAck::Accepted)]);
    let ack = block_on(h.service.transport().deliver(addr(1), FRAME, false)).unwrap();
    assert_eq!(ack, WriteAck::Accepted);
}

#[test]
fn failed_write_is_retried_once() {
    let h = Harness::new();
    h.gatt.script_writes(
        addr(1),
        [Err(GattError::WriteRejected(0x0E)), Ok(WriteAck::Confirmed)],
    );
    assert!(block_on(h.service.transport().deliver(addr(1), FRAME, false)).is_ok());
    assert_eq!(h.gatt.writes_to(addr(1)).len(), 2);
}

#[test]
fn write_attempts_are_bounded() {
    let h = Harness::new();
    h.gatt.script_writes(
        addr(1),
        [
            Err(GattError::WriteRejected(1)),
            Err(GattError::WriteRejected(2)),
            Ok(WriteAck::Confirmed),
        ],
    );
    let err = block_on(h.service.transport().deliver(addr(1), FRAME, false)).unwrap_err();
    assert_eq!(
        err,
        DeliveryError::WriteFailed {
            attempts: 2,
            last: GattError::WriteRejected(2)
        }
    );
    assert_eq!(h.gatt.writes_to(addr(1)).len(), 2);
}

#[test]
fn link_drop_during_write_reconnects_for_retry() {
    let h = Harness::new();
    h.gatt
        .script_writes(addr(1), [Err(GattError::Disconnected), Ok(WriteAck::Confirmed)]);
    block_on(h.service.transport().deliver(addr(1), FRAME, false)).unwrap();
    assert_eq!(h.gatt.count(|c| matches!(c, GattCall::Connect(_))), 2);
}

#[test]
fn terminal_failures_are_not_retried() {
    let h = Harness::new();
    h.gatt.fail_connect(addr(1), GattError::PeerNotFound);
    assert_eq!(
        block_on(h.service.transport().deliver(addr(1), FRAME, false)),
        Err(DeliveryError::PeerNotFound)
    );
    assert_eq!(h.gatt.count(|c| matches!(c, GattCall::Connect(_))), 1);
    assert!(h.service.transport().open_sessions().is_empty());

    h.gatt.set_services(
        addr(2),
        vec![GattService {
            uuid: expand_uuid16(0x1800),
            characteristics: vec![],
        }],
    );
    assert_eq!(
        block_on(h.service.transport().deliver(addr(2), FRAME, false)),
        Err(DeliveryError::ServiceNotFound(expand_uuid16(0x184F)))
    );

    h.gatt.set_services(
        addr(3),
        vec![GattService {
            uuid: expand_uuid16(0x184F),
            characteristics: vec![expand_uuid16(0x2BC8)],
        }],
    );
    assert_eq!(
        block_on(h.service.transport().deliver(addr(3), FRAME, false)),
        Err(DeliveryError::CharacteristicNotFound(expand_uuid16(0x2BC7)))
    );
    assert!(h.gatt.writes_to(addr(2)).is_empty());
    assert!(h.gatt.writes_to(addr(3)).is_empty());
}

#[test]
fn missing_capability_is_terminal_and_silent() {
    let h = Harness::with_grants(StaticGrants {
        connect: false,
        ..StaticGrants::ALL
    });
    assert_eq!(
        block_on(h.service.transport().deliver(addr(1), FRAME, false)),
        Err(DeliveryError::Unauthorized)
    );
    assert!(h.gatt.calls().is_empty());
}

#[test]
fn empty_frame_is_refused() {
    let h = Harness::new();
    assert_eq!(
        block_on(h.service.transport().deliver(addr(1), &[], false)),
        Err(DeliveryError::EmptyCommand)
    );
    assert!(h.gatt.calls().is_empty());
}

#[test]
fn discovery_failure_disconnects() {
    let h = Harness::new();
    h.gatt.fail_discovery(addr(1), GattError::DiscoveryFailed);
    assert_eq!(
        block_on(h.service.transport().deliver(addr(1), FRAME, false)),
        Err(DeliveryError::DiscoveryFailed(GattError::DiscoveryFailed))
    );
    assert!(h.gatt.calls().contains(&GattCall::Disconnect(addr(1))));
    assert!(h.service.transport().open_sessions().is_empty());
    assert_eq!(block_on(h.service.transport().session_state(addr(1))), None);
}

#[test]
fn unreachable_peers_do_not_accumulate() {
    let h = Harness::new();
    let t = h.service.transport();
    for last in 1..=4 {
        h.gatt.fail_connect(addr(last), GattError::ConnectionFailed);
        assert_eq!(
            block_on(t.deliver(addr(last), FRAME, false)),
            Err(DeliveryError::ConnectFailed(GattError::ConnectionFailed))
        );
    }
    assert!(t.open_sessions().is_empty());
}

#[test]
fn close_after_tears_down() {
    let h = Harness::new();
    block_on(h.service.transport().deliver(addr(1), FRAME, true)).unwrap();
    assert_eq!(h.gatt.calls().last(), Some(&GattCall::Disconnect(addr(1))));
    assert!(h.service.transport().open_sessions().is_empty());
    assert!(h.sink.events().contains(&BroadcastEvent::SessionClosed(addr(1))));
}

#[test]
fn close_all_closes_every_session() {
    let h = Harness::new();
    let t = h.service.transport();
    block_on(t.deliver(addr(1), FRAME, false)).unwrap();
    block_on(t.deliver(addr(2), FRAME, false)).unwrap();
    assert_eq!(t.open_sessions(), vec![addr(1), addr(2)]);

    block_on(h.service.shutdown());
    assert!(t.open_sessions().is_empty());
    assert_eq!(h.gatt.count(|c| matches!(c, GattCall::Disconnect(_))), 2);
}

#[test]
fn close_cancels_queued_delivery() {
    let h = Harness::new();
    h.gatt.set_yielding(true);
    let t = h.service.transport();

    let mut first = pin!(t.deliver(addr(1), FRAME, false));
    let mut second = pin!(t.deliver(addr(1), &[0x02, 0x01, 0x01, 0x00], false));
    assert!(block_on(poll_once(first.as_mut())).is_none());
    assert!(block_on(poll_once(second.as_mut())).is_none());

    let (first, closed, second) = block_on(async {
        let (a, (c, b)) = zip(first, zip(t.close(addr(1)), second)).await;
        (a, c, b)
    });
    assert!(first.is_ok());
    assert!(closed);
    assert_eq!(second, Err(DeliveryError::SessionClosed));
    assert_eq!(h.gatt.writes_to(addr(1)), vec![FRAME.to_vec()]);
}

#[test]
fn delivery_issued_during_close_waits_for_teardown() {
    let h = Harness::new();
    h.gatt.set_yielding(true);
    let t = h.service.transport();
    let next = [0x02, 0x01, 0x01, 0x02];

    let (first, (closed, second)) = block_on(zip(
        t.deliver(addr(1), FRAME, false),
        zip(t.close(addr(1)), t.deliver(addr(1), &next, false)),
    ));
    assert!(first.is_ok());
    assert!(closed);
    assert!(second.is_ok());
    assert_eq!(
        h.gatt.calls(),
        vec![
            GattCall::Connect(addr(1)),
            GattCall::Discover(addr(1)),
            GattCall::Write(addr(1), FRAME.to_vec()),
            GattCall::Disconnect(addr(1)),
            GattCall::Connect(addr(1)),
            GattCall::Discover(addr(1)),
            GattCall::Write(addr(1), next.to_vec()),
        ]
    );
    let closes = h
        .sink
        .events()
        .into_iter()
        .filter(|e| *e == BroadcastEvent::SessionClosed(addr(1)))
        .count();
    assert_eq!(closes, 1);
    assert_eq!(t.open_sessions(), vec![addr(1)]);
    assert_eq!(block_on(t.session_state(addr(1))), Some(SessionState::Ready));
}

#[test]
fn delivery_queued_behind_close_after_is_cancelled() {
    let h = Harness::new();
    h.gatt.set_yielding(true);
    let t = h.service.transport();
    let (first, second) = block_on(zip(
        t.deliver(addr(1), FRAME, true),
        t.deliver(addr(1), &[0x02, 0x01, 0x01, 0x02], false),
    ));
    assert!(first.is_ok());
    assert_eq!(second, Err(DeliveryError::SessionClosed));
    assert_eq!(h.gatt.count(|c| matches!(c, GattCall::Connect(_))), 1);
    assert_eq!(h.gatt.count(|c| matches!(c, GattCall::Disconnect(_))), 1);
    assert!(t.open_sessions().is_empty());

    block_on(t.deliver(addr(1), FRAME, false)).unwrap();
    assert_eq!(h.gatt.count(|c| matches!(c, GattCall::Connect(_))), 2);
}

#[test]
fn dropped_delivery_leaves_session_rebuildable() {
    let h = Harness::new();
    h.gatt.set_yielding(true);
    let t = h.service.transport();
    {
        let mut fut = pin!(t.deliver(addr(1), FRAME, false));
        assert!(block_on(poll_once(fut.as_mut())).is_none());
    }
    assert_eq!(
        block_on(t.session_state(addr(1))),
        Some(SessionState::Connecting)
    );

    block_on(t.deliver(addr(1), FRAME, false)).unwrap();
    assert_eq!(
        h.gatt.calls(),
        vec![
            GattCall::Connect(addr(1)),
            GattCall::Disconnect(addr(1)),
            GattCall::Connect(addr(1)),
            GattCall::Discover(addr(1)),
            GattCall::Write(addr(1), FRAME.to_vec()),
        ]
    );
}

#[test]
fn different_peers_progress_concurrently() {
    let h = Harness::new();
    h.gatt.set_yielding(true);
    let t = h.service.transport();

    let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();
    let a = executor.spawn(t.deliver(addr(1), FRAME, false));
    let b = executor.spawn(t.deliver(addr(2), FRAME, false));
    let (ra, rb) = block_on(executor.run(async { (a.await, b.await) }));
    assert!(ra.is_ok() && rb.is_ok());

    let calls = h.gatt.calls();
    let first_write = calls
        .iter()
        .position(|c| matches!(c, GattCall::Write(..)))
        .unwrap();
    let second_connect = calls
        .iter()
        .position(|c| *c == GattCall::Connect(addr(2)))
        .unwrap();
    assert!(
        second_connect < first_write,
        "peer 2 should connect while peer 1 is still in flight: {calls:?}"
    );
}

#[test]
fn same_peer_deliveries_are_serialized() {
    let h = Harness::new();
    h.gatt.set_yielding(true);
    let t = h.service.transport();
    let (a, b) = block_on(zip(
        t.deliver(addr(1), FRAME, false),
        t.deliver(addr(1), &[0x03, 0x01, 0x02, 0x00, 0, 0, 0, 0], false),
    ));
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(h.gatt.count(|c| matches!(c, GattCall::Connect(_))), 1);
    assert_eq!(h.gatt.writes_to(addr(1)).len(), 2);
}

#[test]
fn read_uses_the_session() {
    let h = Harness::new();
    h.gatt.set_read_value(addr(1), vec![0xAA]);
    let value = block_on(h.service.transport().read(
        addr(1),
        expand_uuid16(0x184F),
        expand_uuid16(0x2BC8),
    ))
    .unwrap();
    assert_eq!(value, vec![0xAA]);
    block_on(h.service.transport().deliver(addr(1), FRAME, false)).unwrap();
    assert_eq!(h.gatt.count(|c| matches!(c, GattCall::Connect(_))), 1);
}
