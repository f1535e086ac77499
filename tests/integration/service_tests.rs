//! Facade-level flows: receive-state refresh and the observable list.

use auracast_assist::error::{DeliveryError, ReceiveStateError, RefreshError};
use auracast_assist::protocol::expand_uuid16;
use auracast_assist::selection::SelectionOutcome;
use futures_lite::future::block_on;

use crate::mock_radio::{GattCall, Harness, addr, receive_state};

#[test]
fn refresh_sets_source_id_and_seeds_selection() {
    let h = Harness::new();
    h.discovered(addr(1), &[(1, "en"), (2, "hi")]);
    h.gatt.set_read_value(addr(1), receive_state(4, 0x1A2B3C, &[0b10]));

    let state = block_on(h.service.refresh_source(addr(1))).unwrap().unwrap();
    assert_eq!(state.source_id, 4);
    assert!(h
        .gatt
        .calls()
        .contains(&GattCall::Read(addr(1), expand_uuid16(0x2BC8))));

    let device = h.service.device(&addr(1)).unwrap();
    assert_eq!(device.source_id, Some(4));
    assert_eq!(device.selected_bis_indexes, vec![2]);

    // Already joined per the delegator: the next selection is a Modify.
    let outcome = block_on(h.service.select_channels(&device, &[1]));
    assert!(outcome.is_success());
    assert_eq!(h.gatt.writes_to(addr(1))[0][0], 0x03);
}

#[test]
fn refresh_with_empty_slot_changes_nothing() {
    let h = Harness::new();
    h.discovered(addr(1), &[(1, "en")]);
    let before = h.service.device(&addr(1)).unwrap();
    h.gatt.set_read_value(addr(1), Vec::new());
    assert_eq!(block_on(h.service.refresh_source(addr(1))), Ok(None));
    assert_eq!(h.service.device(&addr(1)).unwrap(), before);
}

#[test]
fn refresh_reports_truncated_value() {
    let h = Harness::new();
    h.gatt.set_read_value(addr(1), vec![1, 0, 1]);
    assert_eq!(
        block_on(h.service.refresh_source(addr(1))),
        Err(RefreshError::Decode(ReceiveStateError::Truncated))
    );
}

#[test]
fn refresh_reports_transport_failure() {
    let h = Harness::new();
    h.gatt
        .fail_connect(addr(1), auracast_assist::error::GattError::PeerNotFound);
    assert_eq!(
        block_on(h.service.refresh_source(addr(1))),
        Err(RefreshError::Delivery(DeliveryError::PeerNotFound))
    );
}

#[test]
fn device_list_wakes_on_change() {
    let h = Harness::new();
    let list = h.service.device_list();
    let v0 = list.version();
    h.discovered(addr(1), &[(1, "en")]);
    let v = block_on(list.changed());
    assert!(v > v0);
    assert_eq!(list.snapshot()[0].address, addr(1));
}

#[test]
fn stopping_scan_does_not_cancel_delivery() {
    let h = Harness::new();
    h.discovered(addr(1), &[(1, "en")]);
    let device = h.service.device(&addr(1)).unwrap();
    h.service.stop_scan();
    assert!(matches!(
        block_on(h.service.select_channels(&device, &[1])),
        SelectionOutcome::Success { .. }
    ));
}
