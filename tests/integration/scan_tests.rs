//! Scan orchestration through the service facade.

use std::cell::Cell;
use std::rc::Rc;

use auracast_assist::AuracastConfig;
use auracast_assist::app::events::BroadcastEvent;
use auracast_assist::app::ports::Capability;
use auracast_assist::app::service::BroadcastService;
use auracast_assist::error::ScanError;
use auracast_assist::protocol::expand_uuid16;
use auracast_assist::scan::ScanState;
use futures_lite::future::block_on;

use crate::mock_radio::{
    Harness, InstantDelay, MockGatt, MockScanner, RecordingSink, addr, announcement, report,
    subgroup,
};

#[test]
fn scan_filters_on_announcement_marker() {
    let h = Harness::new();
    h.service.start_scan().unwrap();
    let filter = h.scanner.last_filter().unwrap();
    assert_eq!(filter.service_uuid, expand_uuid16(0x1852));
    assert_eq!(h.service.scan_state(), ScanState::Scanning);
}

#[test]
fn list_is_ordered_strongest_first() {
    let h = Harness::new();
    h.service.start_scan().unwrap();
    let p = announcement(1, &[subgroup(0b1, "lang=en")]);
    h.service.on_advertisement(&report(addr(1), -80, p.clone()));
    h.service.on_advertisement(&report(addr(2), -30, p.clone()));
    h.service.on_advertisement(&report(addr(3), -55, p));

    let list = h.service.device_list();
    let order: Vec<_> = list.snapshot().iter().map(|d| d.address).collect();
    assert_eq!(order, vec![addr(2), addr(3), addr(1)]);
}

#[test]
fn reset_clears_strong_entries() {
    let h = Harness::new();
    h.service.start_scan().unwrap();
    h.service
        .on_advertisement(&report(addr(1), -10, announcement(1, &[subgroup(0b1, "")])));
    assert_eq!(h.service.device_list().snapshot().len(), 1);

    h.service.reset_devices();
    assert!(h.service.device_list().snapshot().is_empty());
    assert!(h.sink.events().contains(&BroadcastEvent::DevicesCleared));
}

#[test]
fn channels_survive_packets_that_omit_them() {
    let h = Harness::new();
    h.service.start_scan().unwrap();
    h.service.on_advertisement(&report(
        addr(1),
        -40,
        announcement(9, &[subgroup(0b011, "lang=en")]),
    ));
    let d = h
        .service
        .on_advertisement(&report(addr(1), -42, announcement(9, &[subgroup(0b100, "lang=fr")])))
        .unwrap();
    assert_eq!(d.channel_indexes(), vec![1, 2, 3]);
    assert_eq!(d.rssi, -42);
}

#[test]
fn truncated_payload_still_creates_device() {
    let h = Harness::new();
    h.service.start_scan().unwrap();
    let d = h
        .service
        .on_advertisement(&report(addr(1), -40, vec![0x3C, 0x2B, 0x1A, 0x00]))
        .unwrap();
    assert_eq!(d.broadcast_id, Some(0x1A2B3C));
    assert!(d.bis_channels.is_empty());
}

#[test]
fn redacted_name_is_corrected_once_disclosed() {
    let disclosed = Rc::new(Cell::new(false));
    let grant = Rc::clone(&disclosed);
    let service = BroadcastService::new(
        AuracastConfig::default(),
        MockScanner::default(),
        InstantDelay,
        MockGatt::default(),
        move |capability: Capability| capability != Capability::NameDisclosure || grant.get(),
        RecordingSink::default(),
    );
    service.start_scan().unwrap();

    let d = service
        .on_advertisement(&report(addr(1), -40, announcement(1, &[])))
        .unwrap();
    assert_eq!(d.name, "Unknown Device");

    disclosed.set(true);
    let d = service
        .on_advertisement(&report(addr(1), -42, announcement(1, &[])))
        .unwrap();
    assert_eq!(d.name, "Source 1");
    assert_eq!(service.device_list().snapshot().len(), 1);
    assert_eq!(service.device(&addr(1)).unwrap().name, "Source 1");
}

#[test]
fn single_retry_then_terminal() {
    let h = Harness::new();
    h.service.start_scan().unwrap();
    h.service
        .on_advertisement(&report(addr(1), -10, announcement(1, &[])));

    assert_eq!(block_on(h.service.on_scan_failed(2)), ScanState::Scanning);
    assert!(h.service.device_list().is_empty(), "restart clears the registry");
    assert_eq!(h.scanner.starts(), 2);

    assert_eq!(
        block_on(h.service.on_scan_failed(2)),
        ScanState::Stopped(ScanError::Internal(2))
    );
    assert_eq!(h.scanner.starts(), 2);
    assert!(h.sink.events().contains(&BroadcastEvent::ScanStateChanged {
        from: ScanState::Scanning,
        to: ScanState::Stopped(ScanError::Internal(2)),
    }));
}

#[test]
fn start_after_terminal_stop_begins_new_session() {
    let h = Harness::new();
    h.service.start_scan().unwrap();
    block_on(h.service.on_scan_failed(1));
    block_on(h.service.on_scan_failed(1));
    assert!(matches!(h.service.scan_state(), ScanState::Stopped(_)));

    h.service.start_scan().unwrap();
    assert_eq!(h.service.scan_state(), ScanState::Scanning);
    assert_eq!(block_on(h.service.on_scan_failed(3)), ScanState::Scanning);
}

#[test]
fn scan_start_rejected_by_radio() {
    let h = Harness::new();
    h.scanner.fail_next_starts(Some(ScanError::StartFailed(4)));
    assert_eq!(h.service.start_scan(), Err(ScanError::StartFailed(4)));
    assert_eq!(
        h.service.scan_state(),
        ScanState::Stopped(ScanError::StartFailed(4))
    );
}
