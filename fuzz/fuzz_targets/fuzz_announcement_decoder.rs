//! Fuzz target: `decode_broadcast_info`
//!
//! Drives arbitrary bytes through the announcement decoder and asserts
//! that it never panics, only emits indexes 1..=8, and that any prefix
//! of the input decodes to a prefix of the full channel list.
//!
//! cargo fuzz run fuzz_announcement_decoder

#![no_main]

use auracast_assist::codec::decode_broadcast_info;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let info = decode_broadcast_info(data);
    assert!(info.channels.iter().all(|c| (1..=8).contains(&c.index)));
    if data.len() < 4 {
        assert!(info.is_empty());
        return;
    }

    let half = decode_broadcast_info(&data[..data.len() / 2]);
    assert!(half.channels.len() <= info.channels.len());
    assert_eq!(&info.channels[..half.channels.len()], &half.channels[..]);
});
