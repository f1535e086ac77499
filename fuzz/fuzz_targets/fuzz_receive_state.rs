//! Fuzz target: `decode_receive_state`
//!
//! Arbitrary characteristic values must decode or fail with `Truncated`,
//! never panic.
//!
//! cargo fuzz run fuzz_receive_state

#![no_main]

use auracast_assist::codec::receive_state::decode_receive_state;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(Some(state)) = decode_receive_state(data) {
        assert!(state.synced_indexes().iter().all(|i| (1..=32).contains(i)));
    }
});
