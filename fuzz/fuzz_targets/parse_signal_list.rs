/*
 * fuzz_targets/parse_signal_list.rs
 *
 * what RAISETRACE_SIGNALS goes through. Accepted lists never contain
 * KILL/STOP and never contain duplicates.
 */

#![no_main]

use libfuzzer_sys::fuzz_target;
use raisetrace::signal::parse_signal_list;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = core::str::from_utf8(data) {
        if let Ok(list) = parse_signal_list(s) {
            assert!(list.iter().all(|sig| sig.is_catchable()));
            for (i, sig) in list.iter().enumerate() {
                assert!(!list[i + 1..].contains(sig));
            }
        }
    }
});
