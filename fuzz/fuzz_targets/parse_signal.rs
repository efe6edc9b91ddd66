/*
 * fuzz_targets/parse_signal.rs
 *
 * parse_signal must never panic, and whatever it accepts must roundtrip
 * through its number.
 *
 * edge cases: "SIG", "sigé", "999", "-1", "  segv ", ""
 */

#![no_main]

use libfuzzer_sys::fuzz_target;
use raisetrace::signal::{Signal, parse_signal};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = core::str::from_utf8(data) {
        if let Ok(sig) = parse_signal(s) {
            assert_eq!(Signal::try_from_raw(sig.as_raw()), Some(sig));
        }
    }
});
