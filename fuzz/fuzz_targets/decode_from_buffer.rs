#![no_main]

use libfuzzer_sys::fuzz_target;
use stampcut::engine::{decode_rgba, FirewallConfig};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    // only panics matter; malformed input must surface as Err
    let _ = decode_rgba(data, &FirewallConfig::strict());
});
