#![no_main]

use libfuzzer_sys::fuzz_target;

use anchorstore::core::path::{validate_segments, PathPolicy, UserPathPolicy};

fuzz_target!(|data: &[u8]| {
    if let Ok(path) = std::str::from_utf8(data) {
        let _ = UserPathPolicy.parse(path);
        let _ = validate_segments(path);
    }
});
