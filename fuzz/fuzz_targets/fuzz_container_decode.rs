#![no_main]

use libfuzzer_sys::fuzz_target;

use anchorstore::core::container::Container;

// Hostile container bytes must never panic the parser; any outcome other
// than a typed error or a parsed container is a bug.
fuzz_target!(|data: &[u8]| {
    if let Ok(container) = Container::from_encoded(data, &[]) {
        let _ = container.plaintext();
        let _ = container.verify_signature();
        let _ = container.encode();
    }
});
