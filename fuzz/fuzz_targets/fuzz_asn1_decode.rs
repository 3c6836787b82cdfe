#![no_main]

use libfuzzer_sys::fuzz_target;

use anchorstore::core::asn1;

fuzz_target!(|data: &[u8]| {
    if let Ok(value) = asn1::decode(data) {
        // Decoded values must re-encode to the same canonical bytes.
        assert_eq!(asn1::encode(&value), data);
    }
});
