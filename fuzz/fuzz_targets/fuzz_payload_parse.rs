#![no_main]

use libfuzzer_sys::fuzz_target;

use anchorstore::core::types::ObjectPayload;

fuzz_target!(|data: &[u8]| {
    if let Ok(payload) = ObjectPayload::from_bytes(data) {
        let bytes = payload.to_bytes().expect("reencode");
        let again = ObjectPayload::from_bytes(&bytes).expect("reparse");
        assert_eq!(again, payload);
    }
});
