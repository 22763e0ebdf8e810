#![no_main]

use cairn_core::event::{decode, encode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };
    // Anything that decodes must re-encode and decode to the same event.
    if let Ok(event) = decode(line) {
        let again = encode(&event).expect("decoded events encode");
        assert_eq!(decode(&again).expect("canonical line decodes"), event);
        assert!(serde_json::from_str::<serde_json::Value>(&again).is_ok());
    }
});
