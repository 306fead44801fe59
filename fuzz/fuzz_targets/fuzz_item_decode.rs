#![no_main]

use libfuzzer_sys::fuzz_target;
use settingsdb_core::Item;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bucket values must decode or fail cleanly
    if let Ok(item) = Item::from_slice(data) {
        // Anything that decodes must re-encode and decode to the same item
        let encoded = item.to_json().expect("encode decoded item");
        let again = Item::from_slice(&encoded).expect("decode re-encoded item");
        assert_eq!(item, again);
    }
});
