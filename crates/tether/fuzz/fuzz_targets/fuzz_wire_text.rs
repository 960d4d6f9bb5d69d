//! Fuzz target: decode arbitrary bytes as a text element.
//!
//! Any byte string must either decode to exactly the same UTF-8 text or be
//! rejected as a conversion error. Decoding never panics, and accepted text
//! re-encodes to the original bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;

use tether::{CollectionProxy, Marshal, SequenceOps, Text, WireBuffer};

fuzz_target!(|data: &[u8]| {
    let wire = WireBuffer::from_bytes(data);
    match Text::to_host(&wire) {
        Ok(text) => {
            assert_eq!(text.as_bytes(), data);
            assert_eq!(Text::to_wire(&text).unwrap().as_bytes(), data);
        }
        Err(_) => assert!(std::str::from_utf8(data).is_err()),
    }

    // Appending goes through the same decoding, and a rejected element leaves no trace.
    let proxy = CollectionProxy::<Text>::default();
    let handle = proxy.create().unwrap();
    let accepted = proxy.append(handle, &wire).is_ok();
    assert_eq!(proxy.get_size(handle).unwrap(), usize::from(accepted));
    proxy.destroy(handle).unwrap();
    proxy.assert_empty();
});
