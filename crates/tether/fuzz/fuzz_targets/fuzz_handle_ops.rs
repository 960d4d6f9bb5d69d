//! Fuzz target: random sequences of proxy operations against a model.
//!
//! Each input byte pair picks an operation and an operand. The proxy is checked
//! against a plain `Vec<Option<Vec<String>>>` model after every step: sizes and
//! elements agree, operations on destroyed handles are misuse, and after the
//! final shutdown nothing is left live.

#![no_main]

use libfuzzer_sys::fuzz_target;

use tether::{BridgeError, CollectionProxy, Handle, Marshal, SequenceOps, Text, WireBuffer};

fuzz_target!(|data: &[u8]| {
    if data.len() > 4096 {
        return;
    }

    let proxy = CollectionProxy::<Text>::default();
    // every handle ever created, with the model contents while live
    let mut handles: Vec<(Handle, Option<Vec<String>>)> = Vec::new();

    for pair in data.chunks_exact(2) {
        let (op, arg) = (pair[0] % 5, usize::from(pair[1]));
        if op == 0 || handles.is_empty() {
            let handle = proxy.create().unwrap();
            handles.push((handle, Some(Vec::new())));
            continue;
        }

        let slot = arg % handles.len();
        let (handle, model) = &mut handles[slot];
        let handle = *handle;
        match (op, model.as_mut()) {
            (1, Some(items)) => {
                let item = format!("e{arg}");
                proxy.append(handle, &WireBuffer::from_bytes(item.as_bytes())).unwrap();
                items.push(item);
            }
            (2, Some(items)) => assert_eq!(proxy.get_size(handle).unwrap(), items.len()),
            (3, Some(items)) => match proxy.get_element(handle, arg) {
                Ok(wire) => assert_eq!(Text::to_host(&wire).unwrap(), items[arg]),
                Err(BridgeError::IndexOutOfRange { index, size }) => {
                    assert_eq!((index, size), (arg, items.len()));
                }
                Err(err) => panic!("unexpected error {err}"),
            },
            (4, Some(_)) => {
                proxy.destroy(handle).unwrap();
                *model = None;
            }
            (_, None) => assert!(proxy.get_size(handle).unwrap_err().is_misuse()),
            _ => unreachable!(),
        }
    }

    let live = handles.iter().filter(|(_, model)| model.is_some()).count();
    assert_eq!(proxy.live_handles().len(), live);
    assert_eq!(proxy.shutdown(), Ok(live));
    proxy.assert_empty();
});
