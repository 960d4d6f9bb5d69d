//! Tests for `CollectionProxy` through the `SequenceOps` interface and its host
//! helpers.
//!
//! These exercise the safe Rust API, where protocol violations come back as
//! `BridgeError::Misuse` instead of aborting.

use pretty_assertions::assert_eq;
use tether::{
    Binary, BridgeConfig, BridgeError, CapturedFailure, CollectionProxy, ConversionError, FailureKind, LeakPolicy,
    Marshal, MisuseFault, SequenceOps, Text, WireBuffer,
};

fn wire(text: &str) -> WireBuffer {
    WireBuffer::from_bytes(text.as_bytes())
}

fn text_at(proxy: &CollectionProxy<Text>, handle: tether::Handle, index: usize) -> String {
    Text::to_host(&proxy.get_element(handle, index).unwrap()).unwrap()
}

// =============================================================================
// 1. End-To-End Scenario
// =============================================================================

/// create, append twice, size, both elements, an out-of-range read, destroy,
/// then no handle is left live.
#[test]
fn five_step_scenario() {
    let proxy = CollectionProxy::<Text>::default();

    let handle = proxy.create().unwrap();
    proxy.append(handle, &wire("a")).unwrap();
    proxy.append(handle, &wire("b")).unwrap();
    assert_eq!(proxy.get_size(handle).unwrap(), 2);
    assert_eq!(text_at(&proxy, handle, 0), "a");
    assert_eq!(text_at(&proxy, handle, 1), "b");
    assert_eq!(
        proxy.get_element(handle, 2),
        Err(BridgeError::IndexOutOfRange { index: 2, size: 2 })
    );
    proxy.destroy(handle).unwrap();

    assert_eq!(proxy.check_empty(), Ok(()));
    assert!(proxy.live_handles().is_empty());
}

// =============================================================================
// 2. Content Fidelity
// =============================================================================

/// Size after N appends is N, and elements come back in insertion order.
#[test]
fn appends_preserve_count_and_order() {
    let proxy = CollectionProxy::<Text>::default();
    let handle = proxy.create().unwrap();
    assert_eq!(proxy.get_size(handle).unwrap(), 0);

    let items: Vec<String> = (0..100).map(|i| format!("item-{i}")).collect();
    for (n, item) in items.iter().enumerate() {
        proxy.append(handle, &wire(item)).unwrap();
        assert_eq!(proxy.get_size(handle).unwrap(), n + 1);
    }
    for (i, item) in items.iter().enumerate() {
        assert_eq!(&text_at(&proxy, handle, i), item);
    }
    proxy.destroy(handle).unwrap();
}

/// Empty, multi-byte and embedded-NUL strings survive the wire unchanged.
#[test]
fn text_round_trips_through_the_wire() {
    let proxy = CollectionProxy::<Text>::default();
    let handle = proxy.create().unwrap();
    let samples = ["", "plain", "naïve café", "日本語", "emoji 🦀", "nul\0inside"];
    for sample in samples {
        proxy.append(handle, &wire(sample)).unwrap();
    }
    for (i, sample) in samples.iter().enumerate() {
        assert_eq!(text_at(&proxy, handle, i), *sample);
    }
    proxy.destroy(handle).unwrap();
}

/// Arbitrary bytes survive a binary proxy unchanged.
#[test]
fn binary_elements_are_copied_verbatim() {
    let proxy = CollectionProxy::<Binary>::default();
    let handle = proxy.create().unwrap();
    let payload = vec![0x00, 0xff, 0xc3, 0x28, 0x7f];
    proxy.append(handle, &WireBuffer::from_bytes(&payload)).unwrap();
    let element = proxy.get_element(handle, 0).unwrap();
    assert_eq!(Binary::to_host(&element).unwrap(), payload);
    proxy.destroy(handle).unwrap();
}

/// Two collections never see each other's elements.
#[test]
fn handles_are_isolated() {
    let proxy = CollectionProxy::<Text>::default();
    let left = proxy.create().unwrap();
    let right = proxy.create().unwrap();
    assert_ne!(left, right);

    proxy.append(left, &wire("l1")).unwrap();
    proxy.append(right, &wire("r1")).unwrap();
    proxy.append(left, &wire("l2")).unwrap();

    assert_eq!(proxy.snapshot(left).unwrap(), ["l1", "l2"]);
    assert_eq!(proxy.snapshot(right).unwrap(), ["r1"]);

    proxy.destroy(left).unwrap();
    assert_eq!(proxy.snapshot(right).unwrap(), ["r1"]);
    proxy.destroy(right).unwrap();
}

/// The element handed out is a copy: later appends don't disturb it.
#[test]
fn returned_element_is_an_independent_copy() {
    let proxy = CollectionProxy::<Text>::default();
    let handle = proxy.create().unwrap();
    proxy.append(handle, &wire("first")).unwrap();
    let element = proxy.get_element(handle, 0).unwrap();
    proxy.destroy(handle).unwrap();
    assert_eq!(element.as_bytes(), b"first");
}

// =============================================================================
// 3. Recoverable Failures
// =============================================================================

/// Indexing at or past the size is an out-of-range error carrying both numbers.
#[test]
fn out_of_range_index_is_reported() {
    let proxy = CollectionProxy::<Text>::default();
    let handle = proxy.create().unwrap();
    assert_eq!(
        proxy.get_element(handle, 0),
        Err(BridgeError::IndexOutOfRange { index: 0, size: 0 })
    );

    proxy.append(handle, &wire("a")).unwrap();
    proxy.append(handle, &wire("b")).unwrap();
    assert_eq!(
        proxy.get_element(handle, 2),
        Err(BridgeError::IndexOutOfRange { index: 2, size: 2 })
    );
    assert_eq!(
        proxy.get_element(handle, usize::MAX),
        Err(BridgeError::IndexOutOfRange {
            index: usize::MAX,
            size: 2
        })
    );
    proxy.destroy(handle).unwrap();
}

/// A negative index is out of range, never counted from the end.
#[test]
fn negative_index_is_out_of_range() {
    let proxy = CollectionProxy::<Text>::default();
    let handle = proxy.create().unwrap();
    proxy.append(handle, &wire("a")).unwrap();

    let err = proxy.get_element_signed(handle, -1).unwrap_err();
    assert_eq!(err, BridgeError::NegativeIndex { index: -1, size: 1 });
    assert_eq!(err.to_string(), "index -1 out of range for sequence of size 1");
    assert_eq!(CapturedFailure::from_error(&err).kind(), FailureKind::IndexOutOfRange);
    assert_eq!(Text::to_host(&proxy.get_element_signed(handle, 0).unwrap()).unwrap(), "a");

    proxy.destroy(handle).unwrap();
    assert!(proxy.get_element_signed(handle, -1).unwrap_err().is_misuse());
}

/// A failed conversion leaves the collection untouched.
#[test]
fn invalid_utf8_append_is_rejected() {
    let proxy = CollectionProxy::<Text>::default();
    let handle = proxy.create().unwrap();
    proxy.append(handle, &wire("ok")).unwrap();

    let bad = WireBuffer::from_bytes(b"\xc3\x28");
    assert_eq!(
        proxy.append(handle, &bad),
        Err(BridgeError::Conversion(ConversionError::InvalidUtf8 { valid_up_to: 0 }))
    );
    assert_eq!(proxy.get_size(handle).unwrap(), 1);
    proxy.destroy(handle).unwrap();
}

/// The element size limit applies to appends, pushes and exposed collections.
#[test]
fn element_size_limit_applies_everywhere() {
    let proxy = CollectionProxy::<Text>::new(BridgeConfig::new().max_element_bytes(4));
    let handle = proxy.create().unwrap();
    proxy.append(handle, &wire("four")).unwrap();

    let too_large = BridgeError::Conversion(ConversionError::TooLarge { len: 5, limit: 4 });
    assert_eq!(proxy.append(handle, &wire("fives")), Err(too_large.clone()));
    assert_eq!(proxy.push(handle, "fives".to_owned()), Err(too_large.clone()));
    assert_eq!(proxy.expose(vec!["fives".to_owned()]), Err(too_large));
    assert_eq!(proxy.get_size(handle).unwrap(), 1);
    proxy.destroy(handle).unwrap();
    proxy.assert_empty();
}

/// The live-handle limit surfaces as a capacity error, not a fault.
#[test]
fn live_handle_limit_is_capacity_error() {
    let proxy = CollectionProxy::<Text>::new(BridgeConfig::new().max_live_handles(1));
    let handle = proxy.create().unwrap();
    assert_eq!(proxy.create(), Err(BridgeError::CapacityExceeded { limit: 1 }));
    proxy.destroy(handle).unwrap();
    let again = proxy.create().unwrap();
    proxy.destroy(again).unwrap();
}

// =============================================================================
// 4. Protocol Violations
// =============================================================================

/// Destroying twice is detected; the second call changes nothing.
#[test]
fn double_destroy_is_detected() {
    let proxy = CollectionProxy::<Text>::default();
    let handle = proxy.create().unwrap();
    proxy.destroy(handle).unwrap();

    let err = proxy.destroy(handle).unwrap_err();
    assert!(err.is_misuse());
    assert_eq!(err, BridgeError::Misuse(MisuseFault::DoubleDestroy { handle }));
    assert_eq!(proxy.stats().destroyed_total, 1);
}

/// Every operation on a destroyed handle is misuse.
#[test]
fn destroyed_handle_is_unusable() {
    let proxy = CollectionProxy::<Text>::default();
    let handle = proxy.create().unwrap();
    proxy.destroy(handle).unwrap();

    assert!(proxy.append(handle, &wire("x")).unwrap_err().is_misuse());
    assert!(proxy.get_size(handle).unwrap_err().is_misuse());
    assert!(proxy.get_element(handle, 0).unwrap_err().is_misuse());
}

/// A destroyed handle is misuse even when the element itself would be rejected.
#[test]
fn destroyed_handle_is_checked_before_the_element() {
    let proxy = CollectionProxy::<Text>::new(BridgeConfig::new().max_element_bytes(4));
    let handle = proxy.create().unwrap();
    proxy.destroy(handle).unwrap();

    let invalid_utf8 = proxy.append(handle, &WireBuffer::from_bytes(b"\xff")).unwrap_err();
    assert_eq!(invalid_utf8, BridgeError::Misuse(MisuseFault::DoubleDestroy { handle }));
    let oversized = proxy.append(handle, &wire("toolong")).unwrap_err();
    assert_eq!(oversized, BridgeError::Misuse(MisuseFault::DoubleDestroy { handle }));
    let pushed = proxy.push(handle, "toolong".to_owned()).unwrap_err();
    assert_eq!(pushed, BridgeError::Misuse(MisuseFault::DoubleDestroy { handle }));
}

/// A handle from one proxy means nothing to another.
#[test]
fn handle_from_other_proxy_is_unknown() {
    let first = CollectionProxy::<Text>::default();
    let second = CollectionProxy::<Text>::default();
    first.create().unwrap();
    let handle = first.create().unwrap();

    assert_eq!(
        second.get_size(handle),
        Err(BridgeError::Misuse(MisuseFault::UnknownHandle {
            raw: handle.to_raw().0
        }))
    );
    first.shutdown().unwrap();
}

// =============================================================================
// 5. Host Helpers
// =============================================================================

/// An exposed host collection is visible through the handle and can be reclaimed.
#[test]
fn expose_and_reclaim() {
    let proxy = CollectionProxy::<Text>::default();
    let handle = proxy.expose(vec!["x".to_owned(), "y".to_owned()]).unwrap();
    assert_eq!(proxy.get_size(handle).unwrap(), 2);
    assert_eq!(text_at(&proxy, handle, 0), "x");

    proxy.append(handle, &wire("z")).unwrap();
    proxy.push(handle, "w".to_owned()).unwrap();
    assert_eq!(proxy.reclaim(handle).unwrap(), ["x", "y", "z", "w"]);
    assert!(proxy.destroy(handle).unwrap_err().is_misuse());
    proxy.assert_empty();
}

/// Clean shutdown reports nothing leaked.
#[test]
fn shutdown_clean() {
    let proxy = CollectionProxy::<Text>::default();
    let handle = proxy.create().unwrap();
    proxy.destroy(handle).unwrap();
    assert_eq!(proxy.shutdown(), Ok(0));
}

/// Leaks are released at shutdown; the policy decides whether that is an error.
#[test]
fn shutdown_applies_leak_policy() {
    for policy in [LeakPolicy::Ignore, LeakPolicy::Warn] {
        let proxy = CollectionProxy::<Text>::new(BridgeConfig::new().leak_policy(policy));
        proxy.create().unwrap();
        proxy.create().unwrap();
        assert_eq!(proxy.shutdown(), Ok(2), "policy {policy:?}");
        assert!(proxy.live_handles().is_empty());
    }

    let proxy = CollectionProxy::<Text>::new(BridgeConfig::new().leak_policy(LeakPolicy::Fail));
    let leaked = proxy.create().unwrap();
    let report = proxy.shutdown().unwrap_err();
    assert_eq!(report.registry, "string");
    assert_eq!(report.handles, vec![leaked]);
    assert!(proxy.live_handles().is_empty(), "leaks are released even under fail");
}

/// Stats follow the proxy's create/destroy traffic.
#[test]
fn stats_follow_traffic() {
    let proxy = CollectionProxy::<Text>::default();
    let handles: Vec<_> = (0..3).map(|_| proxy.create().unwrap()).collect();
    proxy.destroy(handles[0]).unwrap();

    let stats = proxy.stats();
    assert_eq!(stats.live, 2);
    assert_eq!(stats.created_total, 3);
    assert_eq!(stats.destroyed_total, 1);
    assert_eq!(proxy.shutdown(), Ok(2));
}
