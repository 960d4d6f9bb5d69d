//! Tests for `HandleRegistry`: lifecycle, fault classification, leak reports,
//! occupancy statistics and behaviour under concurrent create/destroy.

use std::{
    sync::{
        Barrier,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

use ahash::AHashSet;
use pretty_assertions::assert_eq;
use tether::{BridgeError, Handle, HandleRegistry, LeakReport, MisuseFault, RawHandle, RegistryStats};

// =============================================================================
// 1. Lifecycle
// =============================================================================

/// A registered value comes back unchanged on deregistration.
#[test]
fn deregister_returns_registered_value() {
    let registry = HandleRegistry::new("test");
    let handle = registry.register(vec!["a".to_owned()]).unwrap();
    assert!(registry.is_live(handle));
    assert_eq!(registry.deregister(handle).unwrap(), vec!["a".to_owned()]);
    assert!(!registry.is_live(handle));
    assert!(registry.is_empty());
}

/// `with` gives mutable access to the stored value.
#[test]
fn with_mutates_in_place() {
    let registry = HandleRegistry::new("test");
    let handle = registry.register(Vec::<u32>::new()).unwrap();
    registry.with(handle, |items| items.extend([1, 2, 3])).unwrap();
    assert_eq!(registry.with(handle, |items| items.clone()).unwrap(), vec![1, 2, 3]);
    registry.deregister(handle).unwrap();
}

/// Every live handle is distinct, and live handles are listed in slot order.
#[test]
fn live_handles_are_distinct_and_ordered() {
    let registry = HandleRegistry::new("test");
    let handles: Vec<Handle> = (0..5).map(|i| registry.register(vec![i]).unwrap()).collect();
    assert_eq!(registry.live_handles(), handles);

    registry.deregister(handles[1]).unwrap();
    registry.deregister(handles[3]).unwrap();
    assert_eq!(registry.live_handles(), vec![handles[0], handles[2], handles[4]]);

    for handle in [handles[0], handles[2], handles[4]] {
        registry.deregister(handle).unwrap();
    }
}

// =============================================================================
// 2. Fault Classification
// =============================================================================

/// Destroying the same handle twice is reported as a double destroy.
#[test]
fn second_deregister_is_double_destroy() {
    let registry = HandleRegistry::new("test");
    let handle = registry.register(Vec::<u8>::new()).unwrap();
    registry.deregister(handle).unwrap();
    assert_eq!(registry.deregister(handle), Err(MisuseFault::DoubleDestroy { handle }));
}

/// A handle whose slot was reused reports as stale, never as the new occupant.
#[test]
fn old_handle_cannot_reach_new_occupant() {
    let registry = HandleRegistry::new("test");
    let old = registry.register(vec![1u8]).unwrap();
    registry.deregister(old).unwrap();
    let new = registry.register(vec![2u8]).unwrap();

    assert!(matches!(registry.get(old), Err(MisuseFault::StaleHandle { .. })));
    assert!(matches!(registry.deregister(old), Err(MisuseFault::StaleHandle { .. })));
    assert_eq!(registry.deregister(new).unwrap(), vec![2u8]);
}

/// A handle never minted by this registry is unknown.
#[test]
fn foreign_handle_is_unknown() {
    let other = HandleRegistry::new("other");
    for _ in 0..3 {
        other.register(Vec::<u8>::new()).unwrap();
    }
    let stray = other.live_handles()[2];

    let registry = HandleRegistry::<Vec<u8>>::new("test");
    assert_eq!(
        registry.get(stray).unwrap_err(),
        MisuseFault::UnknownHandle {
            raw: stray.to_raw().0
        }
    );
}

/// The null raw handle never decodes, so it can never be looked up.
#[test]
fn null_raw_handle_does_not_decode() {
    assert_eq!(Handle::from_raw(RawHandle::NULL), None);
    assert!(RawHandle::NULL.is_null());
}

// =============================================================================
// 3. Leak Diagnostics
// =============================================================================

/// `check_empty` lists every handle still live.
#[test]
fn check_empty_reports_live_handles() {
    let registry = HandleRegistry::new("strings");
    let a = registry.register(Vec::<u8>::new()).unwrap();
    let b = registry.register(Vec::<u8>::new()).unwrap();
    registry.deregister(a).unwrap();

    let report = registry.check_empty().unwrap_err();
    assert_eq!(
        report,
        LeakReport {
            registry: "strings",
            handles: vec![b]
        }
    );
    assert_eq!(report.to_string(), "1 handle(s) still live in 'strings': #1v1");

    registry.deregister(b).unwrap();
    assert_eq!(registry.check_empty(), Ok(()));
}

/// `assert_empty` panics with the leak report.
#[test]
#[should_panic(expected = "still live in 'leaky'")]
fn assert_empty_panics_on_leak() {
    let registry = HandleRegistry::new("leaky");
    registry.register(Vec::<u8>::new()).unwrap();
    registry.assert_empty();
}

/// `drain` releases everything and hands the values back.
#[test]
fn drain_releases_everything() {
    let registry = HandleRegistry::new("test");
    let a = registry.register(vec![1]).unwrap();
    let b = registry.register(vec![2]).unwrap();
    assert_eq!(registry.drain(), vec![(a, vec![1]), (b, vec![2])]);
    assert!(registry.is_empty());
    assert!(matches!(registry.get(a), Err(MisuseFault::DoubleDestroy { .. })));
}

// =============================================================================
// 4. Statistics And Capacity
// =============================================================================

/// Stats track live, free and total slots, and lifetime counters.
#[test]
fn stats_track_slot_reuse() {
    let registry = HandleRegistry::new("test");
    assert_eq!(
        registry.stats(),
        RegistryStats {
            live: 0,
            free_slots: 0,
            total_slots: 0,
            created_total: 0,
            destroyed_total: 0
        }
    );

    let a = registry.register(Vec::<u8>::new()).unwrap();
    let _b = registry.register(Vec::<u8>::new()).unwrap();
    registry.deregister(a).unwrap();
    let stats = registry.stats();
    assert_eq!(stats.live, 1);
    assert_eq!(stats.free_slots, 1);
    assert_eq!(stats.total_slots, 2);

    let _c = registry.register(Vec::<u8>::new()).unwrap();
    let stats = registry.stats();
    assert_eq!(stats.free_slots, 0, "freed slot should be reused");
    assert_eq!(stats.total_slots, 2);
    assert_eq!(stats.created_total - stats.destroyed_total, stats.live as u64);
}

/// A live-handle limit rejects registrations until a handle is released.
#[test]
fn capacity_limit_is_recoverable() {
    let registry = HandleRegistry::new("test").with_max_live(Some(2));
    let a = registry.register(Vec::<u8>::new()).unwrap();
    let _b = registry.register(Vec::<u8>::new()).unwrap();
    assert_eq!(
        registry.register(Vec::new()),
        Err(BridgeError::CapacityExceeded { limit: 2 })
    );

    registry.deregister(a).unwrap();
    assert!(registry.register(Vec::new()).is_ok());
}

// =============================================================================
// 5. Concurrency
// =============================================================================

/// Handles minted concurrently are all distinct.
#[test]
fn concurrent_registrations_are_distinct() {
    let registry = HandleRegistry::new("test");
    let handles: Vec<Handle> = thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    (0..100)
                        .map(|i| registry.register(vec![i]).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        workers.into_iter().flat_map(|worker| worker.join().unwrap()).collect()
    });

    let unique: AHashSet<Handle> = handles.iter().copied().collect();
    assert_eq!(unique.len(), 800);
    assert_eq!(registry.live_count(), 800);
    assert_eq!(registry.drain().len(), 800);
}

/// Racing destroys of one handle produce exactly one success.
#[test]
fn racing_destroys_succeed_once() {
    for _ in 0..50 {
        let registry = HandleRegistry::new("test");
        let handle = registry.register(vec![7u8]).unwrap();
        let barrier = Barrier::new(4);
        let successes = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    barrier.wait();
                    match registry.deregister(handle) {
                        Ok(_) => {
                            successes.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(fault) => assert_eq!(fault, MisuseFault::DoubleDestroy { handle }),
                    }
                });
            }
        });

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }
}
