//! Generation-checked registry of live handles.
//!
//! The registry is an arena of slots. Each slot carries a generation counter that
//! advances whenever the slot is reused, and freed slots go on a free list for the
//! next registration. A handle therefore resolves only while the exact collection
//! it was minted for is live: a destroyed handle is reported as
//! [`MisuseFault::DoubleDestroy`] until its slot is reused, and as
//! [`MisuseFault::StaleHandle`] afterwards. A slot whose generation reaches
//! `u32::MAX` is retired rather than reused, so generations never wrap.
//!
//! The slot table sits behind a single `RwLock` so that registration and
//! deregistration are atomic with respect to each other. Each collection has its
//! own mutex, so operations on different handles never contend beyond the brief
//! table lookup.

use std::{fmt, sync::Arc};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, trace};

use crate::{
    error::{BridgeError, BridgeResult, MisuseFault},
    handle::Handle,
};

/// Snapshot of registry occupancy.
///
/// `created_total - destroyed_total == live` holds at every quiescent point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Handles currently live.
    pub live: usize,
    /// Vacant slots waiting on the free list.
    pub free_slots: usize,
    /// Slots ever allocated (live, free and retired).
    pub total_slots: usize,
    /// Handles minted since the registry was created.
    pub created_total: u64,
    /// Handles released since the registry was created.
    pub destroyed_total: u64,
}

/// Handles that were still live when the registry was expected to be empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} handle(s) still live in '{registry}': {}", .handles.len(), DisplayHandles(.handles))]
pub struct LeakReport {
    /// Name of the registry that leaked.
    pub registry: &'static str,
    /// Every handle that was live, in slot order.
    pub handles: Vec<Handle>,
}

struct DisplayHandles<'a>(&'a [Handle]);

impl fmt::Display for DisplayHandles<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, handle) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{handle}")?;
        }
        Ok(())
    }
}

/// Arena of host-owned values addressed by [`Handle`].
pub struct HandleRegistry<T> {
    label: &'static str,
    max_live: Option<usize>,
    slots: RwLock<Slots<T>>,
}

struct Slots<T> {
    entries: Vec<Slot<T>>,
    /// Indices of vacant slots, consumed by `register`.
    free_list: Vec<u32>,
    live: usize,
    created_total: u64,
    destroyed_total: u64,
}

struct Slot<T> {
    generation: u32,
    value: Option<Arc<Mutex<T>>>,
}

impl<T> Slots<T> {
    fn resolve(&self, handle: Handle) -> Result<&Arc<Mutex<T>>, MisuseFault> {
        let Some(slot) = self.entries.get(handle.index() as usize) else {
            return Err(MisuseFault::UnknownHandle {
                raw: handle.to_raw().0,
            });
        };
        if slot.generation != handle.generation() {
            // a generation ahead of the slot was never minted
            return Err(if handle.generation() < slot.generation {
                MisuseFault::StaleHandle {
                    handle,
                    current: slot.generation,
                }
            } else {
                MisuseFault::UnknownHandle {
                    raw: handle.to_raw().0,
                }
            });
        }
        slot.value.as_ref().ok_or(MisuseFault::DoubleDestroy { handle })
    }
}

impl<T> HandleRegistry<T> {
    /// Creates an empty registry.
    ///
    /// `label` names the registry in logs and leak reports.
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            max_live: None,
            slots: RwLock::new(Slots {
                entries: Vec::new(),
                free_list: Vec::new(),
                live: 0,
                created_total: 0,
                destroyed_total: 0,
            }),
        }
    }

    /// Limits the number of simultaneously live handles.
    #[must_use]
    pub fn with_max_live(mut self, limit: Option<usize>) -> Self {
        self.max_live = limit;
        self
    }

    /// Name of this registry.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Stores `value` and mints a handle for it.
    ///
    /// Fails with [`BridgeError::CapacityExceeded`] when the live-handle budget is
    /// spent, and with [`MisuseFault::DuplicateRegistration`] if the free list ever
    /// hands out a slot that is still occupied.
    pub fn register(&self, value: T) -> BridgeResult<Handle> {
        let mut guard = self.slots.write();
        let slots = &mut *guard;
        if let Some(limit) = self.max_live
            && slots.live >= limit
        {
            return Err(BridgeError::CapacityExceeded { limit });
        }

        let handle = if let Some(index) = slots.free_list.pop() {
            let slot = &mut slots.entries[index as usize];
            if slot.value.is_some() {
                return Err(MisuseFault::DuplicateRegistration {
                    handle: Handle::new(index, slot.generation),
                }
                .into());
            }
            // retired slots never reach the free list, so this cannot overflow
            slot.generation += 1;
            slot.value = Some(Arc::new(Mutex::new(value)));
            Handle::new(index, slot.generation)
        } else {
            let Ok(index) = u32::try_from(slots.entries.len()) else {
                return Err(BridgeError::CapacityExceeded {
                    limit: u32::MAX as usize,
                });
            };
            slots.entries.push(Slot {
                generation: Handle::FIRST_GENERATION,
                value: Some(Arc::new(Mutex::new(value))),
            });
            Handle::new(index, Handle::FIRST_GENERATION)
        };

        slots.live += 1;
        slots.created_total += 1;
        trace!(registry = self.label, %handle, live = slots.live, "handle registered");
        Ok(handle)
    }

    /// Returns the shared cell holding the value for a live handle.
    pub fn get(&self, handle: Handle) -> Result<Arc<Mutex<T>>, MisuseFault> {
        self.slots.read().resolve(handle).cloned()
    }

    /// Runs `f` with exclusive access to the value behind `handle`.
    ///
    /// The slot table lock is released before `f` runs; only the value's own
    /// mutex is held.
    pub fn with<R>(&self, handle: Handle, f: impl FnOnce(&mut T) -> R) -> Result<R, MisuseFault> {
        let cell = self.get(handle)?;
        let mut value = cell.lock();
        Ok(f(&mut value))
    }

    /// Returns `true` if `handle` currently resolves.
    #[must_use]
    pub fn is_live(&self, handle: Handle) -> bool {
        self.slots.read().resolve(handle).is_ok()
    }

    /// Removes `handle` from the live set and returns its value.
    ///
    /// The slot goes back on the free list and its generation advances on reuse.
    /// A slot whose generation is exhausted is retired instead.
    pub fn deregister(&self, handle: Handle) -> Result<T, MisuseFault>
    where
        T: Default,
    {
        let cell = {
            let mut guard = self.slots.write();
            let slots = &mut *guard;
            slots.resolve(handle)?;
            let cell = slots.entries[handle.index() as usize]
                .value
                .take()
                .ok_or(MisuseFault::DoubleDestroy { handle })?;
            if handle.generation() == u32::MAX {
                // reusing it would wrap the generation and revive old handles
                debug!(registry = self.label, %handle, "slot retired");
            } else {
                slots.free_list.push(handle.index());
            }
            slots.live -= 1;
            slots.destroyed_total += 1;
            trace!(registry = self.label, %handle, live = slots.live, "handle deregistered");
            cell
        };
        // another thread may still be inside an operation on this handle
        Ok(match Arc::try_unwrap(cell) {
            Ok(value) => value.into_inner(),
            Err(shared) => std::mem::take(&mut *shared.lock()),
        })
    }

    /// Number of live handles.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.slots.read().live
    }

    /// Returns `true` if no handle is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_count() == 0
    }

    /// Lists live handles in slot order.
    #[must_use]
    pub fn live_handles(&self) -> Vec<Handle> {
        let slots = self.slots.read();
        slots
            .entries
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.value.as_ref()?;
                Some(Handle::new(u32::try_from(index).ok()?, slot.generation))
            })
            .collect()
    }

    /// Checks that every exposed value has been destroyed.
    pub fn check_empty(&self) -> Result<(), LeakReport> {
        let handles = self.live_handles();
        if handles.is_empty() {
            Ok(())
        } else {
            Err(LeakReport {
                registry: self.label,
                handles,
            })
        }
    }

    /// Panics with a leak report if any handle is live.
    ///
    /// Intended for tests and shutdown diagnostics.
    pub fn assert_empty(&self) {
        if let Err(report) = self.check_empty() {
            panic!("{report}");
        }
    }

    /// Deregisters every live handle, returning the handles with their values.
    pub fn drain(&self) -> Vec<(Handle, T)>
    where
        T: Default,
    {
        self.live_handles()
            .into_iter()
            .filter_map(|handle| self.deregister(handle).ok().map(|value| (handle, value)))
            .collect()
    }

    /// Returns a snapshot of registry occupancy.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let slots = self.slots.read();
        RegistryStats {
            live: slots.live,
            free_slots: slots.free_list.len(),
            total_slots: slots.entries.len(),
            created_total: slots.created_total,
            destroyed_total: slots.destroyed_total,
        }
    }
}

impl<T> fmt::Debug for HandleRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("label", &self.label)
            .field("max_live", &self.max_live)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reused_slot_rejects_old_handle_as_stale() {
        let registry = HandleRegistry::<Vec<u8>>::new("test");
        let first = registry.register(vec![1]).unwrap();
        registry.deregister(first).unwrap();
        let second = registry.register(vec![2]).unwrap();

        assert_eq!(first.index(), second.index());
        assert_eq!(second.generation(), first.generation() + 1);
        assert_eq!(
            registry.get(first).unwrap_err(),
            MisuseFault::StaleHandle {
                handle: first,
                current: second.generation()
            }
        );
    }

    #[test]
    fn future_generation_is_unknown() {
        let registry = HandleRegistry::<Vec<u8>>::new("test");
        let handle = registry.register(Vec::new()).unwrap();
        let forged = Handle::new(handle.index(), handle.generation() + 5);
        assert!(matches!(registry.get(forged), Err(MisuseFault::UnknownHandle { .. })));
    }

    #[test]
    fn occupied_free_slot_is_a_duplicate_registration() {
        let registry = HandleRegistry::<Vec<u8>>::new("test");
        let handle = registry.register(Vec::new()).unwrap();
        // corrupt the free list so it hands out a live slot
        registry.slots.write().free_list.push(handle.index());
        assert_eq!(
            registry.register(Vec::new()),
            Err(BridgeError::Misuse(MisuseFault::DuplicateRegistration { handle }))
        );
    }

    #[test]
    fn exhausted_slot_is_retired() {
        let registry = HandleRegistry::<Vec<u8>>::new("test");
        let first = registry.register(Vec::new()).unwrap();
        registry.slots.write().entries[first.index() as usize].generation = u32::MAX;
        let last = Handle::new(first.index(), u32::MAX);
        registry.deregister(last).unwrap();

        let stats = registry.stats();
        assert_eq!((stats.live, stats.free_slots, stats.total_slots), (0, 0, 1));

        let next = registry.register(Vec::new()).unwrap();
        assert_ne!(next.index(), last.index());
        assert_eq!(next.generation(), Handle::FIRST_GENERATION);
        assert_eq!(registry.get(last).unwrap_err(), MisuseFault::DoubleDestroy { handle: last });
    }
}
