//! Sequences implemented on the other side of the boundary.
//!
//! The foreign runtime hands the host a [`SequenceCallbacks`] table with the same
//! five operations the host exposes. [`OwnedSequence`] wraps one handle on any
//! [`SequenceOps`] implementation and destroys it exactly once, when dropped,
//! unless ownership is given away with [`OwnedSequence::into_handle`].

use std::{fmt, marker::PhantomData, sync::OnceLock};

use tracing::{debug, warn};

use crate::{
    bridge,
    error::BridgeResult,
    handle::RawHandle,
    marshal::Marshal,
    proxy::SequenceOps,
    wire::WireBuffer,
};

/// Capability table for one sequence implementation, in C layout.
///
/// Every slot must be a valid function honouring the protocol:
/// - `create` returns a non-null handle, or null after raising a failure;
/// - `add` borrows the element and copies it;
/// - `get_elem` returns an owned buffer allocated with `tether_wire_new`, or null
///   after raising a failure;
/// - `delete` is called exactly once per handle.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct SequenceCallbacks {
    pub create: extern "C" fn() -> RawHandle,
    pub add: extern "C" fn(handle: RawHandle, element: *const WireBuffer),
    pub get_size: extern "C" fn(handle: RawHandle) -> usize,
    pub get_elem: extern "C" fn(handle: RawHandle, index: usize) -> *mut WireBuffer,
    pub delete: extern "C" fn(handle: RawHandle),
}

impl SequenceCallbacks {
    /// Returns `true` if both tables point at the same five functions.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        std::ptr::fn_addr_eq(self.create, other.create)
            && std::ptr::fn_addr_eq(self.add, other.add)
            && std::ptr::fn_addr_eq(self.get_size, other.get_size)
            && std::ptr::fn_addr_eq(self.get_elem, other.get_elem)
            && std::ptr::fn_addr_eq(self.delete, other.delete)
    }
}

impl fmt::Debug for SequenceCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceCallbacks")
            .field("create", &(self.create as *const ()))
            .field("add", &(self.add as *const ()))
            .field("get_size", &(self.get_size as *const ()))
            .field("get_elem", &(self.get_elem as *const ()))
            .field("delete", &(self.delete as *const ()))
            .finish()
    }
}

/// Fails with the foreign side's raised failure if a void callback left one behind.
fn check_raised() -> BridgeResult<()> {
    match bridge::take_last_failure() {
        Some(failure) => Err(crate::BridgeError::Foreign(failure)),
        None => Ok(()),
    }
}

impl SequenceOps for SequenceCallbacks {
    type Handle = RawHandle;
    type Wire = WireBuffer;

    fn create(&self) -> BridgeResult<RawHandle> {
        bridge::clear();
        let handle = (self.create)();
        if handle.is_null() {
            return Err(bridge::foreign_failure("create"));
        }
        Ok(handle)
    }

    fn append(&self, handle: RawHandle, element: &WireBuffer) -> BridgeResult<()> {
        bridge::clear();
        (self.add)(handle, element);
        check_raised()
    }

    fn get_size(&self, handle: RawHandle) -> BridgeResult<usize> {
        bridge::clear();
        let size = (self.get_size)(handle);
        check_raised()?;
        Ok(size)
    }

    fn get_element(&self, handle: RawHandle, index: usize) -> BridgeResult<WireBuffer> {
        bridge::clear();
        let raw = (self.get_elem)(handle, index);
        // SAFETY: per the table contract, a non-null result is an unclaimed buffer
        // from `WireBuffer::into_raw` whose ownership passes to us.
        unsafe { WireBuffer::from_raw(raw) }.ok_or_else(|| bridge::foreign_failure("get_elem"))
    }

    fn destroy(&self, handle: RawHandle) -> BridgeResult<()> {
        bridge::clear();
        (self.delete)(handle);
        check_raised()
    }
}

/// Outcome of a successful [`ForeignSlot::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The table was stored.
    Installed,
    /// The identical table was already stored; nothing changed.
    AlreadyInstalled,
}

/// Rejected [`ForeignSlot::register`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    /// A different table is already registered; tables cannot be replaced.
    #[error("a different callback table is already registered for '{slot}'")]
    Conflict { slot: &'static str },
    /// The table pointer passed across the boundary was null.
    #[error("null callback table for '{slot}'")]
    NullTable { slot: &'static str },
}

/// Write-once home for the callback table of one foreign sequence type.
pub struct ForeignSlot {
    name: &'static str,
    table: OnceLock<SequenceCallbacks>,
}

impl ForeignSlot {
    /// Creates an empty slot.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            table: OnceLock::new(),
        }
    }

    /// Stores `table` unless one is already present.
    ///
    /// Re-registering the same table is a no-op; registering a different one fails.
    pub fn register(&self, table: SequenceCallbacks) -> Result<Registration, RegistrationError> {
        match self.table.set(table) {
            Ok(()) => {
                debug!(slot = self.name, "foreign callbacks registered");
                Ok(Registration::Installed)
            }
            Err(rejected) => {
                if self.table.get().is_some_and(|current| current.same_as(&rejected)) {
                    Ok(Registration::AlreadyInstalled)
                } else {
                    warn!(slot = self.name, "conflicting foreign callbacks rejected");
                    Err(RegistrationError::Conflict { slot: self.name })
                }
            }
        }
    }

    /// The registered table, if any.
    #[must_use]
    pub fn get(&self) -> Option<&SequenceCallbacks> {
        self.table.get()
    }

    /// Name of the slot.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ForeignSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignSlot")
            .field("name", &self.name)
            .field("registered", &self.table.get().is_some())
            .finish()
    }
}

/// Owner of one handle on a [`SequenceOps`] implementation.
///
/// Elements go in and out as host values; the marshaler converts them at the
/// boundary. The handle is destroyed when the owner is dropped.
pub struct OwnedSequence<'a, M, S>
where
    M: Marshal,
    S: SequenceOps<Wire = M::Wire>,
{
    ops: &'a S,
    handle: S::Handle,
    marshal: PhantomData<fn() -> M>,
}

impl<'a, M, S> OwnedSequence<'a, M, S>
where
    M: Marshal,
    S: SequenceOps<Wire = M::Wire>,
{
    /// Creates an empty sequence through `ops`.
    pub fn create(ops: &'a S) -> BridgeResult<Self> {
        let handle = ops.create()?;
        Ok(Self::adopt(ops, handle))
    }

    /// Creates a sequence holding copies of `items`.
    pub fn from_items(ops: &'a S, items: &[M::Host]) -> BridgeResult<Self> {
        let sequence = Self::create(ops)?;
        sequence.extend(items)?;
        Ok(sequence)
    }

    /// Takes ownership of an existing handle.
    ///
    /// The caller gives up the right to destroy `handle` itself.
    #[must_use]
    pub fn adopt(ops: &'a S, handle: S::Handle) -> Self {
        Self {
            ops,
            handle,
            marshal: PhantomData,
        }
    }

    /// The handle this sequence owns.
    #[must_use]
    pub fn handle(&self) -> S::Handle {
        self.handle
    }

    /// Number of elements.
    pub fn len(&self) -> BridgeResult<usize> {
        self.ops.get_size(self.handle)
    }

    /// Returns `true` if the sequence has no elements.
    pub fn is_empty(&self) -> BridgeResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Element at `index`, converted to its host form.
    pub fn get(&self, index: usize) -> BridgeResult<M::Host> {
        let wire = self.ops.get_element(self.handle, index)?;
        Ok(M::to_host(&wire)?)
    }

    /// Appends one element.
    pub fn push(&self, item: &M::Host) -> BridgeResult<()> {
        let wire = M::to_wire(item)?;
        self.ops.append(self.handle, &wire)
    }

    /// Appends every element of `items` in order.
    pub fn extend<'i>(&self, items: impl IntoIterator<Item = &'i M::Host>) -> BridgeResult<()> {
        for item in items {
            self.push(item)?;
        }
        Ok(())
    }

    /// Copies every element into a host vector.
    pub fn to_vec(&self) -> BridgeResult<Vec<M::Host>> {
        self.iter()?.collect()
    }

    /// Iterates over the elements present when the iterator is created.
    pub fn iter(&self) -> BridgeResult<SequenceIter<'_, 'a, M, S>> {
        Ok(SequenceIter {
            sequence: self,
            index: 0,
            len: self.len()?,
        })
    }

    /// Gives up ownership without destroying the handle.
    #[must_use]
    pub fn into_handle(self) -> S::Handle {
        let handle = self.handle;
        std::mem::forget(self);
        handle
    }

    /// Destroys the handle now, reporting any failure.
    pub fn close(self) -> BridgeResult<()> {
        let ops = self.ops;
        ops.destroy(self.into_handle())
    }
}

impl<M, S> Drop for OwnedSequence<'_, M, S>
where
    M: Marshal,
    S: SequenceOps<Wire = M::Wire>,
{
    fn drop(&mut self) {
        if let Err(err) = self.ops.destroy(self.handle) {
            warn!(handle = ?self.handle, error = %err, "failed to destroy sequence on drop");
        }
    }
}

impl<M, S> fmt::Debug for OwnedSequence<'_, M, S>
where
    M: Marshal,
    S: SequenceOps<Wire = M::Wire>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedSequence")
            .field("element", &M::ELEMENT)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Iterator returned by [`OwnedSequence::iter`].
pub struct SequenceIter<'s, 'a, M, S>
where
    M: Marshal,
    S: SequenceOps<Wire = M::Wire>,
{
    sequence: &'s OwnedSequence<'a, M, S>,
    index: usize,
    len: usize,
}

impl<M, S> Iterator for SequenceIter<'_, '_, M, S>
where
    M: Marshal,
    S: SequenceOps<Wire = M::Wire>,
{
    type Item = BridgeResult<M::Host>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.len {
            return None;
        }
        let item = self.sequence.get(self.index);
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.index;
        (remaining, Some(remaining))
    }
}
