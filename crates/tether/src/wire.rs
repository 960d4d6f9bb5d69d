//! Boundary-crossing element buffers.
//!
//! A [`WireBuffer`] is a length-prefixed byte buffer with a C layout. Buffers are
//! always allocated by this library, either by the host while converting an
//! element or by foreign code through `tether_wire_new`, and are released with
//! `tether_wire_free` (or by dropping them on the Rust side). That keeps one
//! allocator responsible for every buffer regardless of which side produced it.
//!
//! Ownership follows the callback it travels through: an element returned by
//! `get_elem` belongs to the caller; an element passed to `add` is only borrowed
//! by the callee, which copies what it needs.

use std::{fmt, ptr, slice};

/// Owned byte buffer with a stable C layout.
#[repr(C)]
pub struct WireBuffer {
    data: *mut u8,
    len: usize,
}

// SAFETY: a WireBuffer exclusively owns its allocation; nothing else aliases it.
unsafe impl Send for WireBuffer {}
// SAFETY: shared access only reads the immutable byte range.
unsafe impl Sync for WireBuffer {}

impl WireBuffer {
    /// Copies `bytes` into a new buffer.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::from_boxed(bytes.into())
    }

    /// Takes ownership of an already-boxed byte slice without copying.
    #[must_use]
    pub fn from_boxed(bytes: Box<[u8]>) -> Self {
        let len = bytes.len();
        let data = Box::into_raw(bytes).cast::<u8>();
        Self { data, len }
    }

    /// Number of payload bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the buffer carries no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Borrows the payload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        if self.data.is_null() {
            return &[];
        }
        // SAFETY: `data` came from `Box<[u8]>` of exactly `len` bytes and is owned by self.
        unsafe { slice::from_raw_parts(self.data, self.len) }
    }

    /// Moves the buffer to the heap and hands its ownership to the caller.
    ///
    /// The pointer must eventually come back through [`WireBuffer::from_raw`]
    /// (which is what `tether_wire_free` does).
    #[must_use]
    pub fn into_raw(self) -> *mut Self {
        Box::into_raw(Box::new(self))
    }

    /// Reclaims a buffer previously released with [`WireBuffer::into_raw`].
    ///
    /// Returns `None` for a null pointer.
    ///
    /// # Safety
    /// `raw` must be null or a pointer obtained from `into_raw` that has not been
    /// reclaimed yet.
    #[must_use]
    pub unsafe fn from_raw(raw: *mut Self) -> Option<Self> {
        if raw.is_null() {
            return None;
        }
        // SAFETY: the caller guarantees `raw` came from `Box::into_raw` and is unclaimed.
        Some(*unsafe { Box::from_raw(raw) })
    }

    /// Borrows a buffer owned by somebody else.
    ///
    /// Returns `None` for a null pointer.
    ///
    /// # Safety
    /// `raw` must be null or point to a live `WireBuffer` that outlives `'a`.
    #[must_use]
    pub unsafe fn borrow_raw<'a>(raw: *const Self) -> Option<&'a Self> {
        // SAFETY: guaranteed by the caller.
        unsafe { raw.as_ref() }
    }
}

impl Drop for WireBuffer {
    fn drop(&mut self) {
        if self.data.is_null() {
            return;
        }
        let raw = ptr::slice_from_raw_parts_mut(self.data, self.len);
        // SAFETY: `data`/`len` describe the `Box<[u8]>` this buffer was built from.
        drop(unsafe { Box::from_raw(raw) });
    }
}

impl Clone for WireBuffer {
    fn clone(&self) -> Self {
        Self::from_bytes(self.as_bytes())
    }
}

impl PartialEq for WireBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for WireBuffer {}

impl fmt::Debug for WireBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WireBuffer")
            .field("len", &self.len)
            .field("bytes", &String::from_utf8_lossy(self.as_bytes()))
            .finish()
    }
}
