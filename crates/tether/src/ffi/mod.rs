//! C entry points.
//!
//! Each element type gets its own family of `tether_<element>_*` functions,
//! generated by `sequence_adapter!`, plus the shared wire-buffer and last-error
//! functions defined here.
//!
//! Return conventions:
//! - `create` returns a null handle (`0`) on failure;
//! - `get_elem` returns a null pointer on failure;
//! - status codes are [`STATUS_OK`], [`STATUS_ALREADY`] when the call had
//!   nothing to do, and [`STATUS_ERROR`] on failure.
//!
//! After any sentinel, `tether_last_error_kind` and `tether_last_error_take` on
//! the same thread describe what went wrong. Handle protocol violations abort.

#[macro_use]
mod adapter;

use std::{ptr, slice, sync::Arc};

use parking_lot::RwLock;
use tracing::debug;

use crate::{
    bridge::{self, CapturedFailure, FailureKind},
    config::BridgeConfig,
    error::{BridgeResult, ConversionError, MisuseFault},
    foreign::{ForeignSlot, Registration, RegistrationError, SequenceCallbacks},
    handle::{Handle, RawHandle},
    marshal::{Binary, Marshal, Text},
    proxy::{CollectionProxy, SequenceOps},
    registry::LeakReport,
    wire::WireBuffer,
};

/// The call succeeded.
pub const STATUS_OK: i32 = 0;
/// The call succeeded without doing anything (already initialized, same table registered).
pub const STATUS_ALREADY: i32 = 1;
/// The call failed; the failure is in the thread's last-error slot.
pub const STATUS_ERROR: i32 = -1;

sequence_adapter!(string, Text);
sequence_adapter!(binary, Binary);

/// Process-wide home of the proxy serving one element type's entry points.
///
/// Empty until `tether_<element>_init` runs; every operation on an empty slot is
/// a [`MisuseFault::NotInstalled`].
pub struct AdapterSlot<M: Marshal> {
    name: &'static str,
    proxy: RwLock<Option<Arc<CollectionProxy<M>>>>,
}

impl<M: Marshal> AdapterSlot<M> {
    /// Creates an uninstalled slot.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            proxy: parking_lot::const_rwlock(None),
        }
    }

    /// Name of the element type this slot serves.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Installs a fresh proxy.
    ///
    /// Returns `false` and leaves the current proxy untouched if one is already installed.
    pub fn install(&self, config: BridgeConfig) -> bool {
        let mut slot = self.proxy.write();
        if slot.is_some() {
            debug!(adapter = self.name, "adapter already installed");
            return false;
        }
        debug!(adapter = self.name, ?config, "adapter installed");
        *slot = Some(Arc::new(CollectionProxy::new(config)));
        true
    }

    /// The installed proxy.
    pub fn proxy(&self) -> Result<Arc<CollectionProxy<M>>, MisuseFault> {
        self.proxy
            .read()
            .clone()
            .ok_or(MisuseFault::NotInstalled { adapter: self.name })
    }

    /// Returns `true` between `init` and `shutdown`.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.proxy.read().is_some()
    }

    /// Uninstalls the proxy and shuts it down.
    ///
    /// Returns `None` if nothing was installed.
    pub fn shutdown(&self) -> Option<Result<usize, LeakReport>> {
        let proxy = self.proxy.write().take()?;
        debug!(adapter = self.name, "adapter shutting down");
        Some(proxy.shutdown())
    }
}

fn decode(raw: RawHandle) -> Result<Handle, MisuseFault> {
    Handle::from_raw(raw).ok_or(MisuseFault::UnknownHandle { raw: raw.0 })
}

/// Borrows `len` bytes at `data`, treating a null pointer as empty only when `len` is zero.
///
/// # Safety
/// `data` must be null or valid for reads of `len` bytes for `'a`.
unsafe fn bytes_arg<'a>(data: *const u8, len: usize) -> Result<&'a [u8], ConversionError> {
    if data.is_null() {
        return if len == 0 { Ok(&[]) } else { Err(ConversionError::NullWire) };
    }
    // SAFETY: non-null and valid for `len` bytes per the caller's contract.
    Ok(unsafe { slice::from_raw_parts(data, len) })
}

pub(crate) fn init<M: Marshal>(slot: &AdapterSlot<M>, config: BridgeConfig) -> i32 {
    bridge::guard("init", STATUS_ERROR, || {
        Ok(if slot.install(config) { STATUS_OK } else { STATUS_ALREADY })
    })
}

/// # Safety
/// `json` must be null or valid for reads of `len` bytes.
pub(crate) unsafe fn init_with_config<M: Marshal>(slot: &AdapterSlot<M>, json: *const u8, len: usize) -> i32 {
    bridge::guard("init_with_config", STATUS_ERROR, || {
        // SAFETY: forwarded from the caller.
        let json = unsafe { bytes_arg(json, len) }?;
        let config = if json.is_empty() {
            BridgeConfig::default()
        } else {
            match BridgeConfig::from_json_slice(json) {
                Ok(config) => config,
                Err(err) => {
                    bridge::record(
                        CapturedFailure::new(FailureKind::Conversion, "invalid bridge config").with_cause(err.to_string()),
                    );
                    return Ok(STATUS_ERROR);
                }
            }
        };
        Ok(if slot.install(config) { STATUS_OK } else { STATUS_ALREADY })
    })
}

pub(crate) fn shutdown<M: Marshal>(slot: &AdapterSlot<M>) -> i64 {
    bridge::guard("shutdown", i64::from(STATUS_ERROR), || match slot.shutdown() {
        None => Ok(0),
        Some(result) => Ok(i64::try_from(result?).unwrap_or(i64::MAX)),
    })
}

pub(crate) fn check_empty<M: Marshal>(slot: &AdapterSlot<M>) -> i32 {
    bridge::guard("check_empty", STATUS_ERROR, || {
        slot.proxy()?.check_empty()?;
        Ok(STATUS_OK)
    })
}

pub(crate) fn create<M: Marshal<Wire = WireBuffer>>(slot: &AdapterSlot<M>) -> RawHandle {
    bridge::guard("create", RawHandle::NULL, || Ok(slot.proxy()?.create()?.to_raw()))
}

/// # Safety
/// `element` must be null or point to a live `WireBuffer` for the duration of the call.
pub(crate) unsafe fn add<M: Marshal<Wire = WireBuffer>>(
    slot: &AdapterSlot<M>,
    handle: RawHandle,
    element: *const WireBuffer,
) {
    bridge::guard("add", (), || -> BridgeResult<()> {
        let proxy = slot.proxy()?;
        let handle = decode(handle)?;
        // SAFETY: forwarded from the caller.
        let element = unsafe { WireBuffer::borrow_raw(element) }.ok_or(ConversionError::NullWire)?;
        proxy.append(handle, element)
    });
}

pub(crate) fn get_size<M: Marshal<Wire = WireBuffer>>(slot: &AdapterSlot<M>, handle: RawHandle) -> usize {
    bridge::guard("get_size", 0, || slot.proxy()?.get_size(decode(handle)?))
}

pub(crate) fn get_elem<M: Marshal<Wire = WireBuffer>>(
    slot: &AdapterSlot<M>,
    handle: RawHandle,
    index: usize,
) -> *mut WireBuffer {
    bridge::guard("get_elem", ptr::null_mut(), || {
        let element = slot.proxy()?.get_element(decode(handle)?, index)?;
        Ok(element.into_raw())
    })
}

pub(crate) fn delete<M: Marshal<Wire = WireBuffer>>(slot: &AdapterSlot<M>, handle: RawHandle) {
    bridge::guard("delete", (), || slot.proxy()?.destroy(decode(handle)?));
}

/// # Safety
/// `table` must be null or point to a valid `SequenceCallbacks`.
pub(crate) unsafe fn register_foreign(slot: &ForeignSlot, table: *const SequenceCallbacks) -> i32 {
    bridge::guard("register_foreign", STATUS_ERROR, || {
        // SAFETY: forwarded from the caller.
        let table = unsafe { table.as_ref() }.ok_or(RegistrationError::NullTable { slot: slot.name() })?;
        Ok(match slot.register(*table)? {
            Registration::Installed => STATUS_OK,
            Registration::AlreadyInstalled => STATUS_ALREADY,
        })
    })
}

/// Allocates a wire buffer holding a copy of `len` bytes at `data`.
///
/// Foreign code uses this for every buffer it hands to the host, so that
/// `tether_wire_free` can release it. Returns null on failure.
///
/// Unlike the sequence entry points this leaves an earlier failure in place, so
/// a callback may raise and then still allocate.
///
/// # Safety
/// `data` must be null (only when `len` is zero) or valid for reads of `len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tether_wire_new(data: *const u8, len: usize) -> *mut WireBuffer {
    // SAFETY: forwarded from the caller.
    match unsafe { bytes_arg(data, len) } {
        Ok(bytes) => WireBuffer::from_bytes(bytes).into_raw(),
        Err(err) => {
            bridge::capture(&err.into());
            ptr::null_mut()
        }
    }
}

/// Releases a wire buffer. Null is ignored.
///
/// # Safety
/// `buffer` must be null or an unreleased pointer returned by this library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tether_wire_free(buffer: *mut WireBuffer) {
    // SAFETY: forwarded from the caller.
    drop(unsafe { WireBuffer::from_raw(buffer) });
}

/// Pointer to a wire buffer's bytes, or null for a null buffer.
///
/// # Safety
/// `buffer` must be null or point to a live `WireBuffer`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tether_wire_data(buffer: *const WireBuffer) -> *const u8 {
    // SAFETY: forwarded from the caller.
    unsafe { WireBuffer::borrow_raw(buffer) }.map_or(ptr::null(), |buffer| buffer.as_bytes().as_ptr())
}

/// Length in bytes of a wire buffer, `0` for a null buffer.
///
/// # Safety
/// `buffer` must be null or point to a live `WireBuffer`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tether_wire_len(buffer: *const WireBuffer) -> usize {
    // SAFETY: forwarded from the caller.
    unsafe { WireBuffer::borrow_raw(buffer) }.map_or(0, WireBuffer::len)
}

/// Category code of this thread's last failure, `0` if there is none.
#[unsafe(no_mangle)]
pub extern "C" fn tether_last_error_kind() -> i32 {
    bridge::last_failure_kind().map_or(0, FailureKind::code)
}

/// Takes this thread's last failure as a UTF-8 message buffer, or null if there is none.
///
/// The buffer belongs to the caller and is released with `tether_wire_free`.
#[unsafe(no_mangle)]
pub extern "C" fn tether_last_error_take() -> *mut WireBuffer {
    bridge::take_last_failure().map_or(ptr::null_mut(), |failure| {
        WireBuffer::from_bytes(failure.to_string().as_bytes()).into_raw()
    })
}

/// Forgets this thread's last failure.
#[unsafe(no_mangle)]
pub extern "C" fn tether_last_error_clear() {
    bridge::clear();
}

/// Records a failure raised by foreign code inside a callback.
///
/// Call it before returning the callback's sentinel. An unknown `kind` is
/// recorded as a foreign failure; invalid UTF-8 in the message is replaced.
///
/// # Safety
/// `message` must be null or valid for reads of `len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tether_raise(kind: i32, message: *const u8, len: usize) {
    let kind = FailureKind::from_code(kind).unwrap_or(FailureKind::Foreign);
    // SAFETY: forwarded from the caller.
    let message = match unsafe { bytes_arg(message, len) } {
        Ok(bytes) if !bytes.is_empty() => String::from_utf8_lossy(bytes).into_owned(),
        _ => "foreign failure".to_owned(),
    };
    bridge::raise_foreign(CapturedFailure::new(kind, message));
}
