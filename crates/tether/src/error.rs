//! Error taxonomy for the handle protocol.
//!
//! Three families are kept apart because they are propagated differently:
//!
//! - [`MisuseFault`]: the calling code broke the handle protocol (double destroy,
//!   stale handle, operating before the adapter is installed). At the C boundary
//!   these abort the process; the safe Rust API returns them so tests can observe them.
//! - [`ConversionError`]: an element could not cross the boundary. Recoverable,
//!   reported to the caller through the exception bridge.
//! - Everything else in [`BridgeError`]: recoverable data conditions such as an
//!   out-of-range index or an exhausted handle budget.

use crate::{bridge::CapturedFailure, foreign::RegistrationError, handle::Handle, registry::LeakReport};

/// Result alias used throughout the crate.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Any failure produced by a proxy operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// `get_element` was asked for an index outside `[0, size)`.
    #[error("index {index} out of range for sequence of size {size}")]
    IndexOutOfRange { index: usize, size: usize },
    /// A signed lookup was given a negative index; elements are addressed
    /// from the front only.
    #[error("index {index} out of range for sequence of size {size}")]
    NegativeIndex { index: i64, size: usize },
    /// An element could not be converted between host and wire form.
    #[error("element conversion failed")]
    Conversion(#[from] ConversionError),
    /// The configured live-handle budget is spent.
    #[error("live handle limit exceeded: {limit}")]
    CapacityExceeded { limit: usize },
    /// The handle protocol was violated.
    #[error(transparent)]
    Misuse(#[from] MisuseFault),
    /// The foreign side signalled a failure while serving a host request.
    #[error("foreign operation failed: {0}")]
    Foreign(CapturedFailure),
    /// Collections were still exposed when the bridge was checked or shut down.
    #[error(transparent)]
    Leaked(#[from] LeakReport),
    /// A foreign callback table could not be registered.
    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

impl BridgeError {
    /// Returns `true` for protocol violations, which are never reported as recoverable.
    #[must_use]
    pub fn is_misuse(&self) -> bool {
        matches!(self, Self::Misuse(_))
    }
}

/// A violation of the handle lifecycle.
///
/// Each variant indicates a bug in the code driving the boundary rather than a
/// runtime data condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MisuseFault {
    /// A slot that was expected to be vacant already held a collection.
    #[error("handle {handle} registered twice")]
    DuplicateRegistration { handle: Handle },
    /// The handle was never minted by this registry, or was the null sentinel.
    #[error("unknown handle {raw:#x}")]
    UnknownHandle { raw: u64 },
    /// The handle was destroyed earlier and its slot has not been reused.
    #[error("handle {handle} already destroyed")]
    DoubleDestroy { handle: Handle },
    /// The handle's slot has since been reused for a newer collection.
    #[error("stale handle {handle}: slot now at generation {current}")]
    StaleHandle { handle: Handle, current: u32 },
    /// A boundary entry point was called before its adapter was installed.
    #[error("adapter '{adapter}' used before init")]
    NotInstalled { adapter: &'static str },
}

/// Failure to convert one element between its host and wire representations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    /// A wire element pointer was null.
    #[error("null wire element")]
    NullWire,
    /// Wire bytes were not valid UTF-8 for a text element.
    #[error("wire element is not valid UTF-8 (valid up to byte {valid_up_to})")]
    InvalidUtf8 { valid_up_to: usize },
    /// The element exceeds the configured size limit.
    #[error("element of {len} bytes exceeds limit of {limit} bytes")]
    TooLarge { len: usize, limit: usize },
}
