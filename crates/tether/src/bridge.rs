//! Exception bridge: failures become a sentinel plus a retrievable description.
//!
//! Nothing unwinds across the C boundary. Every entry point runs its body through
//! [`guard`], which:
//!
//! - returns the value on success;
//! - on a recoverable [`BridgeError`], stores a [`CapturedFailure`] in a
//!   thread-local side channel and returns the operation's sentinel;
//! - on a panic, captures it the same way with [`FailureKind::Panic`];
//! - on a [`MisuseFault`], logs and aborts the process via [`fault`].
//!
//! The foreign runtime checks the sentinel and then calls `tether_last_error_*`
//! on the same thread to re-raise the failure in its own idiom. The channel also
//! runs the other way: foreign callbacks report failures with [`raise_foreign`]
//! before returning their sentinel, and the host turns that into
//! [`BridgeError::Foreign`].

use std::{
    any::Any,
    cell::RefCell,
    error::Error as _,
    fmt,
    panic::{self, AssertUnwindSafe},
};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, error, warn};

use crate::error::{BridgeError, BridgeResult, MisuseFault};

/// Category of a captured failure, exposed to C as a stable integer code.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    IndexOutOfRange = 1,
    Conversion = 2,
    Capacity = 3,
    Foreign = 4,
    Panic = 5,
    Misuse = 6,
    Leak = 7,
    Registration = 8,
}

impl FailureKind {
    /// Integer code used at the C boundary. Zero means "no failure".
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Decodes a C failure code.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::IndexOutOfRange),
            2 => Some(Self::Conversion),
            3 => Some(Self::Capacity),
            4 => Some(Self::Foreign),
            5 => Some(Self::Panic),
            6 => Some(Self::Misuse),
            7 => Some(Self::Leak),
            8 => Some(Self::Registration),
            _ => None,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::IndexOutOfRange => "IndexOutOfRange",
            Self::Conversion => "Conversion",
            Self::Capacity => "Capacity",
            Self::Foreign => "Foreign",
            Self::Panic => "Panic",
            Self::Misuse => "Misuse",
            Self::Leak => "Leak",
            Self::Registration => "Registration",
        })
    }
}

/// A failure recorded on one side of the boundary for retrieval on the other.
///
/// Keeps the failure's category, its message, and the messages of its cause
/// chain (outermost first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedFailure {
    kind: FailureKind,
    message: String,
    causes: SmallVec<[String; 2]>,
}

impl CapturedFailure {
    /// Creates a failure with no causes.
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            causes: SmallVec::new(),
        }
    }

    /// Appends one message to the cause chain.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    /// Captures a bridge error and its `source()` chain.
    #[must_use]
    pub fn from_error(err: &BridgeError) -> Self {
        let kind = match err {
            BridgeError::IndexOutOfRange { .. } | BridgeError::NegativeIndex { .. } => {
                FailureKind::IndexOutOfRange
            }
            BridgeError::Conversion(_) => FailureKind::Conversion,
            BridgeError::CapacityExceeded { .. } => FailureKind::Capacity,
            BridgeError::Misuse(_) => FailureKind::Misuse,
            BridgeError::Leaked(_) => FailureKind::Leak,
            BridgeError::Registration(_) => FailureKind::Registration,
            BridgeError::Foreign(inner) => return inner.clone(),
        };
        let mut failure = Self::new(kind, err.to_string());
        let mut source = err.source();
        while let Some(cause) = source {
            failure.causes.push(cause.to_string());
            source = cause.source();
        }
        failure
    }

    /// Captures a panic payload caught while running `operation`.
    #[must_use]
    pub fn from_panic(operation: &str, payload: &(dyn Any + Send)) -> Self {
        let detail = if let Some(msg) = payload.downcast_ref::<&str>() {
            (*msg).to_owned()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "non-string panic payload".to_owned()
        };
        Self::new(FailureKind::Panic, format!("panic in {operation}")).with_cause(detail)
    }

    /// Category of the failure.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Top-level message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Cause messages, outermost first.
    #[must_use]
    pub fn causes(&self) -> &[String] {
        &self.causes
    }

    /// `Kind: message` without the cause chain.
    #[must_use]
    pub fn summary(&self) -> String {
        format!("{}: {}", self.kind, self.message)
    }
}

impl fmt::Display for CapturedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        for cause in &self.causes {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

thread_local! {
    static LAST_FAILURE: RefCell<Option<CapturedFailure>> = const { RefCell::new(None) };
}

/// Records `failure` as this thread's last failure, replacing any previous one.
pub fn record(failure: CapturedFailure) {
    LAST_FAILURE.with(|slot| *slot.borrow_mut() = Some(failure));
}

/// Records a bridge error as this thread's last failure.
pub fn capture(err: &BridgeError) {
    let failure = CapturedFailure::from_error(err);
    debug!(kind = %failure.kind(), message = failure.message(), "failure captured");
    record(failure);
}

/// Takes this thread's last failure, leaving the channel empty.
#[must_use]
pub fn take_last_failure() -> Option<CapturedFailure> {
    LAST_FAILURE.with(|slot| slot.borrow_mut().take())
}

/// Category of this thread's last failure, without consuming it.
#[must_use]
pub fn last_failure_kind() -> Option<FailureKind> {
    LAST_FAILURE.with(|slot| slot.borrow().as_ref().map(CapturedFailure::kind))
}

/// Empties this thread's side channel.
pub fn clear() {
    LAST_FAILURE.with(|slot| slot.borrow_mut().take());
}

/// Records a failure reported by foreign code, to be collected by the host
/// when the foreign callback returns its sentinel.
pub fn raise_foreign(failure: CapturedFailure) {
    debug!(kind = %failure.kind(), message = failure.message(), "foreign failure raised");
    record(failure);
}

/// Builds the host-side error for a foreign callback that returned its sentinel.
///
/// Uses the failure the foreign side raised, or a generic one if it raised none.
#[must_use]
pub fn foreign_failure(operation: &str) -> BridgeError {
    let failure = take_last_failure().unwrap_or_else(|| {
        CapturedFailure::new(
            FailureKind::Foreign,
            format!("foreign {operation} returned no value"),
        )
    });
    BridgeError::Foreign(failure)
}

/// Runs one boundary operation, translating every failure into `sentinel`.
///
/// Clears the side channel first so a stale failure from an earlier call is
/// never mistaken for this call's.
pub fn guard<T>(operation: &'static str, sentinel: T, f: impl FnOnce() -> BridgeResult<T>) -> T {
    clear();
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => value,
        Ok(Err(BridgeError::Misuse(misuse))) => fault(operation, &misuse),
        Ok(Err(err)) => {
            capture(&err);
            sentinel
        }
        Err(payload) => {
            let failure = CapturedFailure::from_panic(operation, &*payload);
            warn!(operation, failure = %failure, "panic caught at boundary");
            record(failure);
            sentinel
        }
    }
}

/// Reports a handle protocol violation and aborts.
///
/// Misuse cannot be reported back across the boundary without risking further
/// corruption, so it stops the process at the point of violation.
pub fn fault(operation: &str, misuse: &MisuseFault) -> ! {
    error!(operation, fault = %misuse, "handle protocol violation");
    eprintln!("tether: fatal handle protocol violation in {operation}: {misuse}");
    std::process::abort()
}
