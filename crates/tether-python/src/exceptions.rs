//! Exception types raised by the `_tether` module, and capture of Python
//! exceptions raised while the host reads a Python-side sequence.
//!
//! ## Exception Hierarchy
//!
//! ```text
//! BridgeError(Exception)     # failure reported by the bridge
//! └── HandleFault            # the handle protocol was violated
//! ```
//!
//! Out-of-range indexes raise `IndexError` and element conversion failures raise
//! `ValueError`, as Python code expects of a sequence.

use pyo3::{PyClassInitializer, PyTypeCheck, exceptions, prelude::*};
use tether::{BridgeError, CapturedFailure, FailureKind};

/// Base exception for failures reported by the bridge.
///
/// Carries the captured failure's kind, message and cause chain.
#[pyclass(name = "BridgeError", extends=exceptions::PyException, module="tether", subclass)]
#[derive(Clone)]
pub struct PyBridgeError {
    failure: CapturedFailure,
}

impl PyBridgeError {
    /// Converts a bridge error to the matching Python exception.
    #[must_use]
    pub fn new_err(py: Python<'_>, err: &BridgeError) -> PyErr {
        let failure = CapturedFailure::from_error(err);
        match err {
            BridgeError::IndexOutOfRange { .. } | BridgeError::NegativeIndex { .. } => exceptions::PyIndexError::new_err(failure.to_string()),
            BridgeError::Conversion(_) => exceptions::PyValueError::new_err(failure.to_string()),
            BridgeError::Misuse(_) => HandleFault::new_err(py, failure),
            _ => Self::from_failure(py, failure),
        }
    }

    /// Wraps a captured failure in a plain `BridgeError`.
    #[must_use]
    pub fn from_failure(py: Python<'_>, failure: CapturedFailure) -> PyErr {
        match Py::new(py, Self { failure }) {
            Ok(err) => PyErr::from_value(err.into_bound(py).into_any()),
            Err(e) => e,
        }
    }
}

#[pymethods]
impl PyBridgeError {
    /// Failure category, e.g. `"Capacity"` or `"Foreign"`.
    #[getter]
    fn kind(&self) -> String {
        self.failure.kind().to_string()
    }

    /// Top-level message without the cause chain.
    #[getter]
    fn message(&self) -> &str {
        self.failure.message()
    }

    /// Cause messages, outermost first.
    #[getter]
    fn causes(&self) -> Vec<String> {
        self.failure.causes().to_vec()
    }

    fn __str__(&self) -> String {
        self.failure.to_string()
    }

    fn __repr__(&self) -> String {
        format!("BridgeError({})", self.failure.summary())
    }
}

/// Raised when a handle is used outside its lifetime: destroyed twice, used
/// after destroy, or never created by this object.
///
/// Across the C boundary such a violation aborts the process; from Python it
/// is raised so the interpreter survives.
#[pyclass(name = "HandleFault", extends=PyBridgeError, module="tether")]
pub struct HandleFault;

impl HandleFault {
    /// Creates a `HandleFault` carrying `failure`.
    #[must_use]
    pub fn new_err(py: Python<'_>, failure: CapturedFailure) -> PyErr {
        let init = PyClassInitializer::from(PyBridgeError { failure }).add_subclass(Self);
        match Py::new(py, init) {
            Ok(err) => PyErr::from_value(err.into_bound(py).into_any()),
            Err(e) => e,
        }
    }
}

#[pymethods]
impl HandleFault {
    #[expect(clippy::needless_pass_by_value, reason = "required by macro")]
    fn __repr__(slf: PyRef<'_, Self>) -> String {
        format!("HandleFault({})", slf.as_super().failure.message())
    }
}

/// Captures a Python exception, and its `__cause__` chain, as a failure the
/// host can report.
///
/// NOTE: `UnicodeError` is a subclass of `ValueError`, so both map to a
/// conversion failure.
pub fn failure_from_py(py: Python<'_>, py_err: &PyErr) -> CapturedFailure {
    let exc = py_err.value(py);
    let kind = if exceptions::PyIndexError::type_check(exc) {
        FailureKind::IndexOutOfRange
    } else if exceptions::PyValueError::type_check(exc) || exceptions::PyTypeError::type_check(exc) {
        FailureKind::Conversion
    } else if exceptions::PyMemoryError::type_check(exc) {
        FailureKind::Capacity
    } else {
        FailureKind::Foreign
    };

    let mut failure = CapturedFailure::new(kind, describe(py, py_err));
    let mut cause = py_err.cause(py);
    while let Some(err) = cause {
        failure = failure.with_cause(describe(py, &err));
        cause = err.cause(py);
    }
    failure
}

/// `TypeName: message`, or just the type name when the message is empty.
fn describe(py: Python<'_>, py_err: &PyErr) -> String {
    let exc = py_err.value(py);
    let name = exc
        .get_type()
        .name()
        .map_or_else(|_| "Exception".to_owned(), |name| name.to_string());
    match exc.str() {
        Ok(msg) if !msg.to_string_lossy().is_empty() => format!("{name}: {}", msg.to_string_lossy()),
        _ => name,
    }
}
