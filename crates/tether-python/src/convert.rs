//! Conversion between Python values and bridge types.

use pyo3::{
    exceptions::{PyTypeError, PyValueError},
    prelude::*,
    types::{PyBytes, PyString},
};
use tether::{BridgeConfig, Handle, LeakPolicy, MisuseFault, RawHandle};

use crate::exceptions::PyBridgeError;

/// Extracts element text from a `str`, or from `bytes` holding UTF-8.
pub fn py_to_text(obj: &Bound<'_, PyAny>) -> PyResult<String> {
    if let Ok(string) = obj.cast::<PyString>() {
        Ok(string.extract()?)
    } else if let Ok(bytes) = obj.cast::<PyBytes>() {
        String::from_utf8(bytes.as_bytes().to_vec())
            .map_err(|err| PyValueError::new_err(format!("element is not valid UTF-8: {err}")))
    } else {
        Err(PyTypeError::new_err(format!(
            "list elements must be str or bytes, not {}",
            obj.get_type().name()?
        )))
    }
}

/// Decodes the integer handle Python code holds.
///
/// Zero and values no registry could have minted raise `HandleFault`.
pub fn handle_from_py(py: Python<'_>, raw: u64) -> PyResult<Handle> {
    Handle::from_raw(RawHandle(raw)).ok_or_else(|| {
        let err = MisuseFault::UnknownHandle { raw };
        PyBridgeError::new_err(py, &err.into())
    })
}

/// The integer form of a handle handed to Python code.
pub fn handle_to_py(handle: Handle) -> u64 {
    handle.to_raw().0
}

/// Builds a config from the keyword arguments of `StringLists(...)`.
pub fn config_from_kwargs(
    max_live_handles: Option<usize>,
    max_element_bytes: Option<usize>,
    leak_policy: &str,
) -> PyResult<BridgeConfig> {
    let leak_policy: LeakPolicy = serde_json::from_value(serde_json::Value::from(leak_policy)).map_err(|_| {
        PyValueError::new_err(format!(
            "Invalid leak_policy: '{leak_policy}'. Expected 'ignore', 'warn', or 'fail'"
        ))
    })?;
    let mut config = BridgeConfig::new().leak_policy(leak_policy);
    config.max_live_handles = max_live_handles;
    config.max_element_bytes = max_element_bytes;
    Ok(config)
}
