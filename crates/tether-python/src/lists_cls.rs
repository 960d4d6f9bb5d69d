//! The `StringLists` class: host-owned string lists addressed by integer handles.

use std::sync::Arc;

use pyo3::{prelude::*, types::PyDict};
use tether::{BridgeError, BridgeResult, CollectionProxy, Marshal, SequenceOps, Text};

use crate::{
    convert::{config_from_kwargs, handle_from_py, handle_to_py, py_to_text},
    exceptions::{PyBridgeError, failure_from_py},
};

/// A set of string lists, each reachable only through the handle `create`
/// returned, until `destroy` is called on it.
///
/// Python code plays the foreign side of the bridge: handles are plain
/// integers, elements go in and out through the wire form, and failures are
/// raised as exceptions.
#[pyclass(name = "StringLists", module = "tether", frozen)]
pub struct PyStringLists {
    proxy: Arc<CollectionProxy<Text>>,
}

fn raise<T>(py: Python<'_>, result: BridgeResult<T>) -> PyResult<T> {
    result.map_err(|err| PyBridgeError::new_err(py, &err))
}

#[pymethods]
impl PyStringLists {
    #[new]
    #[pyo3(signature = (*, max_live_handles=None, max_element_bytes=None, leak_policy="warn"))]
    fn new(max_live_handles: Option<usize>, max_element_bytes: Option<usize>, leak_policy: &str) -> PyResult<Self> {
        let config = config_from_kwargs(max_live_handles, max_element_bytes, leak_policy)?;
        Ok(Self {
            proxy: Arc::new(CollectionProxy::new(config)),
        })
    }

    /// Creates an empty list and returns its handle.
    fn create(&self, py: Python<'_>) -> PyResult<u64> {
        raise(py, self.proxy.create()).map(handle_to_py)
    }

    /// Appends a `str` (or UTF-8 `bytes`) to the list.
    fn append(&self, py: Python<'_>, handle: u64, item: &Bound<'_, PyAny>) -> PyResult<()> {
        let handle = handle_from_py(py, handle)?;
        let text = py_to_text(item)?;
        let wire = raise(py, Text::to_wire(&text).map_err(BridgeError::from))?;
        raise(py, self.proxy.append(handle, &wire))
    }

    /// Appends every element of an iterable, stopping at the first failure.
    fn extend(&self, py: Python<'_>, handle: u64, items: &Bound<'_, PyAny>) -> PyResult<()> {
        let handle = handle_from_py(py, handle)?;
        for item in items.try_iter()? {
            let text = py_to_text(&item?)?;
            raise(py, self.proxy.push(handle, text))?;
        }
        Ok(())
    }

    /// Number of elements in the list.
    fn size(&self, py: Python<'_>, handle: u64) -> PyResult<usize> {
        let handle = handle_from_py(py, handle)?;
        raise(py, self.proxy.get_size(handle))
    }

    /// Element at `index`; raises `IndexError` outside `[0, size)`.
    ///
    /// Negative indexes do not count from the end: they raise `IndexError` too.
    fn get(&self, py: Python<'_>, handle: u64, index: i64) -> PyResult<String> {
        let handle = handle_from_py(py, handle)?;
        let wire = raise(py, self.proxy.get_element_signed(handle, index))?;
        raise(py, Text::to_host(&wire).map_err(BridgeError::from))
    }

    /// Releases the list. Using the handle again raises `HandleFault`.
    fn destroy(&self, py: Python<'_>, handle: u64) -> PyResult<()> {
        let handle = handle_from_py(py, handle)?;
        raise(py, self.proxy.destroy(handle))
    }

    /// Wraps a Python list of strings in a new handle.
    fn expose(&self, py: Python<'_>, items: Vec<String>) -> PyResult<u64> {
        raise(py, self.proxy.expose(items)).map(handle_to_py)
    }

    /// Copies any Python sequence into a new list, reading it through `len()`
    /// and indexing.
    ///
    /// An exception raised by the sequence is reported as a `BridgeError`
    /// whose `__cause__` is the original exception.
    fn import_sequence(&self, py: Python<'_>, sequence: &Bound<'_, PyAny>) -> PyResult<u64> {
        let foreign = |py_err: PyErr| {
            let err = PyBridgeError::from_failure(py, failure_from_py(py, &py_err));
            err.set_cause(py, Some(py_err));
            err
        };
        let size = sequence.len().map_err(foreign)?;
        let mut items = Vec::with_capacity(size);
        for index in 0..size {
            let item = sequence.get_item(index).map_err(foreign)?;
            items.push(py_to_text(&item)?);
        }
        self.expose(py, items)
    }

    /// Destroys the list and returns its contents.
    fn take(&self, py: Python<'_>, handle: u64) -> PyResult<Vec<String>> {
        let handle = handle_from_py(py, handle)?;
        raise(py, self.proxy.reclaim(handle))
    }

    /// Copies the list's contents, leaving it live.
    fn snapshot(&self, py: Python<'_>, handle: u64) -> PyResult<Vec<String>> {
        let handle = handle_from_py(py, handle)?;
        raise(py, self.proxy.snapshot(handle))
    }

    /// Handles of every live list.
    fn live_handles(&self) -> Vec<u64> {
        self.proxy.live_handles().into_iter().map(handle_to_py).collect()
    }

    /// Raises `BridgeError` listing the live handles if any list was not destroyed.
    fn check_empty(&self, py: Python<'_>) -> PyResult<()> {
        raise(py, self.proxy.check_empty().map_err(BridgeError::from))
    }

    /// Releases every live list and returns how many there were.
    ///
    /// With `leak_policy="fail"`, raises `BridgeError` instead when any leaked.
    fn shutdown(&self, py: Python<'_>) -> PyResult<usize> {
        raise(py, self.proxy.shutdown().map_err(BridgeError::from))
    }

    /// Registry occupancy as a dict.
    fn stats<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let stats = self.proxy.stats();
        let dict = PyDict::new(py);
        dict.set_item("live", stats.live)?;
        dict.set_item("free_slots", stats.free_slots)?;
        dict.set_item("total_slots", stats.total_slots)?;
        dict.set_item("created_total", stats.created_total)?;
        dict.set_item("destroyed_total", stats.destroyed_total)?;
        Ok(dict)
    }

    fn __len__(&self) -> usize {
        self.proxy.stats().live
    }

    fn __repr__(&self) -> String {
        format!("StringLists(live={})", self.proxy.stats().live)
    }
}
