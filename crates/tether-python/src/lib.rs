//! Python bindings for tether.
//!
//! Python code plays the foreign side of the bridge: it creates, fills, reads
//! and destroys host-owned string lists through integer handles, and bridge
//! failures surface as Python exceptions.

mod convert;
mod exceptions;
mod lists_cls;

use std::sync::OnceLock;

pub use exceptions::{HandleFault, PyBridgeError};
pub use lists_cls::PyStringLists;
use pyo3::prelude::*;

/// Returns the package version, converting Cargo's format to Python's PEP 440.
fn get_version() -> &'static str {
    static VERSION: OnceLock<String> = OnceLock::new();

    VERSION.get_or_init(|| {
        let version = env!("CARGO_PKG_VERSION");
        // cargo uses "1.0-alpha1" etc. while python uses "1.0.0a1"
        version.replace("-alpha", "a").replace("-beta", "b")
    })
}

/// tether - handle-based collection proxies across a C boundary.
#[pymodule]
mod _tether {
    use pyo3::prelude::*;

    #[pymodule_export]
    use super::HandleFault;
    #[pymodule_export]
    use super::PyBridgeError as BridgeError;
    #[pymodule_export]
    use super::PyStringLists as StringLists;
    use super::get_version;

    #[pymodule_init]
    fn init(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add("__version__", get_version())?;
        Ok(())
    }
}
