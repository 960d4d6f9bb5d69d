//! Bridge configuration: live-handle and element-size limits, and the leak policy.

use serde::{Deserialize, Serialize};

/// What `shutdown` does when collections are still exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeakPolicy {
    /// Release leaked collections silently.
    Ignore,
    /// Log every leaked handle, then release them.
    #[default]
    Warn,
    /// Release leaked collections and report them as an error.
    Fail,
}

/// Limits and policies applied by a [`CollectionProxy`](crate::CollectionProxy).
///
/// All limits default to unbounded. At the C boundary a config can be supplied as
/// JSON, e.g. `{"max_live_handles": 1024, "leak_policy": "fail"}`; omitted fields
/// keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Maximum number of simultaneously live handles.
    pub max_live_handles: Option<usize>,
    /// Maximum size in bytes of a single element, checked in both directions.
    pub max_element_bytes: Option<usize>,
    /// Behaviour of `shutdown` when handles are still live.
    pub leak_policy: LeakPolicy,
}

impl BridgeConfig {
    /// Creates a config with no limits and the default leak policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of simultaneously live handles.
    #[must_use]
    pub fn max_live_handles(mut self, limit: usize) -> Self {
        self.max_live_handles = Some(limit);
        self
    }

    /// Sets the maximum element size in bytes.
    #[must_use]
    pub fn max_element_bytes(mut self, limit: usize) -> Self {
        self.max_element_bytes = Some(limit);
        self
    }

    /// Sets the shutdown leak policy.
    #[must_use]
    pub fn leak_policy(mut self, policy: LeakPolicy) -> Self {
        self.leak_policy = policy;
        self
    }

    /// Parses a JSON config document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Parses a JSON config document from raw bytes.
    pub fn from_json_slice(json: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(json)
    }
}
