//! Host collections exposed to the foreign side by handle.

use std::{fmt, marker::PhantomData};

use tracing::{debug, instrument, warn};

use crate::{
    config::{BridgeConfig, LeakPolicy},
    error::{BridgeError, BridgeResult},
    handle::Handle,
    marshal::{Marshal, check_len},
    registry::{HandleRegistry, LeakReport, RegistryStats},
};

/// The five operations a caller needs to treat a sequence as its own.
///
/// Implemented by [`CollectionProxy`] for host-owned collections and by
/// [`SequenceCallbacks`](crate::SequenceCallbacks) for collections that live on
/// the foreign side, so host code can drive either through one interface.
pub trait SequenceOps {
    /// Token naming one collection.
    type Handle: Copy + fmt::Debug;
    /// Boundary form of one element.
    type Wire;

    /// Allocates an empty collection and returns its handle.
    fn create(&self) -> BridgeResult<Self::Handle>;

    /// Appends a copy of `element` to the end of the collection.
    fn append(&self, handle: Self::Handle, element: &Self::Wire) -> BridgeResult<()>;

    /// Number of elements currently in the collection.
    fn get_size(&self, handle: Self::Handle) -> BridgeResult<usize>;

    /// Returns an owned wire copy of the element at `index`.
    fn get_element(&self, handle: Self::Handle, index: usize) -> BridgeResult<Self::Wire>;

    /// Releases the collection. The handle must not be used again.
    fn destroy(&self, handle: Self::Handle) -> BridgeResult<()>;
}

/// Exposes host collections of `M::Host` elements through opaque handles.
///
/// The proxy owns its registry; there is no module-level state. Create one per
/// element type at bridge initialization and call [`CollectionProxy::shutdown`]
/// when tearing the bridge down.
pub struct CollectionProxy<M: Marshal> {
    registry: HandleRegistry<Vec<M::Host>>,
    config: BridgeConfig,
    marshal: PhantomData<fn() -> M>,
}

impl<M: Marshal> CollectionProxy<M> {
    /// Creates a proxy with an empty registry.
    #[must_use]
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            registry: HandleRegistry::new(M::ELEMENT).with_max_live(config.max_live_handles),
            config,
            marshal: PhantomData,
        }
    }

    /// The configuration this proxy was created with.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The registry backing this proxy.
    #[must_use]
    pub fn registry(&self) -> &HandleRegistry<Vec<M::Host>> {
        &self.registry
    }

    /// Wraps an existing host collection in a handle.
    pub fn expose(&self, items: Vec<M::Host>) -> BridgeResult<Handle> {
        for item in &items {
            check_len(M::host_len(item), self.config.max_element_bytes)?;
        }
        self.registry.register(items)
    }

    /// Appends a host element directly, without going through the wire form.
    pub fn push(&self, handle: Handle, item: M::Host) -> BridgeResult<()> {
        let cell = self.registry.get(handle)?;
        check_len(M::host_len(&item), self.config.max_element_bytes)?;
        cell.lock().push(item);
        Ok(())
    }

    /// Reads an element by a signed index, as dynamically typed callers pass it.
    ///
    /// A negative index is out of range; it never counts from the end.
    pub fn get_element_signed(&self, handle: Handle, index: i64) -> BridgeResult<M::Wire> {
        match usize::try_from(index) {
            Ok(index) => self.get_element(handle, index),
            Err(_) => Err(BridgeError::NegativeIndex {
                index,
                size: self.get_size(handle)?,
            }),
        }
    }

    /// Copies the current contents of a collection.
    pub fn snapshot(&self, handle: Handle) -> BridgeResult<Vec<M::Host>> {
        Ok(self.registry.with(handle, |items| items.clone())?)
    }

    /// Deregisters a handle and gives the collection back to the host.
    pub fn reclaim(&self, handle: Handle) -> BridgeResult<Vec<M::Host>> {
        Ok(self.registry.deregister(handle)?)
    }

    /// Live handles in slot order.
    #[must_use]
    pub fn live_handles(&self) -> Vec<Handle> {
        self.registry.live_handles()
    }

    /// Checks that every exposed collection has been destroyed.
    pub fn check_empty(&self) -> Result<(), LeakReport> {
        self.registry.check_empty()
    }

    /// Panics with a leak report if any collection is still exposed.
    pub fn assert_empty(&self) {
        self.registry.assert_empty();
    }

    /// Registry occupancy snapshot.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    /// Releases every collection still exposed and applies the leak policy.
    ///
    /// Returns the number of leaked collections released, or the leak report
    /// under [`LeakPolicy::Fail`].
    pub fn shutdown(&self) -> Result<usize, LeakReport> {
        let leaked: Vec<Handle> = self.registry.drain().into_iter().map(|(handle, _)| handle).collect();
        if leaked.is_empty() {
            debug!(registry = self.registry.label(), "shutdown clean");
            return Ok(0);
        }
        match self.config.leak_policy {
            LeakPolicy::Ignore => Ok(leaked.len()),
            LeakPolicy::Warn => {
                for handle in &leaked {
                    warn!(registry = self.registry.label(), %handle, "handle leaked at shutdown");
                }
                Ok(leaked.len())
            }
            LeakPolicy::Fail => Err(LeakReport {
                registry: self.registry.label(),
                handles: leaked,
            }),
        }
    }
}

impl<M: Marshal> Default for CollectionProxy<M> {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

impl<M: Marshal> fmt::Debug for CollectionProxy<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionProxy")
            .field("element", &M::ELEMENT)
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish()
    }
}

impl<M: Marshal> SequenceOps for CollectionProxy<M> {
    type Handle = Handle;
    type Wire = M::Wire;

    #[instrument(name = "tether::proxy::create", level = "trace", skip(self), fields(element = M::ELEMENT))]
    fn create(&self) -> BridgeResult<Handle> {
        self.registry.register(Vec::new())
    }

    #[instrument(name = "tether::proxy::append", level = "trace", skip(self, element))]
    fn append(&self, handle: Handle, element: &M::Wire) -> BridgeResult<()> {
        // the handle is resolved before the element is looked at, so misuse is
        // never reported as a conversion failure
        let cell = self.registry.get(handle)?;
        check_len(M::wire_len(element), self.config.max_element_bytes)?;
        let item = M::to_host(element)?;
        cell.lock().push(item);
        Ok(())
    }

    fn get_size(&self, handle: Handle) -> BridgeResult<usize> {
        Ok(self.registry.with(handle, |items| items.len())?)
    }

    #[instrument(name = "tether::proxy::get_element", level = "trace", skip(self))]
    fn get_element(&self, handle: Handle, index: usize) -> BridgeResult<M::Wire> {
        let limit = self.config.max_element_bytes;
        self.registry.with(handle, |items| match items.get(index) {
            Some(item) => {
                check_len(M::host_len(item), limit)?;
                Ok(M::to_wire(item)?)
            }
            None => Err(BridgeError::IndexOutOfRange {
                index,
                size: items.len(),
            }),
        })?
    }

    #[instrument(name = "tether::proxy::destroy", level = "trace", skip(self))]
    fn destroy(&self, handle: Handle) -> BridgeResult<()> {
        self.registry.deregister(handle)?;
        Ok(())
    }
}
