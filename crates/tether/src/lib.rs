#![doc = include_str!("../../../README.md")]

pub mod bridge;
mod config;
mod error;
pub mod ffi;
mod foreign;
mod handle;
mod marshal;
mod proxy;
mod registry;
mod wire;

pub use crate::{
    bridge::{CapturedFailure, FailureKind},
    config::{BridgeConfig, LeakPolicy},
    error::{BridgeError, BridgeResult, ConversionError, MisuseFault},
    foreign::{ForeignSlot, OwnedSequence, Registration, RegistrationError, SequenceCallbacks, SequenceIter},
    handle::{Handle, RawHandle},
    marshal::{Binary, Marshal, Text},
    proxy::{CollectionProxy, SequenceOps},
    registry::{HandleRegistry, LeakReport, RegistryStats},
    wire::WireBuffer,
};
