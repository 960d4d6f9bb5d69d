//! Element marshaling between host values and wire buffers.
//!
//! A [`Marshal`] implementation is the only per-element-type piece of the
//! protocol: the registry, proxy and bridge are shared by every instantiation.

use std::fmt;

use crate::{error::ConversionError, wire::WireBuffer};

/// Converts one element between its host form and its wire form.
pub trait Marshal: Send + Sync + 'static {
    /// The host's native element type.
    type Host: Clone + fmt::Debug + PartialEq + Send + Sync + 'static;
    /// The boundary-crossing form of one element.
    type Wire;

    /// Short element name used in adapter names and log fields.
    const ELEMENT: &'static str;

    /// Produces a wire element ready to be handed to the foreign side.
    fn to_wire(host: &Self::Host) -> Result<Self::Wire, ConversionError>;

    /// Copies a foreign-produced wire element into a host element.
    ///
    /// The wire element stays owned by whoever passed it in.
    fn to_host(wire: &Self::Wire) -> Result<Self::Host, ConversionError>;

    /// Size of a host element in bytes, for `max_element_bytes` enforcement.
    fn host_len(host: &Self::Host) -> usize;

    /// Size of a wire element in bytes, for `max_element_bytes` enforcement.
    fn wire_len(wire: &Self::Wire) -> usize;
}

/// UTF-8 text elements: `String` on the host, a byte buffer on the wire.
#[derive(Debug, Clone, Copy, Default)]
pub struct Text;

impl Marshal for Text {
    type Host = String;
    type Wire = WireBuffer;

    const ELEMENT: &'static str = "string";

    fn to_wire(host: &String) -> Result<WireBuffer, ConversionError> {
        Ok(WireBuffer::from_bytes(host.as_bytes()))
    }

    fn to_host(wire: &WireBuffer) -> Result<String, ConversionError> {
        match std::str::from_utf8(wire.as_bytes()) {
            Ok(text) => Ok(text.to_owned()),
            Err(err) => Err(ConversionError::InvalidUtf8 {
                valid_up_to: err.valid_up_to(),
            }),
        }
    }

    fn host_len(host: &String) -> usize {
        host.len()
    }

    fn wire_len(wire: &WireBuffer) -> usize {
        wire.len()
    }
}

/// Opaque binary elements: `Vec<u8>` on the host, copied verbatim on the wire.
#[derive(Debug, Clone, Copy, Default)]
pub struct Binary;

impl Marshal for Binary {
    type Host = Vec<u8>;
    type Wire = WireBuffer;

    const ELEMENT: &'static str = "binary";

    fn to_wire(host: &Vec<u8>) -> Result<WireBuffer, ConversionError> {
        Ok(WireBuffer::from_bytes(host))
    }

    fn to_host(wire: &WireBuffer) -> Result<Vec<u8>, ConversionError> {
        Ok(wire.as_bytes().to_vec())
    }

    fn host_len(host: &Vec<u8>) -> usize {
        host.len()
    }

    fn wire_len(wire: &WireBuffer) -> usize {
        wire.len()
    }
}

/// Checks an element size against an optional limit.
pub(crate) fn check_len(len: usize, limit: Option<usize>) -> Result<(), ConversionError> {
    match limit {
        Some(limit) if len > limit => Err(ConversionError::TooLarge { len, limit }),
        _ => Ok(()),
    }
}
