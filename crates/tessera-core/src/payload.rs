//! Payload capabilities
//!
//! An entry payload is any type that can name itself and turn itself into
//! bytes. Each payload type provides exactly one of two encoding capabilities:
//!
//! - **Self-describing**: the type implements [`SelfDescribing`] and owns its
//!   byte layout.
//! - **Generic**: the type is a plain serde structure and is encoded with
//!   postcard.
//!
//! The capability is bound once per type by [`generic_payload!`] or
//! [`self_describing_payload!`], so encode and decode never have to probe
//! a value at runtime.
//!
//! ## Example
//!
//! ```rust,ignore
//! use serde::{Deserialize, Serialize};
//! use tessera_core::generic_payload;
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct SimCalorimeterHit {
//!     energy: f32,
//!     pos: [f32; 3],
//! }
//!
//! generic_payload!(SimCalorimeterHit, "sim.SimCalorimeterHit");
//! ```

use std::any::Any;
use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::PayloadError;

/// How a payload type turns itself into bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// The type implements [`SelfDescribing`]
    SelfDescribing,
    /// The type is encoded field-by-field with postcard
    Generic,
}

/// A decoded entry payload, usable behind `dyn`
pub trait Payload: Any + fmt::Debug + Send {
    /// Stable, process-independent name of the payload type
    fn type_name(&self) -> &'static str;

    /// Encode this value through the type's capability
    fn encode(&self) -> Result<Vec<u8>, PayloadError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Static side of a payload type, used by the registry to build decoders
pub trait NamedPayload: Payload + Sized {
    const TYPE_NAME: &'static str;
    const ENCODING: Encoding;

    /// Build a value of this type from its encoded bytes
    fn decode(bytes: &[u8]) -> Result<Self, PayloadError>;
}

/// Explicit encode/decode capability for types that manage their own layout
pub trait SelfDescribing: Sized {
    fn marshal(&self) -> Result<Vec<u8>, PayloadError>;

    fn unmarshal(bytes: &[u8]) -> Result<Self, PayloadError>;
}

/// Encode a plain structure with postcard
pub fn encode_generic<T: Serialize>(value: &T) -> Result<Vec<u8>, PayloadError> {
    postcard::to_allocvec(value).map_err(|e| PayloadError::encode(e.to_string()))
}

/// Decode a plain structure with postcard
///
/// The bytes must hold exactly one value; anything left over is an error.
pub fn decode_generic<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, PayloadError> {
    let (value, rest) =
        postcard::take_from_bytes(bytes).map_err(|e| PayloadError::decode(e.to_string()))?;
    if !rest.is_empty() {
        return Err(PayloadError::decode(format!(
            "{} trailing bytes after value",
            rest.len()
        )));
    }
    Ok(value)
}

/// Bind a serde type to a payload name using the generic capability
#[macro_export]
macro_rules! generic_payload {
    ($ty:ty, $name:expr) => {
        impl $crate::Payload for $ty {
            fn type_name(&self) -> &'static str {
                $name
            }

            fn encode(&self) -> ::std::result::Result<::std::vec::Vec<u8>, $crate::PayloadError> {
                $crate::payload::encode_generic(self)
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
        }

        impl $crate::NamedPayload for $ty {
            const TYPE_NAME: &'static str = $name;
            const ENCODING: $crate::Encoding = $crate::Encoding::Generic;

            fn decode(bytes: &[u8]) -> ::std::result::Result<Self, $crate::PayloadError> {
                $crate::payload::decode_generic(bytes)
            }
        }
    };
}

/// Bind a [`SelfDescribing`] type to a payload name
#[macro_export]
macro_rules! self_describing_payload {
    ($ty:ty, $name:expr) => {
        impl $crate::Payload for $ty {
            fn type_name(&self) -> &'static str {
                $name
            }

            fn encode(&self) -> ::std::result::Result<::std::vec::Vec<u8>, $crate::PayloadError> {
                $crate::SelfDescribing::marshal(self)
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
        }

        impl $crate::NamedPayload for $ty {
            const TYPE_NAME: &'static str = $name;
            const ENCODING: $crate::Encoding = $crate::Encoding::SelfDescribing;

            fn decode(bytes: &[u8]) -> ::std::result::Result<Self, $crate::PayloadError> {
                <$ty as $crate::SelfDescribing>::unmarshal(bytes)
            }
        }
    };
}
