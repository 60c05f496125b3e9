//! Payload type registry
//!
//! Maps payload type names to decode factories. Events only ever store type
//! names on the wire, so a reader needs this table to turn raw entry bytes
//! back into values.
//!
//! The registry is an external collaborator of every [`Event`](crate::Event):
//! events hold an `Arc` to one and only look names up in it. A process-wide
//! instance is available through [`PayloadRegistry::global`].

use std::any::TypeId;
use std::fmt;
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::error::{EventError, PayloadError, Result};
use crate::payload::{Encoding, NamedPayload, Payload};

/// Factory that decodes raw bytes into a boxed payload of one concrete type
pub type DecodeFn = fn(&[u8]) -> std::result::Result<Box<dyn Payload>, PayloadError>;

/// Everything the core needs to know about one registered payload type
#[derive(Clone, Copy)]
pub struct PayloadKind {
    /// Registered name
    pub type_name: &'static str,
    /// Capability used to encode and decode values of this type
    pub encoding: Encoding,
    /// Decode factory
    pub decode: DecodeFn,
    type_id: TypeId,
}

impl fmt::Debug for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadKind")
            .field("type_name", &self.type_name)
            .field("encoding", &self.encoding)
            .finish()
    }
}

fn decode_boxed<T: NamedPayload>(
    bytes: &[u8],
) -> std::result::Result<Box<dyn Payload>, PayloadError> {
    T::decode(bytes).map(|value| Box::new(value) as Box<dyn Payload>)
}

impl PayloadKind {
    /// Describe a payload type
    pub fn of<T: NamedPayload>() -> Self {
        Self {
            type_name: T::TYPE_NAME,
            encoding: T::ENCODING,
            decode: decode_boxed::<T>,
            type_id: TypeId::of::<T>(),
        }
    }
}

static GLOBAL: LazyLock<Arc<PayloadRegistry>> = LazyLock::new(|| Arc::new(PayloadRegistry::new()));

/// Name -> decode factory table
///
/// Uses `DashMap` so payload types can be registered from any thread while
/// readers on other threads resolve names.
#[derive(Debug, Default)]
pub struct PayloadRegistry {
    kinds: DashMap<String, PayloadKind>,
}

impl PayloadRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            kinds: DashMap::new(),
        }
    }

    /// The process-wide registry used by [`Event::new`](crate::Event::new)
    pub fn global() -> Arc<PayloadRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Register a payload type under its `TYPE_NAME`
    ///
    /// Registering the same type twice is a no-op. Registering a different
    /// type under a name that is already taken fails with
    /// [`EventError::RegistryConflict`].
    pub fn register<T: NamedPayload>(&self) -> Result<()> {
        let kind = PayloadKind::of::<T>();
        match self.kinds.entry(kind.type_name.to_string()) {
            Entry::Occupied(existing) if existing.get().type_id == kind.type_id => Ok(()),
            Entry::Occupied(_) => Err(EventError::RegistryConflict(kind.type_name.to_string())),
            Entry::Vacant(slot) => {
                debug!(type_name = kind.type_name, encoding = ?kind.encoding, "Registered payload type");
                slot.insert(kind);
                Ok(())
            }
        }
    }

    /// Look up a payload type by name
    pub fn lookup(&self, type_name: &str) -> Option<PayloadKind> {
        self.kinds.get(type_name).map(|kind| *kind)
    }

    /// Check whether a name is registered
    pub fn contains(&self, type_name: &str) -> bool {
        self.kinds.contains_key(type_name)
    }

    /// Number of registered payload types
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Check if no payload types are registered
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Track {
        momentum: [f64; 3],
    }

    crate::generic_payload!(Track, "test.Track");

    #[derive(Debug, Serialize, Deserialize)]
    struct Impostor;

    crate::generic_payload!(Impostor, "test.Track");

    #[test]
    fn test_register_and_lookup() {
        let registry = PayloadRegistry::new();
        assert!(registry.is_empty());

        registry.register::<Track>().unwrap();
        assert!(registry.contains("test.Track"));
        assert_eq!(registry.len(), 1);

        let kind = registry.lookup("test.Track").unwrap();
        assert_eq!(kind.encoding, Encoding::Generic);

        let original = Track {
            momentum: [0.1, 0.2, 0.3],
        };
        let bytes = original.encode().unwrap();
        let decoded = (kind.decode)(&bytes).unwrap();
        assert_eq!(decoded.as_any().downcast_ref::<Track>(), Some(&original));
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = PayloadRegistry::new();
        registry.register::<Track>().unwrap();
        registry.register::<Track>().unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_name_conflict_rejected() {
        let registry = PayloadRegistry::new();
        registry.register::<Track>().unwrap();
        let err = registry.register::<Impostor>().unwrap_err();
        assert!(matches!(err, EventError::RegistryConflict(name) if name == "test.Track"));
    }

    #[test]
    fn test_unknown_name() {
        let registry = PayloadRegistry::new();
        assert!(registry.lookup("nope").is_none());
    }

    #[test]
    fn test_global_is_shared() {
        let a = PayloadRegistry::global();
        let b = PayloadRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
