//! Error types for tessera-core
//!
//! Every fallible accessor on an [`Event`](crate::Event) returns one of these
//! errors directly. Nothing is recorded on the event itself.

use thiserror::Error;

/// Errors raised by a payload's own encode/decode capability
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The payload could not be turned into bytes
    #[error("Encode error: {0}")]
    Encode(String),

    /// The bytes could not be turned back into a payload
    #[error("Decode error: {0}")]
    Decode(String),
}

impl PayloadError {
    /// Create a new Encode error
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode(message.into())
    }

    /// Create a new Decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}

/// Errors that can occur while working with an event record
#[derive(Debug, Error)]
pub enum EventError {
    /// No entry with this ID exists in the event
    #[error("No such entry: {0}")]
    NotFound(u64),

    /// The entry's type cannot be resolved to a registered payload type
    #[error("Unknown type '{type_name}' (type id {type_id}) for entry {entry_id}")]
    UnknownType {
        entry_id: u64,
        type_id: u64,
        type_name: String,
    },

    /// The raw payload bytes could not be decoded
    #[error("Failed to decode entry {entry_id} with type {type_name}: {reason}")]
    Decode {
        entry_id: u64,
        type_name: String,
        reason: String,
    },

    /// A cached payload could not be re-encoded
    #[error("Failed to encode entry {entry_id} with type {type_name}: {reason}")]
    Encode {
        entry_id: u64,
        type_name: String,
        reason: String,
    },

    /// The entry holds a different payload type than the one requested
    #[error("Entry {entry_id} holds {actual}, not {expected}")]
    TypeMismatch {
        entry_id: u64,
        expected: &'static str,
        actual: String,
    },

    /// A different Rust type is already registered under this name
    #[error("Payload type name already registered to a different type: {0}")]
    RegistryConflict(String),

    /// The persisted event block is structurally invalid
    #[error("Malformed event block: {0}")]
    Malformed(String),
}

impl EventError {
    /// Create a new Malformed error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

impl From<postcard::Error> for EventError {
    fn from(err: postcard::Error) -> Self {
        EventError::Malformed(err.to_string())
    }
}

/// Result alias for event operations
pub type Result<T> = std::result::Result<T, EventError>;
