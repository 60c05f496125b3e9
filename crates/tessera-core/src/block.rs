//! Persisted event block
//!
//! The block is the canonical, self-contained form of one event: counters,
//! raw entry payloads, the local type table and the tag table. It is what a
//! writer compresses into a frame body and what a reader hands back to
//! [`Event::decode_block`](crate::Event::decode_block).
//!
//! ## Encoding
//!
//! postcard over ordered maps, so the same event always encodes to the same
//! bytes:
//! ```text
//! n_entries | n_types | entries{id -> (type_id, payload)} | types{id -> name} | tags{name -> [id]}
//! ```

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{EventError, Result};

/// One entry as stored on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    /// Event-local type ID
    pub type_id: u64,
    /// Encoded payload
    pub payload: Bytes,
}

/// The persisted structure of an event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBlock {
    /// Last assigned entry ID
    pub n_entries: u64,
    /// Last assigned type ID
    pub n_types: u64,
    pub entries: BTreeMap<u64, EntryRecord>,
    pub types: BTreeMap<u64, String>,
    pub tags: BTreeMap<String, Vec<u64>>,
}

impl EventBlock {
    /// Serialize the block
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        postcard::to_allocvec(self).map_err(|e| EventError::malformed(e.to_string()))
    }

    /// Parse and validate a block
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (block, rest): (EventBlock, &[u8]) = postcard::take_from_bytes(bytes)?;
        if !rest.is_empty() {
            return Err(EventError::malformed(format!(
                "{} trailing bytes after block",
                rest.len()
            )));
        }
        block.validate()?;
        Ok(block)
    }

    /// Check the structural invariants of a block
    ///
    /// IDs never exceed their counters, type names are unique and every
    /// tagged ID refers to a live entry.
    pub fn validate(&self) -> Result<()> {
        if let Some((&id, _)) = self.entries.last_key_value() {
            if id == 0 || id > self.n_entries {
                return Err(EventError::malformed(format!(
                    "entry id {id} outside counter {}",
                    self.n_entries
                )));
            }
        }
        if self.entries.contains_key(&0) {
            return Err(EventError::malformed("entry id 0 is reserved"));
        }

        if self.types.contains_key(&0) {
            return Err(EventError::malformed("type id 0 is reserved"));
        }
        if let Some((&id, _)) = self.types.last_key_value() {
            if id > self.n_types {
                return Err(EventError::malformed(format!(
                    "type id {id} outside counter {}",
                    self.n_types
                )));
            }
        }

        let mut seen = std::collections::HashSet::with_capacity(self.types.len());
        for name in self.types.values() {
            if !seen.insert(name.as_str()) {
                return Err(EventError::malformed(format!("duplicate type name '{name}'")));
            }
        }

        for (tag, ids) in &self.tags {
            if let Some(id) = ids.iter().find(|id| !self.entries.contains_key(id)) {
                return Err(EventError::malformed(format!(
                    "tag '{tag}' references missing entry {id}"
                )));
            }
        }

        Ok(())
    }
}
