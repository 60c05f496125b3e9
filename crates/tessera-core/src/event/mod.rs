//! Event records
//!
//! An [`Event`] is one self-contained record: a set of typed entries, a local
//! type table and a tag index. Entries are held in one of two forms:
//!
//! - **raw**: encoded bytes in the persisted [`EventBlock`], as read from a
//!   stream, decoded only when first requested
//! - **decoded**: a live payload object in the entry cache, as added by a
//!   producer or after a first [`Event::get_entry`]
//!
//! Before an event is written, [`Event::flush_cache`] re-encodes every decoded
//! entry so the block is once again the complete, canonical state.
//!
//! Events are single-owner. The lazy caches are mutated on read, which is why
//! every accessor that may decode takes `&mut self`.

mod tags;
mod types;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{trace, warn};

use crate::block::{EntryRecord, EventBlock};
use crate::error::{EventError, Result};
use crate::payload::{NamedPayload, Payload};
use crate::registry::{PayloadKind, PayloadRegistry};

/// One record of the container format
pub struct Event {
    /// Canonical persisted state
    block: EventBlock,
    /// Decode factories, shared with other events
    registry: Arc<PayloadRegistry>,
    /// type name -> type ID
    type_lookup: HashMap<String, u64>,
    /// entry ID -> tags carrying it
    tag_lookup: HashMap<u64, Vec<String>>,
    /// type ID -> resolved payload kind
    kind_cache: HashMap<u64, PayloadKind>,
    /// entry ID -> decoded payload not yet re-encoded
    entry_cache: HashMap<u64, Box<dyn Payload>>,
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl Event {
    /// Create an empty event bound to the global payload registry
    pub fn new() -> Self {
        Self::with_registry(PayloadRegistry::global())
    }

    /// Create an empty event bound to a specific payload registry
    pub fn with_registry(registry: Arc<PayloadRegistry>) -> Self {
        Self::from_block(EventBlock::default(), registry)
    }

    /// Wrap a persisted block; all entries start out undecoded
    pub fn from_block(block: EventBlock, registry: Arc<PayloadRegistry>) -> Self {
        Self {
            block,
            registry,
            type_lookup: HashMap::new(),
            tag_lookup: HashMap::new(),
            kind_cache: HashMap::new(),
            entry_cache: HashMap::new(),
        }
    }

    /// Parse a serialized block into an event
    pub fn decode_block(bytes: &[u8], registry: Arc<PayloadRegistry>) -> Result<Self> {
        let block = EventBlock::from_bytes(bytes)?;
        Ok(Self::from_block(block, registry))
    }

    /// Flush the entry cache and serialize the persisted block
    pub fn encode_block(&mut self) -> Result<Vec<u8>> {
        self.flush_cache()?;
        self.block.to_bytes()
    }

    /// Add a payload, tagging it with each of `tags`
    ///
    /// The payload type is registered with the event's registry the first
    /// time the event sees it, so entries stay decodable after a flush.
    /// Returns the newly assigned entry ID.
    pub fn add_entry<P: NamedPayload>(&mut self, entry: P, tags: &[&str]) -> u64 {
        if !self.type_lookup.contains_key(P::TYPE_NAME) {
            if let Err(e) = self.registry.register::<P>() {
                warn!(type_name = P::TYPE_NAME, error = %e, "Payload type name already claimed");
            }
        }
        self.add_boxed_entry(Box::new(entry), tags)
    }

    /// Add an already boxed payload
    ///
    /// Unlike [`Event::add_entry`] this does not register the type; it must
    /// already be known to the registry for the entry to decode after a flush.
    pub fn add_boxed_entry(&mut self, entry: Box<dyn Payload>, tags: &[&str]) -> u64 {
        let type_id = self.type_id_for(entry.type_name());

        self.block.n_entries += 1;
        let id = self.block.n_entries;
        self.block.entries.insert(
            id,
            EntryRecord {
                type_id,
                payload: Bytes::new(),
            },
        );
        self.entry_cache.insert(id, entry);

        for tag in tags {
            self.push_tag(id, tag);
        }
        self.tag_lookup.remove(&id);

        id
    }

    /// Add several payloads under one shared tag, preserving order
    pub fn add_entries<P, I>(&mut self, tag: &str, entries: I) -> Vec<u64>
    where
        P: NamedPayload,
        I: IntoIterator<Item = P>,
    {
        entries
            .into_iter()
            .map(|entry| self.add_entry(entry, &[tag]))
            .collect()
    }

    /// Get an entry, decoding it on first access
    ///
    /// Repeated calls return the same cached object without decoding again.
    pub fn get_entry(&mut self, id: u64) -> Result<&dyn Payload> {
        self.load_entry(id)?;
        self.entry_cache
            .get(&id)
            .map(|entry| entry.as_ref())
            .ok_or(EventError::NotFound(id))
    }

    /// Mutable access to an entry; changes are persisted by the next flush
    pub fn get_entry_mut(&mut self, id: u64) -> Result<&mut dyn Payload> {
        self.load_entry(id)?;
        self.entry_cache
            .get_mut(&id)
            .map(|entry| entry.as_mut())
            .ok_or(EventError::NotFound(id))
    }

    /// Typed view of an entry
    pub fn get_entry_as<T: NamedPayload>(&mut self, id: u64) -> Result<&T> {
        let entry = self.get_entry(id)?;
        let actual = entry.type_name();
        entry
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| EventError::TypeMismatch {
                entry_id: id,
                expected: T::TYPE_NAME,
                actual: actual.to_string(),
            })
    }

    /// Remove an entry from the event and from every tag
    ///
    /// IDs are never handed out again. Removing an absent ID does nothing.
    pub fn remove_entry(&mut self, id: u64) {
        for ids in self.block.tags.values_mut() {
            ids.retain(|&tagged| tagged != id);
        }

        self.tag_lookup.remove(&id);
        self.entry_cache.remove(&id);
        self.block.entries.remove(&id);
    }

    /// Snapshot of all live entry IDs, ascending
    pub fn all_entries(&self) -> Vec<u64> {
        self.block.entries.keys().copied().collect()
    }

    /// Check whether an entry exists
    pub fn contains_entry(&self, id: u64) -> bool {
        self.block.entries.contains_key(&id)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.block.entries.len()
    }

    /// Check if the event has no entries
    pub fn is_empty(&self) -> bool {
        self.block.entries.is_empty()
    }

    /// Last assigned entry ID
    pub fn entry_counter(&self) -> u64 {
        self.block.n_entries
    }

    /// Number of entries currently held decoded
    pub fn cached_entries(&self) -> usize {
        self.entry_cache.len()
    }

    /// Re-encode every decoded entry into the persisted block
    ///
    /// All entries are encoded before any is written back, so a failure
    /// leaves the event exactly as it was.
    pub fn flush_cache(&mut self) -> Result<()> {
        if self.entry_cache.is_empty() {
            return Ok(());
        }

        let mut encoded = Vec::with_capacity(self.entry_cache.len());
        for (&id, entry) in &self.entry_cache {
            let bytes = entry.encode().map_err(|e| EventError::Encode {
                entry_id: id,
                type_name: entry.type_name().to_string(),
                reason: e.to_string(),
            })?;
            encoded.push((id, bytes));
        }

        trace!(entries = encoded.len(), "Flushing decoded entries");
        for (id, bytes) in encoded {
            if let Some(record) = self.block.entries.get_mut(&id) {
                record.payload = Bytes::from(bytes);
            }
        }
        self.entry_cache.clear();

        Ok(())
    }

    /// Borrow the persisted block
    ///
    /// Entries that are only held decoded have empty payloads here until
    /// [`Event::flush_cache`] runs.
    pub fn block(&self) -> &EventBlock {
        &self.block
    }

    /// Payload registry this event decodes with
    pub fn registry(&self) -> &Arc<PayloadRegistry> {
        &self.registry
    }

    /// Decode an entry into the cache unless it is already there
    fn load_entry(&mut self, id: u64) -> Result<()> {
        if self.entry_cache.contains_key(&id) {
            return Ok(());
        }

        let decoded = self.decode_entry(id)?;
        self.entry_cache.insert(id, decoded);
        Ok(())
    }

    /// Decode the raw form of an entry without touching the entry cache
    fn decode_entry(&mut self, id: u64) -> Result<Box<dyn Payload>> {
        let type_id = self
            .block
            .entries
            .get(&id)
            .map(|record| record.type_id)
            .ok_or(EventError::NotFound(id))?;
        let kind = self.kind_for(id, type_id)?;
        self.decode_with(id, kind)
    }

    /// Decode the raw form of an entry without touching any cache
    fn decode_uncached(&self, id: u64) -> Result<Box<dyn Payload>> {
        let type_id = self
            .block
            .entries
            .get(&id)
            .map(|record| record.type_id)
            .ok_or(EventError::NotFound(id))?;
        let kind = self.resolve_kind(id, type_id)?;
        self.decode_with(id, kind)
    }

    fn decode_with(&self, id: u64, kind: PayloadKind) -> Result<Box<dyn Payload>> {
        let record = self.block.entries.get(&id).ok_or(EventError::NotFound(id))?;
        (kind.decode)(&record.payload).map_err(|e| EventError::Decode {
            entry_id: id,
            type_name: kind.type_name.to_string(),
            reason: e.to_string(),
        })
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("entries", &self.block.entries.len())
            .field("n_entries", &self.block.n_entries)
            .field("types", &self.block.types)
            .field("tags", &self.block.tags.keys().collect::<Vec<_>>())
            .field("cached", &self.entry_cache.len())
            .finish()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (tag, ids) in &self.block.tags {
            writeln!(f, "Tag: {tag}")?;
            for &id in ids {
                write!(f, "ID:{id} ")?;
                match self.entry_cache.get(&id) {
                    Some(entry) => writeln!(f, "{entry:?}")?,
                    None => match self.decode_uncached(id) {
                        Ok(entry) => writeln!(f, "{entry:?}")?,
                        Err(e) => writeln!(f, "<error: {e}>")?,
                    },
                }
            }
        }
        Ok(())
    }
}
