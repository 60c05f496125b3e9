//! Event-local type table
//!
//! Type IDs are small integers standing in for payload type names so the name
//! is stored once per event instead of once per entry. They mean nothing
//! outside the event that assigned them.

use tracing::trace;

use super::Event;
use crate::error::{EventError, Result};
use crate::registry::PayloadKind;

impl Event {
    /// Resolve the type ID for a type name, assigning a new one on first sight
    pub(super) fn type_id_for(&mut self, type_name: &str) -> u64 {
        if let Some(&id) = self.type_lookup.get(type_name) {
            return id;
        }

        // Blocks read from a stream arrive with a populated table but an
        // empty lookup cache.
        if let Some(id) = self.type_id_of(type_name) {
            self.type_lookup.insert(type_name.to_string(), id);
            return id;
        }

        self.block.n_types += 1;
        let id = self.block.n_types;
        self.block.types.insert(id, type_name.to_string());
        self.type_lookup.insert(type_name.to_string(), id);
        trace!(type_id = id, type_name, "Assigned type id");
        id
    }

    /// Resolve and cache the payload kind for a type ID
    pub(super) fn kind_for(&mut self, entry_id: u64, type_id: u64) -> Result<PayloadKind> {
        if let Some(kind) = self.kind_cache.get(&type_id) {
            return Ok(*kind);
        }

        let kind = self.resolve_kind(entry_id, type_id)?;
        self.kind_cache.insert(type_id, kind);
        Ok(kind)
    }

    /// Resolve the payload kind for a type ID without caching it
    pub(super) fn resolve_kind(&self, entry_id: u64, type_id: u64) -> Result<PayloadKind> {
        if let Some(kind) = self.kind_cache.get(&type_id) {
            return Ok(*kind);
        }

        let unknown = |type_name: &str| EventError::UnknownType {
            entry_id,
            type_id,
            type_name: type_name.to_string(),
        };
        let type_name = self
            .block
            .types
            .get(&type_id)
            .ok_or_else(|| unknown("<unassigned>"))?;
        self.registry
            .lookup(type_name)
            .ok_or_else(|| unknown(type_name.as_str()))
    }

    /// Type ID assigned to a type name in this event, if any
    pub fn type_id_of(&self, type_name: &str) -> Option<u64> {
        if let Some(&id) = self.type_lookup.get(type_name) {
            return Some(id);
        }
        self.block
            .types
            .iter()
            .find(|(_, name)| name.as_str() == type_name)
            .map(|(&id, _)| id)
    }

    /// Type name of an entry
    pub fn entry_type_name(&self, id: u64) -> Option<&str> {
        let record = self.block.entries.get(&id)?;
        self.block.types.get(&record.type_id).map(String::as_str)
    }

    /// Type ID of an entry
    pub fn entry_type_id(&self, id: u64) -> Option<u64> {
        self.block.entries.get(&id).map(|record| record.type_id)
    }

    /// Iterate the type table in ID order
    pub fn types(&self) -> impl Iterator<Item = (u64, &str)> {
        self.block
            .types
            .iter()
            .map(|(&id, name)| (id, name.as_str()))
    }

    /// Number of rows in the type table
    pub fn type_count(&self) -> usize {
        self.block.types.len()
    }
}
