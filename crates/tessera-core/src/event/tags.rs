//! Tag index
//!
//! Tags are the persisted index: name -> ordered entry IDs. The reverse
//! direction (entry -> tags) is a cache built by scanning and dropped
//! whenever the membership of an entry changes.

use super::Event;
use crate::error::{EventError, Result};

impl Event {
    /// Entry IDs carrying `tag`, in insertion order
    ///
    /// An unknown tag yields an empty slice.
    pub fn tagged_entries(&self, tag: &str) -> &[u64] {
        self.block
            .tags
            .get(tag)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All tag names, sorted
    pub fn tags(&self) -> Vec<String> {
        self.block.tags.keys().cloned().collect()
    }

    /// Sorted tag names carrying an entry
    pub fn entry_tags(&mut self, id: u64) -> Vec<String> {
        if let Some(tags) = self.tag_lookup.get(&id) {
            return tags.clone();
        }

        let tags: Vec<String> = self
            .block
            .tags
            .iter()
            .filter(|(_, ids)| ids.contains(&id))
            .map(|(name, _)| name.clone())
            .collect();

        if self.block.entries.contains_key(&id) {
            self.tag_lookup.insert(id, tags.clone());
        }
        tags
    }

    /// Append an existing entry to a tag, creating the tag if needed
    pub fn tag_entry(&mut self, id: u64, tag: &str) -> Result<()> {
        if !self.block.entries.contains_key(&id) {
            return Err(EventError::NotFound(id));
        }
        self.push_tag(id, tag);
        self.tag_lookup.remove(&id);
        Ok(())
    }

    /// Remove every occurrence of an entry from a tag
    ///
    /// The tag itself stays, even if it ends up empty.
    pub fn untag_entry(&mut self, id: u64, tag: &str) -> Result<()> {
        if !self.block.entries.contains_key(&id) {
            return Err(EventError::NotFound(id));
        }
        if let Some(ids) = self.block.tags.get_mut(tag) {
            ids.retain(|&tagged| tagged != id);
        }
        self.tag_lookup.remove(&id);
        Ok(())
    }

    /// Delete a tag; the entries it referenced are untouched
    pub fn remove_tag(&mut self, tag: &str) {
        if let Some(ids) = self.block.tags.remove(tag) {
            for id in ids {
                self.tag_lookup.remove(&id);
            }
        }
    }

    pub(super) fn push_tag(&mut self, id: u64, tag: &str) {
        match self.block.tags.get_mut(tag) {
            Some(ids) => ids.push(id),
            None => {
                self.block.tags.insert(tag.to_string(), vec![id]);
            }
        }
    }
}
