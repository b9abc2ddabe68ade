/*
    filter.rs - Requester side summary of known entries

    A DataFilter tells a peer which slots the requester already holds and at
    which version. An entry counts as known when the filter holds its slot at
    the same or a higher sequence number, so a stale replica is still offered
    the newer version.
*/

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core_store::key::StorageKey;
use crate::core_store::store::StoreEntry;

/// "I have this slot at this version"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterEntry {
    pub hash: StorageKey,
    pub sequence_number: u32,
}

impl FilterEntry {
    pub fn new(hash: StorageKey, sequence_number: u32) -> Self {
        FilterEntry {
            hash,
            sequence_number,
        }
    }

    pub fn from_entry<E: StoreEntry>(key: &StorageKey, entry: &E) -> Self {
        FilterEntry::new(*key, entry.sequence_number())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFilter {
    known: HashMap<StorageKey, u32>,
}

impl DataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from entries; duplicates keep the highest sequence number
    pub fn from_entries(entries: impl IntoIterator<Item = FilterEntry>) -> Self {
        let mut filter = Self::new();
        for entry in entries {
            filter.insert(entry);
        }
        filter
    }

    pub fn insert(&mut self, entry: FilterEntry) {
        let seq = self.known.entry(entry.hash).or_insert(entry.sequence_number);
        if *seq < entry.sequence_number {
            *seq = entry.sequence_number;
        }
    }

    /// Whether the requester already holds `entry` or something newer
    pub fn knows(&self, entry: &FilterEntry) -> bool {
        self.known
            .get(&entry.hash)
            .map(|known| *known >= entry.sequence_number)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    pub fn entries(&self) -> Vec<FilterEntry> {
        self.known
            .iter()
            .map(|(hash, seq)| FilterEntry::new(*hash, *seq))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> StorageKey {
        StorageKey::from_bytes([byte; 32])
    }

    #[test]
    fn test_known_at_same_or_higher_version() {
        let filter = DataFilter::from_entries([FilterEntry::new(key(1), 5)]);
        assert!(filter.knows(&FilterEntry::new(key(1), 4)));
        assert!(filter.knows(&FilterEntry::new(key(1), 5)));
        assert!(!filter.knows(&FilterEntry::new(key(1), 6)));
        assert!(!filter.knows(&FilterEntry::new(key(2), 0)));
    }

    #[test]
    fn test_duplicates_keep_highest() {
        let filter = DataFilter::from_entries([
            FilterEntry::new(key(1), 7),
            FilterEntry::new(key(1), 3),
        ]);
        assert_eq!(filter.len(), 1);
        assert_eq!(filter.entries(), vec![FilterEntry::new(key(1), 7)]);
    }
}
