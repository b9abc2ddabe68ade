/*
    inventory.rs - Responder side delta computation

    Given a peer's DataFilter, collect the records the peer lacks. Candidates
    are ordered by type priority (higher first), additions before tombstones,
    newest first. Collection stops once the encoded size would exceed the
    budget; the flag then tells the peer to ask again.
*/

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

use super::filter::{DataFilter, FilterEntry};
use crate::core_store::key::StorageKey;
use crate::core_store::metadata::MetaData;
use crate::core_store::request::DataRequest;
use crate::core_store::store::{StoreEntry, StoreResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub entries: Vec<DataRequest>,
    /// Entries withheld because the requester already had them
    pub num_filtered_out: usize,
    pub max_size_reached: bool,
}

impl Inventory {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One record offered to the inventory computation
#[derive(Debug, Clone)]
pub struct InventoryCandidate {
    pub filter_entry: FilterEntry,
    pub priority: i32,
    pub created: u64,
    pub request: DataRequest,
}

impl InventoryCandidate {
    pub fn from_entry<E: StoreEntry>(key: &StorageKey, entry: &E, meta_data: &MetaData) -> Self {
        InventoryCandidate {
            filter_entry: FilterEntry::from_entry(key, entry),
            priority: meta_data.priority,
            created: entry.created(),
            request: entry.to_data_request(),
        }
    }
}

pub fn compute_inventory(
    candidates: impl IntoIterator<Item = InventoryCandidate>,
    filter: &DataFilter,
    max_size_bytes: u64,
) -> StoreResult<Inventory> {
    let mut num_filtered_out = 0;
    let mut missing: Vec<InventoryCandidate> = candidates
        .into_iter()
        .filter(|candidate| {
            let known = filter.knows(&candidate.filter_entry);
            if known {
                num_filtered_out += 1;
            }
            !known
        })
        .collect();

    missing.sort_by_key(|c| (Reverse(c.priority), c.request.is_removal(), Reverse(c.created)));

    let mut inventory = Inventory {
        entries: Vec::new(),
        num_filtered_out,
        max_size_reached: false,
    };
    let mut accumulated = 0u64;
    for candidate in missing {
        let size = candidate.request.serialized_size()?;
        // Always ship at least one entry so an oversized record cannot stall the exchange
        if !inventory.entries.is_empty() && accumulated + size > max_size_bytes {
            inventory.max_size_reached = true;
            break;
        }
        accumulated += size;
        inventory.entries.push(candidate.request);
    }
    Ok(inventory)
}
