/*
    data_store.rs - Persisted key to record map for one payload type

    Responsibilities:
    - concurrent map access behind a RwLock, outside readers get clones
    - load-time pruning of expired and surplus entries
    - rate-limited persistence: writers mark the store dirty, a background
      flusher writes at most once per interval

    On-disk format: "NSDB" magic, format version byte, big endian CRC32 of
    the body, then the bincode encoded map.
*/

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};

use super::blob::BlobStore;
use super::errors::{handle_poison, StoreError, StoreResult};
use crate::core_store::key::StorageKey;
use crate::core_store::metadata::{now_millis, MetaData};
use crate::core_store::payload::StoreFamily;
use crate::core_store::request::DataRequest;
use crate::metrics::{record_store_counter, Timer, PERSIST_DURATION, PERSIST_FAILURES, PERSIST_WRITES};

const MAGIC: &[u8; 4] = b"NSDB";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = 9;

/// A record a store can hold
pub trait StoreEntry: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Creation date in milliseconds, drives ttl and load pruning
    fn created(&self) -> u64;

    /// Version of the slot; always 0 for unversioned data
    fn sequence_number(&self) -> u32;

    fn is_tombstone(&self) -> bool;

    /// The request that reproduces this record on another peer
    fn to_data_request(&self) -> DataRequest;
}

/// What load-time pruning did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub expired: usize,
    pub over_capacity: usize,
    pub not_retained: usize,
}

impl LoadReport {
    pub fn pruned(&self) -> usize {
        self.expired + self.over_capacity + self.not_retained
    }
}

/// Drop rejected and expired entries, then keep only the newest `max_map_size`
pub fn prune_on_load<E, F>(
    mut map: HashMap<StorageKey, E>,
    meta_data: &MetaData,
    now: u64,
    retain: F,
) -> (HashMap<StorageKey, E>, LoadReport)
where
    E: StoreEntry,
    F: Fn(&E) -> bool,
{
    let mut report = LoadReport::default();

    let before = map.len();
    map.retain(|_, entry| retain(entry));
    report.not_retained = before - map.len();

    let before = map.len();
    map.retain(|_, entry| !meta_data.is_expired(entry.created(), now));
    report.expired = before - map.len();

    if map.len() > meta_data.max_map_size {
        let mut entries: Vec<_> = map.into_iter().collect();
        entries.sort_by(|a, b| b.1.created().cmp(&a.1.created()));
        report.over_capacity = entries.len() - meta_data.max_map_size;
        entries.truncate(meta_data.max_map_size);
        map = entries.into_iter().collect();
    }

    report.loaded = map.len();
    (map, report)
}

fn encode<E: StoreEntry>(map: &HashMap<StorageKey, E>) -> StoreResult<Vec<u8>> {
    let body = bincode::serialize(map)?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
    bytes.extend_from_slice(MAGIC);
    bytes.push(FORMAT_VERSION);
    bytes.extend_from_slice(&crc32fast::hash(&body).to_be_bytes());
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

fn decode<E: StoreEntry>(bytes: &[u8]) -> StoreResult<HashMap<StorageKey, E>> {
    if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
        return Err(StoreError::CorruptedData("missing store header".to_string()));
    }
    if bytes[4] != FORMAT_VERSION {
        return Err(StoreError::CorruptedData(format!(
            "unsupported format version {}",
            bytes[4]
        )));
    }
    let mut checksum = [0u8; 4];
    checksum.copy_from_slice(&bytes[5..HEADER_LEN]);
    let body = &bytes[HEADER_LEN..];
    if crc32fast::hash(body) != u32::from_be_bytes(checksum) {
        return Err(StoreError::CorruptedData("checksum mismatch".to_string()));
    }
    bincode::deserialize(body).map_err(|e| StoreError::Deserialization(e.to_string()))
}

/// Persisted, concurrent map for one payload type
pub struct DataStore<E: StoreEntry> {
    name: String,
    family: StoreFamily,
    meta_data: MetaData,
    map: RwLock<HashMap<StorageKey, E>>,
    blob_store: Arc<dyn BlobStore>,
    dirty: AtomicBool,
}

impl<E: StoreEntry> DataStore<E> {
    /// Empty store that has never been persisted
    pub fn new(family: StoreFamily, meta_data: MetaData, blob_store: Arc<dyn BlobStore>) -> Self {
        Self::with_entries(family, meta_data, blob_store, HashMap::new())
    }

    fn with_entries(
        family: StoreFamily,
        meta_data: MetaData,
        blob_store: Arc<dyn BlobStore>,
        entries: HashMap<StorageKey, E>,
    ) -> Self {
        DataStore {
            name: format!("{}/{}", family, meta_data.type_id),
            family,
            meta_data,
            map: RwLock::new(entries),
            blob_store,
            dirty: AtomicBool::new(false),
        }
    }

    /// Read the persisted snapshot off the async runtime and prune it
    ///
    /// A corrupted snapshot is discarded: the store only caches network
    /// state and refills through reconciliation.
    pub async fn load<F>(
        family: StoreFamily,
        meta_data: MetaData,
        blob_store: Arc<dyn BlobStore>,
        retain: F,
    ) -> StoreResult<(Self, LoadReport)>
    where
        F: Fn(&E) -> bool + Send + 'static,
    {
        let blob = blob_store.clone();
        let type_id = meta_data.type_id;
        let (entries, report, discarded) = tokio::task::spawn_blocking(move || -> StoreResult<_> {
            let mut discarded = false;
            let map = match blob.read(family, type_id)? {
                Some(bytes) => match decode::<E>(&bytes) {
                    Ok(map) => map,
                    Err(e) => {
                        warn!(family = %family, type_id, error = %e, "Discarding unreadable store snapshot");
                        discarded = true;
                        HashMap::new()
                    }
                },
                None => HashMap::new(),
            };
            let (map, report) = prune_on_load(map, &meta_data, now_millis(), retain);
            Ok((map, report, discarded))
        })
        .await??;

        let store = Self::with_entries(family, meta_data, blob_store, entries);
        if report.pruned() > 0 || discarded {
            store.persist();
        }
        info!(
            store = %store.name,
            loaded = report.loaded,
            expired = report.expired,
            over_capacity = report.over_capacity,
            not_retained = report.not_retained,
            "Loaded store"
        );
        Ok((store, report))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> StoreFamily {
        self.family
    }

    pub fn meta_data(&self) -> &MetaData {
        &self.meta_data
    }

    pub fn get(&self, key: &StorageKey) -> StoreResult<Option<E>> {
        let map = self.map.read().map_err(handle_poison)?;
        Ok(map.get(key).cloned())
    }

    pub fn contains_key(&self, key: &StorageKey) -> StoreResult<bool> {
        let map = self.map.read().map_err(handle_poison)?;
        Ok(map.contains_key(key))
    }

    /// Entry count, tombstones included
    pub fn len(&self) -> StoreResult<usize> {
        let map = self.map.read().map_err(handle_poison)?;
        Ok(map.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn tombstone_count(&self) -> StoreResult<usize> {
        let map = self.map.read().map_err(handle_poison)?;
        Ok(map.values().filter(|e| e.is_tombstone()).count())
    }

    /// Point in time copy of all entries
    pub fn snapshot(&self) -> StoreResult<Vec<(StorageKey, E)>> {
        let map = self.map.read().map_err(handle_poison)?;
        Ok(map.iter().map(|(k, v)| (*k, v.clone())).collect())
    }

    /// Run `f` with exclusive access to the map
    ///
    /// Admission runs inside this closure so that reading the current entry
    /// and replacing it is one atomic step.
    pub fn update<R, F>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut HashMap<StorageKey, E>) -> R,
    {
        let mut map = self.map.write().map_err(handle_poison)?;
        Ok(f(&mut map))
    }

    /// Remove entries whose ttl elapsed at `now`
    pub fn remove_expired(&self, now: u64) -> StoreResult<Vec<(StorageKey, E)>> {
        let removed = {
            let mut map = self.map.write().map_err(handle_poison)?;
            let expired: Vec<StorageKey> = map
                .iter()
                .filter(|(_, entry)| self.meta_data.is_expired(entry.created(), now))
                .map(|(key, _)| *key)
                .collect();
            expired
                .into_iter()
                .filter_map(|key| map.remove(&key).map(|entry| (key, entry)))
                .collect::<Vec<_>>()
        };
        if !removed.is_empty() {
            self.persist();
        }
        Ok(removed)
    }

    /// Encoded size of the whole map
    pub fn serialized_size(&self) -> StoreResult<u64> {
        let map = self.map.read().map_err(handle_poison)?;
        Ok(bincode::serialized_size(&*map)?)
    }

    /// Request a write on the next flush
    pub fn persist(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Write the snapshot if the store changed since the last write
    ///
    /// Returns whether a write happened. A failed write leaves the store
    /// dirty so the next flush retries; in-memory state is untouched.
    pub fn flush(&self) -> StoreResult<bool> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(false);
        }

        let timer = Timer::new(PERSIST_DURATION);
        let result = self
            .map
            .read()
            .map_err(handle_poison)
            .and_then(|map| encode(&map))
            .and_then(|bytes| self.blob_store.write(self.family, self.meta_data.type_id, &bytes));

        match result {
            Ok(()) => {
                timer.stop();
                record_store_counter(PERSIST_WRITES, &self.name, 1);
                debug!(store = %self.name, "Persisted store");
                Ok(true)
            }
            Err(e) => {
                self.persist();
                record_store_counter(PERSIST_FAILURES, &self.name, 1);
                error!(store = %self.name, error = %e, "Failed to persist store, retrying on next flush");
                Err(e)
            }
        }
    }
}
