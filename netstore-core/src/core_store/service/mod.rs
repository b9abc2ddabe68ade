/*
    service - Admission engine for one payload type

    DataStorageService<P> decides whether an add, remove or refresh request
    changes its store. The policy P contributes the family rules; the engine
    enforces the shared ones:
    - stateless checks first, then stateful checks under the map's write lock,
      so two concurrent requests for one slot cannot both pass the
      sequence number check
    - new slots are rejected once the store is full, nothing is evicted
    - accepted changes mark the store for persistence and notify listeners
    - every outcome is logged and counted, severe rejections at warn level
*/

mod append_only;
mod authenticated;
mod listener;
mod mailbox;
mod policy;

pub use append_only::AppendOnlyPolicy;
pub use authenticated::AuthenticatedPolicy;
pub use listener::{DataListener, ListenerSet};
pub use mailbox::MailboxPolicy;
pub use policy::{AdmissionPolicy, RemovalPolicy, RemoveTransition};

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core_store::key::StorageKey;
use crate::core_store::metadata::{now_millis, MetaData};
use crate::core_store::payload::StoreFamily;
use crate::core_store::result::{DataStorageResult, Rejection};
use crate::core_store::store::{BlobStore, DataStore, StoreEntry, StoreResult};
use crate::metrics::{
    record_store_counter, record_store_entries, MetricsCollector, ADD_ACCEPTED, ADD_REJECTED,
    PRUNED_CAPACITY, PRUNED_EXPIRED, REFRESH_ACCEPTED, REFRESH_REJECTED, REMOVE_ACCEPTED,
    REMOVE_REJECTED, SEVERE_FAILURES,
};

pub type AuthenticatedDataStorageService = DataStorageService<AuthenticatedPolicy>;
pub type MailboxDataStorageService = DataStorageService<MailboxPolicy>;
pub type AppendOnlyDataStorageService = DataStorageService<AppendOnlyPolicy>;

/// Point in time figures of one store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub name: String,
    pub family: StoreFamily,
    pub type_id: String,
    pub entries: usize,
    pub tombstones: usize,
    pub max_map_size: usize,
    pub serialized_size: u64,
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Add,
    Remove,
    Refresh,
}

impl Operation {
    fn as_str(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Remove => "remove",
            Operation::Refresh => "refresh",
        }
    }

    fn metrics(&self) -> (&'static str, &'static str) {
        match self {
            Operation::Add => (ADD_ACCEPTED, ADD_REJECTED),
            Operation::Remove => (REMOVE_ACCEPTED, REMOVE_REJECTED),
            Operation::Refresh => (REFRESH_ACCEPTED, REFRESH_REJECTED),
        }
    }
}

/// Store of one payload type plus its admission rules
pub struct DataStorageService<P: AdmissionPolicy> {
    policy: P,
    store: DataStore<P::Entry>,
    listeners: ListenerSet<P::Payload>,
    collector: Arc<MetricsCollector>,
}

impl<P: AdmissionPolicy> DataStorageService<P> {
    /// Empty service without persisted state
    pub fn new(
        policy: P,
        meta_data: MetaData,
        blob_store: Arc<dyn BlobStore>,
        collector: Arc<MetricsCollector>,
    ) -> Self {
        DataStorageService {
            policy,
            store: DataStore::new(P::FAMILY, meta_data, blob_store),
            listeners: ListenerSet::new(),
            collector,
        }
    }

    /// Service over the persisted state of its type, pruned on load
    pub async fn load(
        policy: P,
        meta_data: MetaData,
        blob_store: Arc<dyn BlobStore>,
        collector: Arc<MetricsCollector>,
    ) -> StoreResult<Self> {
        let retain_policy = policy.clone();
        let (store, report) = DataStore::load(P::FAMILY, meta_data, blob_store, move |entry| {
            retain_policy.retain_on_load(entry)
        })
        .await?;

        if report.expired > 0 {
            record_store_counter(PRUNED_EXPIRED, store.name(), report.expired as u64);
            collector.add_pruned_expired(report.expired as u64);
        }
        if report.over_capacity > 0 {
            record_store_counter(PRUNED_CAPACITY, store.name(), report.over_capacity as u64);
            collector.add_pruned_capacity(report.over_capacity as u64);
        }
        if report.not_retained > 0 {
            warn!(store = store.name(), count = report.not_retained, "Dropped persisted entries that are no longer authorized");
        }
        record_store_entries(store.name(), report.loaded);

        Ok(DataStorageService {
            policy,
            store,
            listeners: ListenerSet::new(),
            collector,
        })
    }

    pub fn name(&self) -> &str {
        self.store.name()
    }

    pub fn meta_data(&self) -> &MetaData {
        self.store.meta_data()
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn store(&self) -> &DataStore<P::Entry> {
        &self.store
    }

    pub fn add_listener(&self, listener: Arc<dyn DataListener<P::Payload>>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn DataListener<P::Payload>>) -> bool {
        self.listeners.remove(listener)
    }

    pub fn add(&self, request: P::AddRequest) -> StoreResult<DataStorageResult<P::Payload>> {
        self.add_at(request, now_millis())
    }

    pub(crate) fn add_at(
        &self,
        request: P::AddRequest,
        now: u64,
    ) -> StoreResult<DataStorageResult<P::Payload>> {
        let outcome = self.admit(request, now)?;
        if let DataStorageResult::Accepted(payload) = &outcome {
            self.store.persist();
            self.update_entries_gauge();
            self.listeners.notify_added(self.name(), payload);
        }
        self.record(Operation::Add, &outcome);
        Ok(outcome)
    }

    fn admit(&self, request: P::AddRequest, now: u64) -> StoreResult<DataStorageResult<P::Payload>> {
        let meta_data = *self.store.meta_data();
        let key = match self
            .policy
            .key_of(&request)
            .and_then(|key| self.policy.check_add(&request, &meta_data, now).map(|_| key))
        {
            Ok(key) => key,
            Err(reason) => return Ok(DataStorageResult::Rejected(reason)),
        };

        let outcome = self.store.update(|map| {
            let stored = map.get(&key);
            self.policy.check_against_stored(&request, stored)?;
            if stored.is_none() && map.len() >= meta_data.max_map_size {
                return Err(Rejection::MaxMapSizeReached);
            }
            let entry = self.policy.to_entry(request);
            let payload = P::payload_of(&entry).ok_or(Rejection::DataInvalid)?;
            map.insert(key, entry);
            Ok(payload)
        })?;
        Ok(outcome.into())
    }

    /// Payload stored under `key`, None when absent or removed
    pub fn get(&self, key: &StorageKey) -> StoreResult<Option<P::Payload>> {
        Ok(self.store.get(key)?.as_ref().and_then(P::payload_of))
    }

    /// Raw record under `key`, tombstones included
    pub fn get_entry(&self, key: &StorageKey) -> StoreResult<Option<P::Entry>> {
        self.store.get(key)
    }

    /// Snapshot of all live payloads
    pub fn payloads(&self) -> StoreResult<Vec<P::Payload>> {
        Ok(self
            .store
            .snapshot()?
            .iter()
            .filter_map(|(_, entry)| P::payload_of(entry))
            .collect())
    }

    /// Snapshot of all records, tombstones included
    pub fn entries(&self) -> StoreResult<Vec<(StorageKey, P::Entry)>> {
        self.store.snapshot()
    }

    pub fn len(&self) -> StoreResult<usize> {
        self.store.len()
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        self.store.is_empty()
    }

    pub fn prune_expired(&self) -> StoreResult<usize> {
        self.prune_expired_at(now_millis())
    }

    /// Drop entries whose ttl elapsed at `now`
    pub fn prune_expired_at(&self, now: u64) -> StoreResult<usize> {
        let removed = self.store.remove_expired(now)?;
        if removed.is_empty() {
            return Ok(0);
        }

        info!(store = self.name(), count = removed.len(), "Removed expired entries");
        record_store_counter(PRUNED_EXPIRED, self.name(), removed.len() as u64);
        self.collector.add_pruned_expired(removed.len() as u64);
        self.update_entries_gauge();

        if P::NOTIFY_ON_EXPIRY {
            for (_, entry) in &removed {
                if let Some(payload) = P::payload_of(entry) {
                    self.listeners.notify_removed(self.name(), &payload);
                }
            }
        }
        Ok(removed.len())
    }

    /// Write pending changes; returns whether a write happened
    pub fn flush(&self) -> StoreResult<bool> {
        match self.store.flush() {
            Ok(written) => {
                if written {
                    self.collector.inc_persist_writes();
                }
                Ok(written)
            }
            Err(e) => {
                self.collector.inc_persist_failures();
                Err(e)
            }
        }
    }

    pub fn stats(&self) -> StoreResult<StoreStats> {
        Ok(StoreStats {
            name: self.name().to_string(),
            family: P::FAMILY,
            type_id: self.meta_data().type_id.to_string(),
            entries: self.store.len()?,
            tombstones: self.store.tombstone_count()?,
            max_map_size: self.meta_data().max_map_size,
            serialized_size: self.store.serialized_size()?,
        })
    }

    fn update_entries_gauge(&self) {
        if let Ok(len) = self.store.len() {
            record_store_entries(self.name(), len);
        }
    }

    fn record<T>(&self, operation: Operation, outcome: &DataStorageResult<T>) {
        let (accepted_metric, rejected_metric) = operation.metrics();
        match outcome.rejection() {
            None => {
                record_store_counter(accepted_metric, self.name(), 1);
                self.collector.inc_accepted();
                debug!(store = self.name(), op = operation.as_str(), "Accepted request");
            }
            Some(reason) => {
                record_store_counter(rejected_metric, self.name(), 1);
                self.collector.inc_rejected(reason);
                if reason.is_severe() {
                    record_store_counter(SEVERE_FAILURES, self.name(), 1);
                    warn!(
                        store = self.name(),
                        op = operation.as_str(),
                        reason = %reason,
                        "Rejected request from misbehaving peer"
                    );
                } else {
                    debug!(
                        store = self.name(),
                        op = operation.as_str(),
                        reason = %reason,
                        "Request did not change store"
                    );
                }
            }
        }
    }
}

impl<P: RemovalPolicy> DataStorageService<P> {
    pub fn remove(&self, request: P::RemoveRequest) -> StoreResult<DataStorageResult<P::Payload>> {
        self.remove_at(request, now_millis())
    }

    pub(crate) fn remove_at(
        &self,
        request: P::RemoveRequest,
        now: u64,
    ) -> StoreResult<DataStorageResult<P::Payload>> {
        let meta_data = *self.store.meta_data();
        if let Err(reason) = self.policy.check_remove(&request, &meta_data, now) {
            let outcome = DataStorageResult::Rejected(reason);
            self.record(Operation::Remove, &outcome);
            return Ok(outcome);
        }

        let key = self.policy.remove_key(&request);
        let (outcome, changed) = self.store.update(|map| {
            let stored = map.get(&key);
            let is_new_slot = stored.is_none();
            match self.policy.remove_transition(&request, stored) {
                RemoveTransition::Remove { tombstone, removed } => {
                    map.insert(key, tombstone);
                    (DataStorageResult::Accepted(removed), true)
                }
                RemoveTransition::Tombstone { tombstone, outcome } => {
                    if is_new_slot && map.len() >= meta_data.max_map_size {
                        (DataStorageResult::Rejected(Rejection::MaxMapSizeReached), false)
                    } else {
                        map.insert(key, tombstone);
                        (DataStorageResult::Rejected(outcome), true)
                    }
                }
                RemoveTransition::Reject(reason) => (DataStorageResult::Rejected(reason), false),
            }
        })?;

        if changed {
            self.store.persist();
            self.update_entries_gauge();
        }
        if let DataStorageResult::Accepted(removed) = &outcome {
            self.listeners.notify_removed(self.name(), removed);
        }
        self.record(Operation::Remove, &outcome);
        Ok(outcome)
    }
}
