/*
    storage_service.rs - Registry and router over all per-type stores

    One StorageService is owned by the node. It creates each per-type store
    lazily on first use, loading its persisted state once: concurrent first
    callers for one type share a single load. Requests are routed by payload
    type, events of every store are forwarded to the service wide listeners,
    and anti-entropy queries are answered across all live stores.

    Background work:
    - expiry sweep through PruneExpiredEntriesService
    - rate-limited persistence: dirty stores are flushed at most once per
      persist interval, shutdown drains whatever is still pending
*/

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::config::{Config, InventoryConfig};
use crate::core_store::metadata::MetaData;
use crate::core_store::payload::{PayloadType, StorageData, StoreFamily};
use crate::core_store::prune::PruneExpiredEntriesService;
use crate::core_store::request::{
    AddAuthenticatedDataRequest, AddDataRequest, DataRequest, RefreshAuthenticatedDataRequest,
    RemoveDataRequest,
};
use crate::core_store::result::{DataStorageResult, Rejection};
use crate::core_store::service::{
    AdmissionPolicy, AppendOnlyDataStorageService, AppendOnlyPolicy,
    AuthenticatedDataStorageService, AuthenticatedPolicy, DataListener, DataStorageService,
    ListenerSet, MailboxDataStorageService, MailboxPolicy, StoreStats,
};
use crate::core_store::store::{
    handle_poison, BlobStore, FileBlobStore, StoreError, StoreResult,
};
use crate::core_store::sync::{compute_inventory, DataFilter, FilterEntry, Inventory, InventoryCandidate};
use crate::metrics::{record_counter, MetricsCollector, MetricsSnapshot, INVENTORY_REQUESTS};
use crate::scheduler::PeriodicTask;

/// Collaborators every store is created with
struct Shared {
    blob_store: Arc<dyn BlobStore>,
    collector: Arc<MetricsCollector>,
    listeners: Arc<ListenerSet<StorageData>>,
    prune_service: Arc<PruneExpiredEntriesService>,
}

/// Re-raises a store's events on the service wide listener set
struct ForwardingListener {
    target: Arc<ListenerSet<StorageData>>,
    store: String,
}

impl<T> DataListener<T> for ForwardingListener
where
    T: Clone + Into<StorageData>,
{
    fn on_added(&self, data: &T) {
        self.target.notify_added(&self.store, &data.clone().into());
    }

    fn on_removed(&self, data: &T) {
        self.target.notify_removed(&self.store, &data.clone().into());
    }

    fn on_refreshed(&self, data: &T) {
        self.target.notify_refreshed(&self.store, &data.clone().into());
    }
}

/// Type erased view of a live store for the cross-store paths
trait ManagedStore: Send + Sync {
    fn store_name(&self) -> &str;

    fn store_type_id(&self) -> &'static str;

    fn flush_store(&self) -> StoreResult<bool>;

    fn store_stats(&self) -> StoreResult<StoreStats>;

    fn inventory_candidates(&self) -> StoreResult<Vec<InventoryCandidate>>;

    fn filter_entries(&self) -> StoreResult<Vec<FilterEntry>>;
}

impl<P: AdmissionPolicy> ManagedStore for DataStorageService<P> {
    fn store_name(&self) -> &str {
        self.name()
    }

    fn store_type_id(&self) -> &'static str {
        self.meta_data().type_id
    }

    fn flush_store(&self) -> StoreResult<bool> {
        self.flush()
    }

    fn store_stats(&self) -> StoreResult<StoreStats> {
        self.stats()
    }

    fn inventory_candidates(&self) -> StoreResult<Vec<InventoryCandidate>> {
        let meta_data = *self.meta_data();
        Ok(self
            .entries()?
            .iter()
            .map(|(key, entry)| InventoryCandidate::from_entry(key, entry, &meta_data))
            .collect())
    }

    fn filter_entries(&self) -> StoreResult<Vec<FilterEntry>> {
        Ok(self
            .entries()?
            .iter()
            .map(|(key, entry)| FilterEntry::from_entry(key, entry))
            .collect())
    }
}

type StoreCell<P> = Arc<OnceCell<Arc<DataStorageService<P>>>>;

/// Lazily created stores of one family, keyed by type id
struct StoreRegistry<P: AdmissionPolicy> {
    policy: P,
    stores: RwLock<HashMap<&'static str, StoreCell<P>>>,
}

impl<P> StoreRegistry<P>
where
    P: AdmissionPolicy,
    P::Payload: Clone + Into<StorageData>,
{
    fn new(policy: P) -> Self {
        StoreRegistry {
            policy,
            stores: RwLock::new(HashMap::new()),
        }
    }

    fn cell(&self, type_id: &'static str) -> StoreResult<StoreCell<P>> {
        if let Some(cell) = self.stores.read().map_err(handle_poison)?.get(type_id) {
            return Ok(cell.clone());
        }
        let mut stores = self.stores.write().map_err(handle_poison)?;
        Ok(stores.entry(type_id).or_default().clone())
    }

    /// Existing store or a freshly loaded one; a failed load is retried by the next caller
    async fn get_or_create(
        &self,
        meta_data: MetaData,
        shared: &Shared,
    ) -> StoreResult<Arc<DataStorageService<P>>> {
        let cell = self.cell(meta_data.type_id)?;
        let service = cell.get_or_try_init(|| self.create(meta_data, shared)).await?;
        Ok(service.clone())
    }

    async fn create(
        &self,
        meta_data: MetaData,
        shared: &Shared,
    ) -> StoreResult<Arc<DataStorageService<P>>> {
        let service = Arc::new(
            DataStorageService::load(
                self.policy.clone(),
                meta_data,
                shared.blob_store.clone(),
                shared.collector.clone(),
            )
            .await?,
        );

        let forwarder: Arc<dyn DataListener<P::Payload>> = Arc::new(ForwardingListener {
            target: shared.listeners.clone(),
            store: service.name().to_string(),
        });
        service.add_listener(forwarder);

        let weak = Arc::downgrade(&service);
        shared.prune_service.register(service.name(), move || match weak.upgrade() {
            Some(service) => service.prune_expired(),
            None => Ok(0),
        })?;

        info!(store = service.name(), entries = service.len()?, "Created store");
        Ok(service)
    }

    fn get(&self, type_id: &str) -> StoreResult<Option<Arc<DataStorageService<P>>>> {
        let stores = self.stores.read().map_err(handle_poison)?;
        Ok(stores.get(type_id).and_then(|cell| cell.get().cloned()))
    }

    /// Stores whose load finished, ordered by name
    fn live(&self) -> StoreResult<Vec<Arc<DataStorageService<P>>>> {
        let stores = self.stores.read().map_err(handle_poison)?;
        let mut live: Vec<_> = stores.values().filter_map(|cell| cell.get().cloned()).collect();
        live.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(live)
    }
}

/// Read-only sequence over the payloads of a set of stores
///
/// Each store is snapshotted when iteration reaches it. Calling `iter` again
/// starts over on fresh snapshots.
pub struct DataView<P: AdmissionPolicy> {
    services: Vec<Arc<DataStorageService<P>>>,
}

pub type AuthenticatedDataView = DataView<AuthenticatedPolicy>;
pub type MailboxDataView = DataView<MailboxPolicy>;

impl<P: AdmissionPolicy> DataView<P> {
    pub fn iter(&self) -> impl Iterator<Item = P::Payload> + '_ {
        self.services.iter().flat_map(|service| match service.payloads() {
            Ok(payloads) => payloads,
            Err(e) => {
                error!(store = service.name(), error = %e, "Failed to read store");
                Vec::new()
            }
        })
    }

    pub fn store_names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name()).collect()
    }
}

pub struct StorageService {
    shared: Shared,
    authenticated: StoreRegistry<AuthenticatedPolicy>,
    mailbox: StoreRegistry<MailboxPolicy>,
    append_only: StoreRegistry<AppendOnlyPolicy>,
    inventory: InventoryConfig,
    persist_interval: Duration,
    prune_interval: Duration,
    persist_task: Mutex<Option<PeriodicTask>>,
}

impl StorageService {
    /// Service over the file backed network database below `storage.data_dir`
    pub fn open(config: &Config) -> StoreResult<Self> {
        let blob_store = FileBlobStore::new(&config.storage.data_dir)?;
        Self::new(config, Arc::new(blob_store))
    }

    /// Fails with `InvalidConfig` for settings that do not validate
    pub fn new(config: &Config, blob_store: Arc<dyn BlobStore>) -> StoreResult<Self> {
        config.validate()?;
        let authorized_keys = config.authorized_keys()?;

        Ok(StorageService {
            shared: Shared {
                blob_store,
                collector: Arc::new(MetricsCollector::new()),
                listeners: Arc::new(ListenerSet::new()),
                prune_service: Arc::new(PruneExpiredEntriesService::new()),
            },
            authenticated: StoreRegistry::new(AuthenticatedPolicy::new(authorized_keys)),
            mailbox: StoreRegistry::new(MailboxPolicy),
            append_only: StoreRegistry::new(AppendOnlyPolicy),
            inventory: config.inventory.clone(),
            persist_interval: config.storage.persist_interval,
            prune_interval: config.storage.prune_interval,
            persist_task: Mutex::new(None),
        })
    }

    /// Open every store that has persisted state, returns how many were opened
    pub async fn initialize(&self) -> StoreResult<usize> {
        let mut opened = 0;
        for payload_type in PayloadType::ALL {
            if self
                .shared
                .blob_store
                .exists(payload_type.family(), payload_type.type_id())
            {
                self.open_store(payload_type).await?;
                opened += 1;
            }
        }
        info!(stores = opened, "Opened persisted stores");
        Ok(opened)
    }

    pub async fn open_store(&self, payload_type: PayloadType) -> StoreResult<()> {
        match payload_type.family() {
            StoreFamily::Authenticated => {
                self.authenticated_store(payload_type).await?;
            }
            StoreFamily::Mailbox => {
                self.mailbox_store().await?;
            }
            StoreFamily::AppendOnly => {
                self.append_only_store(payload_type).await?;
            }
        }
        Ok(())
    }

    pub async fn authenticated_store(
        &self,
        payload_type: PayloadType,
    ) -> StoreResult<Arc<AuthenticatedDataStorageService>> {
        if payload_type.family() != StoreFamily::Authenticated {
            return Err(StoreError::UnknownStore(format!(
                "{}/{}",
                StoreFamily::Authenticated,
                payload_type
            )));
        }
        self.authenticated
            .get_or_create(payload_type.meta_data(), &self.shared)
            .await
    }

    pub async fn mailbox_store(&self) -> StoreResult<Arc<MailboxDataStorageService>> {
        self.mailbox
            .get_or_create(PayloadType::MailboxMessage.meta_data(), &self.shared)
            .await
    }

    pub async fn append_only_store(
        &self,
        payload_type: PayloadType,
    ) -> StoreResult<Arc<AppendOnlyDataStorageService>> {
        if payload_type.family() != StoreFamily::AppendOnly {
            return Err(StoreError::UnknownStore(format!(
                "{}/{}",
                StoreFamily::AppendOnly,
                payload_type
            )));
        }
        self.append_only
            .get_or_create(payload_type.meta_data(), &self.shared)
            .await
    }

    /// Route an add to its store and return the full outcome
    pub async fn add_data(&self, request: AddDataRequest) -> StoreResult<DataStorageResult<StorageData>> {
        let payload_type = request.payload_type();
        let outcome = match request {
            AddDataRequest::Authenticated(request) => self
                .authenticated_store(payload_type)
                .await?
                .add(request)?
                .map(StorageData::from),
            AddDataRequest::Mailbox(request) => {
                self.mailbox_store().await?.add(request)?.map(StorageData::from)
            }
            AddDataRequest::AppendOnly(request) => self
                .append_only_store(payload_type)
                .await?
                .add(request)?
                .map(StorageData::from),
        };
        Ok(outcome)
    }

    /// Accepted payload, None for any rejection
    pub async fn on_add_data_request(&self, request: AddDataRequest) -> StoreResult<Option<StorageData>> {
        Ok(self.add_data(request).await?.accepted())
    }

    pub async fn remove_data(
        &self,
        request: RemoveDataRequest,
    ) -> StoreResult<DataStorageResult<StorageData>> {
        let outcome = match request {
            RemoveDataRequest::Authenticated(request) => {
                if request.payload_type.family() != StoreFamily::Authenticated {
                    debug!(payload_type = %request.payload_type, "Remove names a type outside the authenticated family");
                    return Ok(DataStorageResult::Rejected(Rejection::MetaDataInvalid));
                }
                self.authenticated_store(request.payload_type)
                    .await?
                    .remove(request)?
                    .map(StorageData::from)
            }
            RemoveDataRequest::Mailbox(request) => {
                self.mailbox_store().await?.remove(request)?.map(StorageData::from)
            }
        };
        Ok(outcome)
    }

    /// Removed payload, None for any rejection
    pub async fn on_remove_data_request(
        &self,
        request: RemoveDataRequest,
    ) -> StoreResult<Option<StorageData>> {
        Ok(self.remove_data(request).await?.accepted())
    }

    pub async fn refresh_data(
        &self,
        request: RefreshAuthenticatedDataRequest,
    ) -> StoreResult<DataStorageResult<StorageData>> {
        if request.payload_type.family() != StoreFamily::Authenticated {
            return Ok(DataStorageResult::Rejected(Rejection::MetaDataInvalid));
        }
        Ok(self
            .authenticated_store(request.payload_type)
            .await?
            .refresh(request)?
            .map(StorageData::from))
    }

    /// Admit a refreshed entry relayed by a peer, see `add_refreshed`
    pub async fn add_refreshed_data(
        &self,
        add: AddAuthenticatedDataRequest,
        refresh: RefreshAuthenticatedDataRequest,
    ) -> StoreResult<DataStorageResult<StorageData>> {
        let payload_type = add.data.payload.payload_type();
        if payload_type.family() != StoreFamily::Authenticated || refresh.payload_type != payload_type {
            return Ok(DataStorageResult::Rejected(Rejection::MetaDataInvalid));
        }
        Ok(self
            .authenticated_store(payload_type)
            .await?
            .add_refreshed(add, refresh)?
            .map(StorageData::from))
    }

    pub async fn on_refresh_data_request(
        &self,
        request: RefreshAuthenticatedDataRequest,
    ) -> StoreResult<Option<StorageData>> {
        Ok(self.refresh_data(request).await?.accepted())
    }

    fn all_stores(&self) -> StoreResult<Vec<Arc<dyn ManagedStore>>> {
        let mut stores: Vec<Arc<dyn ManagedStore>> = Vec::new();
        for store in self.authenticated.live()? {
            stores.push(store);
        }
        for store in self.mailbox.live()? {
            stores.push(store);
        }
        for store in self.append_only.live()? {
            stores.push(store);
        }
        Ok(stores)
    }

    fn inventory_for(&self, filter: &DataFilter, type_id: Option<&str>) -> StoreResult<Inventory> {
        let mut candidates = Vec::new();
        for store in self.all_stores()? {
            if type_id.map_or(true, |id| store.store_type_id() == id) {
                candidates.extend(store.inventory_candidates()?);
            }
        }

        let inventory = compute_inventory(candidates, filter, self.inventory.max_size_bytes())?;
        self.shared.collector.inc_inventory_requests();
        record_counter(INVENTORY_REQUESTS, 1);
        debug!(
            entries = inventory.len(),
            filtered_out = inventory.num_filtered_out,
            max_size_reached = inventory.max_size_reached,
            "Computed inventory"
        );
        Ok(inventory)
    }

    /// Everything the requester lacks across all live stores
    pub fn get_inventory_of_all_stores(&self, filter: &DataFilter) -> StoreResult<Inventory> {
        self.inventory_for(filter, None)
    }

    /// Like `get_inventory_of_all_stores`, limited to one payload type
    pub fn get_inventory_from_store(&self, filter: &DataFilter, store_id: &str) -> StoreResult<Inventory> {
        let payload_type = PayloadType::from_type_id(store_id)
            .ok_or_else(|| StoreError::UnknownStore(store_id.to_string()))?;
        self.inventory_for(filter, Some(payload_type.type_id()))
    }

    /// Summary of the local state to send with an inventory request
    pub fn data_filter(&self) -> StoreResult<DataFilter> {
        let mut entries = Vec::new();
        for store in self.all_stores()? {
            entries.extend(store.filter_entries()?);
        }
        if entries.len() > self.inventory.max_filter_entries {
            debug!(
                entries = entries.len(),
                max = self.inventory.max_filter_entries,
                "Truncating data filter"
            );
            entries.truncate(self.inventory.max_filter_entries);
        }
        Ok(DataFilter::from_entries(entries))
    }

    /// Feed a received inventory through normal admission, returns the accepted count
    pub async fn apply_inventory(&self, inventory: Inventory) -> StoreResult<usize> {
        let mut accepted = 0;
        for request in inventory.entries {
            let outcome = match request {
                DataRequest::Add(request) => self.add_data(request).await?,
                DataRequest::Remove(request) => self.remove_data(request).await?,
                DataRequest::Refresh { add, refresh } => self.add_refreshed_data(add, refresh).await?,
            };
            if outcome.is_accepted() {
                accepted += 1;
            }
        }
        debug!(accepted, "Applied inventory");
        Ok(accepted)
    }

    /// Authenticated payloads, optionally only those of one store
    ///
    /// `store` matches a type id (`Offer`) or a full store name (`authenticated/Offer`).
    pub fn get_authenticated_data(&self, store: Option<&str>) -> StoreResult<AuthenticatedDataView> {
        let services = self
            .authenticated
            .live()?
            .into_iter()
            .filter(|s| store.map_or(true, |n| s.name() == n || s.meta_data().type_id == n))
            .collect();
        Ok(DataView { services })
    }

    pub fn get_mailbox_data(&self) -> StoreResult<MailboxDataView> {
        Ok(DataView {
            services: self.mailbox.live()?,
        })
    }

    /// Whether the store of `type_id` has been loaded
    pub fn is_store_open(&self, type_id: &str) -> StoreResult<bool> {
        Ok(self.authenticated.get(type_id)?.is_some()
            || self.mailbox.get(type_id)?.is_some()
            || self.append_only.get(type_id)?.is_some())
    }

    pub fn stats(&self) -> StoreResult<Vec<StoreStats>> {
        self.all_stores()?
            .iter()
            .map(|store| store.store_stats())
            .collect()
    }

    /// Encoded size of all live stores
    pub fn network_database_size(&self) -> StoreResult<u64> {
        Ok(self.stats()?.iter().map(|s| s.serialized_size).sum())
    }

    pub fn add_listener(&self, listener: Arc<dyn DataListener<StorageData>>) {
        self.shared.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn DataListener<StorageData>>) -> bool {
        self.shared.listeners.remove(listener)
    }

    pub fn prune_service(&self) -> &Arc<PruneExpiredEntriesService> {
        &self.shared.prune_service
    }

    /// One expiry sweep over every live store
    pub fn prune_expired_all(&self) -> usize {
        self.shared.prune_service.run_once()
    }

    /// Write every dirty store, returns how many were written
    ///
    /// A failing store stays dirty and is retried on the next flush.
    pub fn flush_all(&self) -> StoreResult<usize> {
        let mut written = 0;
        for store in self.all_stores()? {
            match store.flush_store() {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(_) => debug!(store = store.store_name(), "Store stays dirty until the next flush"),
            }
        }
        Ok(written)
    }

    /// Start the expiry sweep and the persistence timer
    pub fn start(self: &Arc<Self>) {
        self.shared.prune_service.start(self.prune_interval);

        let weak = Arc::downgrade(self);
        let task = PeriodicTask::spawn("persist-stores", self.persist_interval, move || {
            let weak = weak.clone();
            async move {
                let Some(service) = weak.upgrade() else {
                    return;
                };
                match tokio::task::spawn_blocking(move || service.flush_all()).await {
                    Ok(Ok(0)) => {}
                    Ok(Ok(written)) => debug!(stores = written, "Persisted dirty stores"),
                    Ok(Err(e)) => error!(error = %e, "Failed to persist stores"),
                    Err(e) => error!(error = %e, "Persistence task failed"),
                }
            }
        });

        let mut slot = self.persist_task.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(previous) = slot.replace(task) {
            previous.stop();
        }
        info!(
            persist_interval = ?self.persist_interval,
            prune_interval = ?self.prune_interval,
            "Started storage timers"
        );
    }

    /// Stop both timers; stopping twice does nothing
    pub fn stop(&self) {
        self.shared.prune_service.stop();
        let task = self.persist_task.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(task) = task {
            task.stop();
        }
    }

    pub fn is_running(&self) -> bool {
        let persisting = self
            .persist_task
            .lock()
            .map(|task| task.as_ref().map(PeriodicTask::is_running).unwrap_or(false))
            .unwrap_or(false);
        persisting || self.shared.prune_service.is_running()
    }

    /// Stop the timers and drain pending writes
    pub async fn shutdown(self: &Arc<Self>) -> StoreResult<usize> {
        self.stop();
        let service = self.clone();
        let written = tokio::task::spawn_blocking(move || service.flush_all()).await??;
        info!(stores = written, "Flushed stores on shutdown");
        Ok(written)
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.shared.collector.snapshot()
    }
}
