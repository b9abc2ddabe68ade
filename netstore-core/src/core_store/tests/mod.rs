/*
    Scenario tests for the core_store subsystem

    Test suite covering:
    - authenticated admission, removal, tombstones and refresh
    - mailbox delivery and receiver-only removal
    - append-only idempotence
    - expiry sweeps and load-time pruning
    - filter and inventory reconciliation between nodes
    - concurrent admission on one slot
*/

pub mod authenticated_tests;
pub mod concurrency_tests;
pub mod reconciliation_tests;

use std::sync::Arc;

use crate::core_store::metadata::MetaData;
use crate::core_store::service::{
    AppendOnlyDataStorageService, AppendOnlyPolicy, AuthenticatedDataStorageService,
    AuthenticatedPolicy, DataStorageService, MailboxDataStorageService, MailboxPolicy,
};
use crate::core_store::store::{BlobStore, MemoryBlobStore};
use crate::metrics::MetricsCollector;

pub(crate) fn authenticated_service(meta_data: MetaData) -> AuthenticatedDataStorageService {
    authenticated_service_with(AuthenticatedPolicy::default(), meta_data, Arc::new(MemoryBlobStore::new()))
}

pub(crate) fn authenticated_service_with(
    policy: AuthenticatedPolicy,
    meta_data: MetaData,
    blob_store: Arc<dyn BlobStore>,
) -> AuthenticatedDataStorageService {
    DataStorageService::new(policy, meta_data, blob_store, Arc::new(MetricsCollector::new()))
}

pub(crate) fn mailbox_service() -> MailboxDataStorageService {
    DataStorageService::new(
        MailboxPolicy,
        crate::core_store::payload::MAILBOX_MESSAGE_META,
        Arc::new(MemoryBlobStore::new()),
        Arc::new(MetricsCollector::new()),
    )
}

pub(crate) fn append_only_service(meta_data: MetaData) -> AppendOnlyDataStorageService {
    DataStorageService::new(
        AppendOnlyPolicy,
        meta_data,
        Arc::new(MemoryBlobStore::new()),
        Arc::new(MetricsCollector::new()),
    )
}
