/*
    core_store - Authenticated, replicated data store

    Every node keeps a partial replica of several keyed datasets and decides
    on its own which peer updates to admit. Layers, leaf first:
    - metadata, payload, request: per-type policy, payload contract, signed
      requests and the records stores keep
    - store: persisted key to record maps with load-time pruning
    - service: admission engine plus authenticated, mailbox and append-only
      policies
    - sync: filter and inventory based reconciliation
    - storage_service, prune: the node wide registry and expiry sweep
*/

pub mod key;
pub mod metadata;
pub mod payload;
pub mod prune;
pub mod request;
pub mod result;
pub mod service;
pub mod storage_service;
pub mod store;
pub mod sync;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use key::StorageKey;
pub use metadata::MetaData;
pub use payload::{DistributedData, PayloadType, StorageData, StoreFamily};
pub use prune::PruneExpiredEntriesService;
pub use request::{AddDataRequest, DataRequest, RemoveDataRequest};
pub use result::{DataStorageResult, Rejection};
pub use service::{DataListener, DataStorageService};
pub use storage_service::{AuthenticatedDataView, DataView, MailboxDataView, StorageService};
pub use store::{StoreError, StoreResult};
pub use sync::{DataFilter, FilterEntry, Inventory};
