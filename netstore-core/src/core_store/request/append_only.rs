//! Append-only requests

use serde::{Deserialize, Serialize};

use super::{AddDataRequest, DataRequest};
use crate::core_store::key::StorageKey;
use crate::core_store::metadata::now_millis;
use crate::core_store::payload::{AppendOnlyPayload, DistributedData};
use crate::core_store::store::{StoreEntry, StoreResult};

/// Unsigned, content addressed insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddAppendOnlyDataRequest {
    pub payload: AppendOnlyPayload,
    pub created: u64,
}

impl AddAppendOnlyDataRequest {
    pub fn new(payload: AppendOnlyPayload) -> Self {
        Self::new_with_created(payload, now_millis())
    }

    pub fn new_with_created(payload: AppendOnlyPayload, created: u64) -> Self {
        AddAppendOnlyDataRequest { payload, created }
    }

    /// Content hash of the payload, independent of the creation date
    pub fn key(&self) -> StoreResult<StorageKey> {
        Ok(StorageKey::hash(&self.payload.to_bytes()?))
    }
}

impl StoreEntry for AddAppendOnlyDataRequest {
    fn created(&self) -> u64 {
        self.created
    }

    /// Append-only data has no versions
    fn sequence_number(&self) -> u32 {
        0
    }

    fn is_tombstone(&self) -> bool {
        false
    }

    fn to_data_request(&self) -> DataRequest {
        DataRequest::Add(AddDataRequest::AppendOnly(self.clone()))
    }
}
