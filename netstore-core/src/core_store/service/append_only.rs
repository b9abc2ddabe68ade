//! Append-only store rules
//!
//! Content addressed and immutable: a second add of the same content is a
//! benign duplicate and there is no removal path.

use super::policy::AdmissionPolicy;
use crate::core_store::key::StorageKey;
use crate::core_store::metadata::MetaData;
use crate::core_store::payload::{AppendOnlyPayload, DistributedData, StoreFamily};
use crate::core_store::request::AddAppendOnlyDataRequest;
use crate::core_store::result::Rejection;

#[derive(Debug, Clone, Copy, Default)]
pub struct AppendOnlyPolicy;

impl AdmissionPolicy for AppendOnlyPolicy {
    type Entry = AddAppendOnlyDataRequest;
    type AddRequest = AddAppendOnlyDataRequest;
    type Payload = AppendOnlyPayload;

    const FAMILY: StoreFamily = StoreFamily::AppendOnly;
    const NOTIFY_ON_EXPIRY: bool = false;

    fn key_of(&self, request: &Self::AddRequest) -> Result<StorageKey, Rejection> {
        request.key().map_err(|_| Rejection::DataInvalid)
    }

    fn check_add(&self, request: &Self::AddRequest, meta_data: &MetaData, _now: u64) -> Result<(), Rejection> {
        if request.payload.is_data_invalid() {
            return Err(Rejection::DataInvalid);
        }
        let size = request.payload.to_bytes().map_err(|_| Rejection::DataInvalid)?.len();
        if size > meta_data.max_size_bytes {
            return Err(Rejection::MetaDataInvalid);
        }
        Ok(())
    }

    fn check_against_stored(
        &self,
        _request: &Self::AddRequest,
        stored: Option<&Self::Entry>,
    ) -> Result<(), Rejection> {
        match stored {
            Some(_) => Err(Rejection::PayloadAlreadyStored),
            None => Ok(()),
        }
    }

    fn to_entry(&self, request: Self::AddRequest) -> Self::Entry {
        request
    }

    fn payload_of(entry: &Self::Entry) -> Option<Self::Payload> {
        Some(entry.payload.clone())
    }
}
