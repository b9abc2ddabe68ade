/*
    result.rs - Admission outcome

    Admission decisions never fail with an error. They resolve to an accepted
    value or a named rejection. Severe rejections point at a misbehaving peer,
    everything else is ordinary gossip redundancy.
*/

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a request did not change the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rejection {
    /// Payload failed its own structural check
    DataInvalid,
    /// Serialized payload exceeds the type's size limit
    MetaDataInvalid,
    /// Declared public key does not hash to the owner hash
    PublicKeyHashInvalid,
    SignatureInvalid,
    /// Payload requires an authorization it does not carry
    NotAuthorized,
    Expired,
    /// Creation date too far in the future
    CreationDateInvalid,
    /// Sequence number not above the stored one
    SequenceNrInvalid,
    PayloadAlreadyStored,
    /// Identical request already stored
    RequestAlreadyReceived,
    MaxMapSizeReached,
    NoEntry,
    AlreadyRemoved,
}

impl Rejection {
    /// Outcomes that indicate a peer broke the authenticity protocol
    pub fn is_severe(&self) -> bool {
        matches!(
            self,
            Rejection::DataInvalid
                | Rejection::PublicKeyHashInvalid
                | Rejection::SignatureInvalid
                | Rejection::NotAuthorized
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::DataInvalid => "data_invalid",
            Rejection::MetaDataInvalid => "meta_data_invalid",
            Rejection::PublicKeyHashInvalid => "public_key_hash_invalid",
            Rejection::SignatureInvalid => "signature_invalid",
            Rejection::NotAuthorized => "not_authorized",
            Rejection::Expired => "expired",
            Rejection::CreationDateInvalid => "creation_date_invalid",
            Rejection::SequenceNrInvalid => "sequence_nr_invalid",
            Rejection::PayloadAlreadyStored => "payload_already_stored",
            Rejection::RequestAlreadyReceived => "request_already_received",
            Rejection::MaxMapSizeReached => "max_map_size_reached",
            Rejection::NoEntry => "no_entry",
            Rejection::AlreadyRemoved => "already_removed",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one admission decision
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum DataStorageResult<T> {
    Accepted(T),
    Rejected(Rejection),
}

impl<T> DataStorageResult<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, DataStorageResult::Accepted(_))
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            DataStorageResult::Accepted(_) => None,
            DataStorageResult::Rejected(reason) => Some(*reason),
        }
    }

    pub fn is_severe(&self) -> bool {
        self.rejection().map(|r| r.is_severe()).unwrap_or(false)
    }

    pub fn accepted(self) -> Option<T> {
        match self {
            DataStorageResult::Accepted(value) => Some(value),
            DataStorageResult::Rejected(_) => None,
        }
    }

    pub fn as_ref(&self) -> DataStorageResult<&T> {
        match self {
            DataStorageResult::Accepted(value) => DataStorageResult::Accepted(value),
            DataStorageResult::Rejected(reason) => DataStorageResult::Rejected(*reason),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> DataStorageResult<U> {
        match self {
            DataStorageResult::Accepted(value) => DataStorageResult::Accepted(f(value)),
            DataStorageResult::Rejected(reason) => DataStorageResult::Rejected(reason),
        }
    }
}

impl<T> From<Result<T, Rejection>> for DataStorageResult<T> {
    fn from(result: Result<T, Rejection>) -> Self {
        match result {
            Ok(value) => DataStorageResult::Accepted(value),
            Err(reason) => DataStorageResult::Rejected(reason),
        }
    }
}
