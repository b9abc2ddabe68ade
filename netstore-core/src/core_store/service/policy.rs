//! Admission policies
//!
//! The engine owns locking, capacity, persistence and notification. A policy
//! supplies the family specific rules: how a request maps to a slot, which
//! checks it must pass, and what a removal leaves behind.

use crate::core_store::key::StorageKey;
use crate::core_store::metadata::MetaData;
use crate::core_store::payload::StoreFamily;
use crate::core_store::result::Rejection;
use crate::core_store::store::StoreEntry;

pub trait AdmissionPolicy: Clone + Send + Sync + 'static {
    type Entry: StoreEntry;
    type AddRequest: Clone + Send + Sync + 'static;
    type Payload: Clone + Send + Sync + 'static;

    const FAMILY: StoreFamily;

    /// Whether expiry pruning reports removed live entries to listeners
    const NOTIFY_ON_EXPIRY: bool;

    fn key_of(&self, request: &Self::AddRequest) -> Result<StorageKey, Rejection>;

    /// Checks that depend on the request alone, run before taking the lock
    fn check_add(&self, request: &Self::AddRequest, meta_data: &MetaData, now: u64) -> Result<(), Rejection>;

    /// Checks against the current slot content, run under the write lock
    fn check_against_stored(
        &self,
        request: &Self::AddRequest,
        stored: Option<&Self::Entry>,
    ) -> Result<(), Rejection>;

    fn to_entry(&self, request: Self::AddRequest) -> Self::Entry;

    /// Payload of a live entry, None for tombstones
    fn payload_of(entry: &Self::Entry) -> Option<Self::Payload>;

    /// Whether a persisted entry survives loading
    fn retain_on_load(&self, _entry: &Self::Entry) -> bool {
        true
    }
}

/// What a remove request does to a slot
#[derive(Debug, Clone, PartialEq)]
pub enum RemoveTransition<E, T> {
    /// Replace the live entry with a tombstone
    Remove { tombstone: E, removed: T },
    /// Store a tombstone without a live entry to remove
    Tombstone { tombstone: E, outcome: Rejection },
    Reject(Rejection),
}

/// Families whose entries can be removed by signed request
pub trait RemovalPolicy: AdmissionPolicy {
    type RemoveRequest: Clone + Send + Sync + 'static;

    fn remove_key(&self, request: &Self::RemoveRequest) -> StorageKey;

    /// Checks that depend on the request alone
    fn check_remove(&self, request: &Self::RemoveRequest, meta_data: &MetaData, now: u64) -> Result<(), Rejection>;

    /// Decide the new slot content, run under the write lock
    fn remove_transition(
        &self,
        request: &Self::RemoveRequest,
        stored: Option<&Self::Entry>,
    ) -> RemoveTransition<Self::Entry, Self::Payload>;
}
