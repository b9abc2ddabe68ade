//! Authenticated store rules
//!
//! Entries are owned by the key whose hash is part of the slot key. Updates
//! need a strictly higher sequence number; removals leave a signed tombstone
//! that blocks replays of older adds. A removal must derive its slot from the
//! signer's own hash, so nobody can tombstone a slot they do not own.

use std::sync::Arc;

use super::policy::{AdmissionPolicy, RemovalPolicy, RemoveTransition};
use super::{DataStorageService, Operation};
use crate::core_store::key::StorageKey;
use crate::core_store::metadata::{now_millis, MetaData};
use crate::core_store::payload::{AuthenticatedPayload, AuthorizedKeySet, DistributedData, StoreFamily};
use crate::core_store::request::{
    AddAuthenticatedDataRequest, AuthenticatedEntry, RefreshAuthenticatedDataRequest,
    RemoveAuthenticatedDataRequest, MAX_FUTURE_CREATION_MS,
};
use crate::core_store::result::{DataStorageResult, Rejection};
use crate::core_store::store::{StoreEntry, StoreResult};

#[derive(Debug, Clone, Default)]
pub struct AuthenticatedPolicy {
    authorized_keys: Arc<AuthorizedKeySet>,
}

impl AuthenticatedPolicy {
    pub fn new(authorized_keys: AuthorizedKeySet) -> Self {
        AuthenticatedPolicy {
            authorized_keys: Arc::new(authorized_keys),
        }
    }

    pub fn authorized_keys(&self) -> &AuthorizedKeySet {
        &self.authorized_keys
    }
}

impl AuthenticatedPolicy {
    /// Payload, ownership and signature checks of an add, independent of time
    fn check_authenticity(&self, request: &AddAuthenticatedDataRequest, meta_data: &MetaData) -> Result<(), Rejection> {
        let data = &request.data;
        let payload = &data.payload;

        if payload.is_data_invalid() {
            return Err(Rejection::DataInvalid);
        }

        let size = payload.to_bytes().map_err(|_| Rejection::DataInvalid)?.len();
        if size > meta_data.max_size_bytes || payload.meta_data().type_id != meta_data.type_id {
            return Err(Rejection::MetaDataInvalid);
        }

        if !request.is_public_key_hash_valid() || payload.owner() != &data.pub_key_hash {
            return Err(Rejection::PublicKeyHashInvalid);
        }

        if !request.is_signature_valid() {
            return Err(Rejection::SignatureInvalid);
        }

        if payload.is_not_authorized(&self.authorized_keys) {
            return Err(Rejection::NotAuthorized);
        }

        Ok(())
    }
}

fn check_creation_date(created: u64, meta_data: &MetaData, now: u64) -> Result<(), Rejection> {
    if meta_data.is_expired(created, now) {
        return Err(Rejection::Expired);
    }
    if created > now.saturating_add(MAX_FUTURE_CREATION_MS) {
        return Err(Rejection::CreationDateInvalid);
    }
    Ok(())
}

impl AdmissionPolicy for AuthenticatedPolicy {
    type Entry = AuthenticatedEntry;
    type AddRequest = AddAuthenticatedDataRequest;
    type Payload = AuthenticatedPayload;

    const FAMILY: StoreFamily = StoreFamily::Authenticated;
    const NOTIFY_ON_EXPIRY: bool = true;

    fn key_of(&self, request: &Self::AddRequest) -> Result<StorageKey, Rejection> {
        Ok(request.key())
    }

    fn check_add(&self, request: &Self::AddRequest, meta_data: &MetaData, now: u64) -> Result<(), Rejection> {
        self.check_authenticity(request, meta_data)?;
        check_creation_date(request.data.created, meta_data, now)
    }

    fn check_against_stored(
        &self,
        request: &Self::AddRequest,
        stored: Option<&Self::Entry>,
    ) -> Result<(), Rejection> {
        let Some(stored) = stored else {
            return Ok(());
        };

        match stored {
            AuthenticatedEntry::Added(existing) | AuthenticatedEntry::Refreshed { request: existing, .. }
                if existing == request =>
            {
                Err(Rejection::RequestAlreadyReceived)
            }
            _ if request.sequence_number() <= stored.sequence_number() => {
                Err(Rejection::SequenceNrInvalid)
            }
            _ => Ok(()),
        }
    }

    fn to_entry(&self, request: Self::AddRequest) -> Self::Entry {
        AuthenticatedEntry::Added(request)
    }

    fn payload_of(entry: &Self::Entry) -> Option<Self::Payload> {
        entry.payload().cloned()
    }

    fn retain_on_load(&self, entry: &Self::Entry) -> bool {
        entry
            .payload()
            .map(|payload| !payload.is_not_authorized(&self.authorized_keys))
            .unwrap_or(true)
    }
}

impl RemovalPolicy for AuthenticatedPolicy {
    type RemoveRequest = RemoveAuthenticatedDataRequest;

    fn remove_key(&self, request: &Self::RemoveRequest) -> StorageKey {
        request.key
    }

    fn check_remove(&self, request: &Self::RemoveRequest, meta_data: &MetaData, now: u64) -> Result<(), Rejection> {
        if request.payload_type.type_id() != meta_data.type_id {
            return Err(Rejection::MetaDataInvalid);
        }
        if !request.is_key_bound() {
            return Err(Rejection::PublicKeyHashInvalid);
        }
        if !request.is_signature_valid() {
            return Err(Rejection::SignatureInvalid);
        }
        if request.created > now.saturating_add(MAX_FUTURE_CREATION_MS) {
            return Err(Rejection::CreationDateInvalid);
        }
        Ok(())
    }

    fn remove_transition(
        &self,
        request: &Self::RemoveRequest,
        stored: Option<&Self::Entry>,
    ) -> RemoveTransition<Self::Entry, Self::Payload> {
        let tombstone = || AuthenticatedEntry::Removed(request.clone());

        match stored {
            None => RemoveTransition::Tombstone {
                tombstone: tombstone(),
                outcome: Rejection::NoEntry,
            },
            // Bound keys mean every tombstone here was signed by the owner
            Some(AuthenticatedEntry::Removed(existing)) => {
                if request.sequence_number > existing.sequence_number {
                    RemoveTransition::Tombstone {
                        tombstone: tombstone(),
                        outcome: Rejection::NoEntry,
                    }
                } else {
                    RemoveTransition::Reject(Rejection::AlreadyRemoved)
                }
            }
            Some(live) => {
                if request.sequence_number <= live.sequence_number() {
                    return RemoveTransition::Reject(Rejection::SequenceNrInvalid);
                }
                match live.add_request() {
                    Some(add) if add.data.pub_key_hash == request.owner_pub_key_hash() => {
                        RemoveTransition::Remove {
                            tombstone: tombstone(),
                            removed: add.data.payload.clone(),
                        }
                    }
                    _ => RemoveTransition::Reject(Rejection::PublicKeyHashInvalid),
                }
            }
        }
    }
}

impl DataStorageService<AuthenticatedPolicy> {
    /// Renew a live entry without re-sending its payload
    pub fn refresh(
        &self,
        request: RefreshAuthenticatedDataRequest,
    ) -> StoreResult<DataStorageResult<AuthenticatedPayload>> {
        self.refresh_at(request, now_millis())
    }

    pub(crate) fn refresh_at(
        &self,
        request: RefreshAuthenticatedDataRequest,
        now: u64,
    ) -> StoreResult<DataStorageResult<AuthenticatedPayload>> {
        let meta_data = *self.store.meta_data();
        if request.payload_type.type_id() != meta_data.type_id {
            let outcome = DataStorageResult::Rejected(Rejection::MetaDataInvalid);
            self.record(Operation::Refresh, &outcome);
            return Ok(outcome);
        }
        if let Err(reason) = check_creation_date(request.created, &meta_data, now) {
            let outcome = DataStorageResult::Rejected(reason);
            self.record(Operation::Refresh, &outcome);
            return Ok(outcome);
        }

        let key = request.key;
        let outcome: DataStorageResult<AuthenticatedPayload> = self
            .store
            .update(|map| {
                let add = match map.get(&key) {
                    None => return Err(Rejection::NoEntry),
                    Some(AuthenticatedEntry::Removed(_)) => return Err(Rejection::AlreadyRemoved),
                    Some(live) => {
                        if request.sequence_number <= live.sequence_number() {
                            return Err(Rejection::SequenceNrInvalid);
                        }
                        live.add_request().cloned().ok_or(Rejection::NoEntry)?
                    }
                };
                if add.data.pub_key_hash != request.owner_pub_key_hash() {
                    return Err(Rejection::PublicKeyHashInvalid);
                }
                if !request.is_signature_valid() {
                    return Err(Rejection::SignatureInvalid);
                }

                let payload = add.data.payload.clone();
                map.insert(key, AuthenticatedEntry::Refreshed { request: add, refresh: request });
                Ok(payload)
            })?
            .into();

        if let DataStorageResult::Accepted(payload) = &outcome {
            self.store.persist();
            self.listeners.notify_refreshed(self.name(), payload);
        }
        self.record(Operation::Refresh, &outcome);
        Ok(outcome)
    }

    /// Store a refreshed entry relayed by a peer, add and refresh together
    ///
    /// The refresh's signed creation date decides the lifetime, so an add
    /// older than the ttl is accepted as long as its refresh is fresh.
    pub fn add_refreshed(
        &self,
        add: AddAuthenticatedDataRequest,
        refresh: RefreshAuthenticatedDataRequest,
    ) -> StoreResult<DataStorageResult<AuthenticatedPayload>> {
        self.add_refreshed_at(add, refresh, now_millis())
    }

    pub(crate) fn add_refreshed_at(
        &self,
        add: AddAuthenticatedDataRequest,
        refresh: RefreshAuthenticatedDataRequest,
        now: u64,
    ) -> StoreResult<DataStorageResult<AuthenticatedPayload>> {
        let meta_data = *self.store.meta_data();
        if let Err(reason) = self.check_refreshed(&add, &refresh, &meta_data, now) {
            let outcome = DataStorageResult::Rejected(reason);
            self.record(Operation::Refresh, &outcome);
            return Ok(outcome);
        }

        let key = refresh.key;
        let entry = AuthenticatedEntry::Refreshed { request: add, refresh };
        let mut previous = None;
        let outcome: DataStorageResult<AuthenticatedPayload> = self
            .store
            .update(|map| {
                let stored = map.get(&key);
                match stored {
                    Some(existing) if *existing == entry => return Err(Rejection::RequestAlreadyReceived),
                    Some(existing) if existing.sequence_number() >= entry.sequence_number() => {
                        return Err(Rejection::SequenceNrInvalid)
                    }
                    None if map.len() >= meta_data.max_map_size => return Err(Rejection::MaxMapSizeReached),
                    _ => {}
                }
                previous = stored.and_then(|existing| existing.payload().cloned());
                let payload = entry.payload().cloned().ok_or(Rejection::DataInvalid)?;
                map.insert(key, entry);
                Ok(payload)
            })?
            .into();

        if let DataStorageResult::Accepted(payload) = &outcome {
            self.store.persist();
            self.update_entries_gauge();
            if previous.as_ref() == Some(payload) {
                self.listeners.notify_refreshed(self.name(), payload);
            } else {
                self.listeners.notify_added(self.name(), payload);
            }
        }
        self.record(Operation::Refresh, &outcome);
        Ok(outcome)
    }

    fn check_refreshed(
        &self,
        add: &AddAuthenticatedDataRequest,
        refresh: &RefreshAuthenticatedDataRequest,
        meta_data: &MetaData,
        now: u64,
    ) -> Result<(), Rejection> {
        self.policy.check_authenticity(add, meta_data)?;
        if refresh.key != add.key() {
            return Err(Rejection::DataInvalid);
        }
        if refresh.owner_pub_key_hash() != add.data.pub_key_hash {
            return Err(Rejection::PublicKeyHashInvalid);
        }
        if !refresh.is_signature_valid() {
            return Err(Rejection::SignatureInvalid);
        }
        if refresh.sequence_number <= add.sequence_number() {
            return Err(Rejection::SequenceNrInvalid);
        }
        check_creation_date(refresh.created, meta_data, now)
    }
}
