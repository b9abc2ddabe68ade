//! Mailbox store rules
//!
//! Same sequence number discipline as authenticated data, but the receiver,
//! not the sender, is entitled to remove a message. The receiver is part of
//! the slot key, so only it can tombstone a slot.

use super::policy::{AdmissionPolicy, RemovalPolicy, RemoveTransition};
use crate::core_store::key::StorageKey;
use crate::core_store::metadata::MetaData;
use crate::core_store::payload::{DistributedData, MailboxMessage, StoreFamily};
use crate::core_store::request::{AddMailboxRequest, MailboxEntry, RemoveMailboxRequest, MAX_FUTURE_CREATION_MS};
use crate::core_store::result::Rejection;
use crate::core_store::store::StoreEntry;

#[derive(Debug, Clone, Copy, Default)]
pub struct MailboxPolicy;

impl AdmissionPolicy for MailboxPolicy {
    type Entry = MailboxEntry;
    type AddRequest = AddMailboxRequest;
    type Payload = MailboxMessage;

    const FAMILY: StoreFamily = StoreFamily::Mailbox;
    const NOTIFY_ON_EXPIRY: bool = false;

    fn key_of(&self, request: &Self::AddRequest) -> Result<StorageKey, Rejection> {
        Ok(request.key())
    }

    fn check_add(&self, request: &Self::AddRequest, meta_data: &MetaData, now: u64) -> Result<(), Rejection> {
        let data = &request.data;

        if data.payload.is_data_invalid() {
            return Err(Rejection::DataInvalid);
        }

        let size = data.payload.to_bytes().map_err(|_| Rejection::DataInvalid)?.len();
        if size > meta_data.max_size_bytes {
            return Err(Rejection::MetaDataInvalid);
        }

        if !request.is_public_key_hash_valid() {
            return Err(Rejection::PublicKeyHashInvalid);
        }

        if !request.is_signature_valid() {
            return Err(Rejection::SignatureInvalid);
        }

        if meta_data.is_expired(data.created, now) {
            return Err(Rejection::Expired);
        }

        if data.created > now.saturating_add(MAX_FUTURE_CREATION_MS) {
            return Err(Rejection::CreationDateInvalid);
        }

        Ok(())
    }

    fn check_against_stored(
        &self,
        request: &Self::AddRequest,
        stored: Option<&Self::Entry>,
    ) -> Result<(), Rejection> {
        match stored {
            None => Ok(()),
            Some(MailboxEntry::Added(existing)) if existing == request => {
                Err(Rejection::RequestAlreadyReceived)
            }
            Some(entry) if request.data.sequence_number <= entry.sequence_number() => {
                Err(Rejection::SequenceNrInvalid)
            }
            Some(_) => Ok(()),
        }
    }

    fn to_entry(&self, request: Self::AddRequest) -> Self::Entry {
        MailboxEntry::Added(request)
    }

    fn payload_of(entry: &Self::Entry) -> Option<Self::Payload> {
        entry.payload().cloned()
    }
}

impl RemovalPolicy for MailboxPolicy {
    type RemoveRequest = RemoveMailboxRequest;

    fn remove_key(&self, request: &Self::RemoveRequest) -> StorageKey {
        request.key
    }

    fn check_remove(&self, request: &Self::RemoveRequest, _meta_data: &MetaData, now: u64) -> Result<(), Rejection> {
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
        let tombstone = || MailboxEntry::Removed(request.clone());

        match stored {
            None => RemoveTransition::Tombstone {
                tombstone: tombstone(),
                outcome: Rejection::NoEntry,
            },
            // Bound keys mean every tombstone here was signed by this receiver
            Some(MailboxEntry::Removed(existing)) => {
                if request.sequence_number > existing.sequence_number {
                    RemoveTransition::Tombstone {
                        tombstone: tombstone(),
                        outcome: Rejection::NoEntry,
                    }
                } else {
                    RemoveTransition::Reject(Rejection::AlreadyRemoved)
                }
            }
            Some(MailboxEntry::Added(add)) => {
                if request.sequence_number <= add.data.sequence_number {
                    RemoveTransition::Reject(Rejection::SequenceNrInvalid)
                } else if add.data.receiver_pub_key_hash != request.receiver_pub_key_hash() {
                    RemoveTransition::Reject(Rejection::PublicKeyHashInvalid)
                } else {
                    RemoveTransition::Remove {
                        tombstone: tombstone(),
                        removed: add.data.payload.clone(),
                    }
                }
            }
        }
    }
}
