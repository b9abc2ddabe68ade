//! Mailbox requests
//!
//! Adds are signed by the sender, removals by the receiver.

use serde::{Deserialize, Serialize};

use super::{signing_message, AddDataRequest, DataRequest, RemoveDataRequest};
use crate::core_identity::{Keypair, PubKeyHash};
use crate::core_store::key::StorageKey;
use crate::core_store::metadata::now_millis;
use crate::core_store::payload::{DistributedData, MailboxMessage};
use crate::core_store::store::{StoreEntry, StoreResult};

const ADD_DOMAIN: &[u8] = b"netstore/sign/add-mailbox";
const REMOVE_DOMAIN: &[u8] = b"netstore/sign/remove-mailbox";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxSequentialData {
    pub payload: MailboxMessage,
    pub sequence_number: u32,
    pub sender_pub_key_hash: PubKeyHash,
    pub receiver_pub_key_hash: PubKeyHash,
    pub created: u64,
}

impl MailboxSequentialData {
    pub fn key(&self) -> StorageKey {
        StorageKey::mailbox(&self.sender_pub_key_hash, &self.receiver_pub_key_hash, &self.payload.id)
    }

    fn signing_message(&self) -> StoreResult<Vec<u8>> {
        let payload_hash = self.payload.payload_hash()?;
        Ok(signing_message(
            ADD_DOMAIN,
            &[
                &self.sequence_number.to_be_bytes(),
                &payload_hash,
                self.receiver_pub_key_hash.as_bytes(),
                &self.created.to_be_bytes(),
            ],
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddMailboxRequest {
    pub data: MailboxSequentialData,
    pub signature: Vec<u8>,
    pub sender_public_key: Vec<u8>,
}

impl AddMailboxRequest {
    pub fn new(sender: &Keypair, payload: MailboxMessage, sequence_number: u32) -> StoreResult<Self> {
        Self::new_with_created(sender, payload, sequence_number, now_millis())
    }

    pub fn new_with_created(
        sender: &Keypair,
        payload: MailboxMessage,
        sequence_number: u32,
        created: u64,
    ) -> StoreResult<Self> {
        let receiver_pub_key_hash = payload.receiver;
        let data = MailboxSequentialData {
            payload,
            sequence_number,
            sender_pub_key_hash: sender.pub_key_hash(),
            receiver_pub_key_hash,
            created,
        };
        let signature = sender.sign(&data.signing_message()?);
        Ok(AddMailboxRequest {
            data,
            signature,
            sender_public_key: sender.public_key().to_vec(),
        })
    }

    pub fn key(&self) -> StorageKey {
        self.data.key()
    }

    /// Sender key hashes to the declared sender, and the payload agrees on both parties
    pub fn is_public_key_hash_valid(&self) -> bool {
        PubKeyHash::from_public_key(&self.sender_public_key) == self.data.sender_pub_key_hash
            && self.data.payload.sender == self.data.sender_pub_key_hash
            && self.data.payload.receiver == self.data.receiver_pub_key_hash
    }

    pub fn is_signature_valid(&self) -> bool {
        match self.data.signing_message() {
            Ok(message) => Keypair::verify(&self.sender_public_key, &message, &self.signature),
            Err(_) => false,
        }
    }
}

/// Receiver's acknowledgement, names the slot parts so the key can be checked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveMailboxRequest {
    pub key: StorageKey,
    pub sender_pub_key_hash: PubKeyHash,
    pub message_id: String,
    pub sequence_number: u32,
    pub receiver_public_key: Vec<u8>,
    pub signature: Vec<u8>,
    pub created: u64,
}

impl RemoveMailboxRequest {
    pub fn new(receiver: &Keypair, sender: PubKeyHash, message_id: &str, sequence_number: u32) -> Self {
        Self::new_with_created(receiver, sender, message_id, sequence_number, now_millis())
    }

    pub fn new_with_created(
        receiver: &Keypair,
        sender: PubKeyHash,
        message_id: &str,
        sequence_number: u32,
        created: u64,
    ) -> Self {
        let key = StorageKey::mailbox(&sender, &receiver.pub_key_hash(), message_id);
        Self::build(receiver, key, sender, message_id, sequence_number, created)
    }

    /// Acknowledge a collected message
    ///
    /// Targets the message's own slot whoever signs, a store rejects it unless
    /// the signer is the addressed receiver.
    pub fn for_add(receiver: &Keypair, add: &AddMailboxRequest) -> Self {
        Self::build(
            receiver,
            add.key(),
            add.data.sender_pub_key_hash,
            &add.data.payload.id,
            add.data.sequence_number.saturating_add(1),
            now_millis(),
        )
    }

    fn build(
        receiver: &Keypair,
        key: StorageKey,
        sender: PubKeyHash,
        message_id: &str,
        sequence_number: u32,
        created: u64,
    ) -> Self {
        let message = Self::signing_message(&key, sequence_number, created);
        RemoveMailboxRequest {
            key,
            sender_pub_key_hash: sender,
            message_id: message_id.to_string(),
            sequence_number,
            receiver_public_key: receiver.public_key().to_vec(),
            signature: receiver.sign(&message),
            created,
        }
    }

    /// Whether the signing receiver derives the targeted slot
    pub fn is_key_bound(&self) -> bool {
        StorageKey::mailbox(&self.sender_pub_key_hash, &self.receiver_pub_key_hash(), &self.message_id) == self.key
    }

    fn signing_message(key: &StorageKey, sequence_number: u32, created: u64) -> Vec<u8> {
        signing_message(
            REMOVE_DOMAIN,
            &[key.as_bytes(), &sequence_number.to_be_bytes(), &created.to_be_bytes()],
        )
    }

    pub fn receiver_pub_key_hash(&self) -> PubKeyHash {
        PubKeyHash::from_public_key(&self.receiver_public_key)
    }

    pub fn is_signature_valid(&self) -> bool {
        let message = Self::signing_message(&self.key, self.sequence_number, self.created);
        Keypair::verify(&self.receiver_public_key, &message, &self.signature)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MailboxEntry {
    Added(AddMailboxRequest),
    Removed(RemoveMailboxRequest),
}

impl MailboxEntry {
    pub fn add_request(&self) -> Option<&AddMailboxRequest> {
        match self {
            MailboxEntry::Added(request) => Some(request),
            MailboxEntry::Removed(_) => None,
        }
    }

    pub fn payload(&self) -> Option<&MailboxMessage> {
        self.add_request().map(|r| &r.data.payload)
    }
}

impl StoreEntry for MailboxEntry {
    fn created(&self) -> u64 {
        match self {
            MailboxEntry::Added(request) => request.data.created,
            MailboxEntry::Removed(request) => request.created,
        }
    }

    fn sequence_number(&self) -> u32 {
        match self {
            MailboxEntry::Added(request) => request.data.sequence_number,
            MailboxEntry::Removed(request) => request.sequence_number,
        }
    }

    fn is_tombstone(&self) -> bool {
        matches!(self, MailboxEntry::Removed(_))
    }

    fn to_data_request(&self) -> DataRequest {
        match self {
            MailboxEntry::Added(request) => DataRequest::Add(AddDataRequest::Mailbox(request.clone())),
            MailboxEntry::Removed(request) => {
                DataRequest::Remove(RemoveDataRequest::Mailbox(request.clone()))
            }
        }
    }
}
