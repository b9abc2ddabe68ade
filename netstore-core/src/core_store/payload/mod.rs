/*
    payload - Distributed data contract and concrete payload types

    Every replicated payload implements DistributedData. Payloads are grouped
    into three closed families, one per store family:
    - authenticated: owner signed, mutable through higher sequence numbers
    - mailbox: owner signed, removed by its receiver once collected
    - append-only: content addressed, immutable
*/

mod append_only;
mod authenticated;
mod mailbox;

pub use append_only::{AppendOnlyPayload, ProofOfBurn, PROOF_OF_BURN_META};
pub use authenticated::{
    AuthenticatedPayload, AuthorizedBondedRole, AuthorizedKeySet, BondedRoleType, ChatMessage,
    Direction, Offer, UserProfile, BONDED_ROLE_META, CHAT_MESSAGE_META, OFFER_META,
    USER_PROFILE_META,
};
pub use mailbox::{MailboxMessage, MAILBOX_MESSAGE_META};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core_store::metadata::MetaData;
use crate::core_store::store::{StoreError, StoreResult};

/// Shared capability of every replicated payload
pub trait DistributedData: Serialize {
    /// Storage policy of this payload's type
    fn meta_data(&self) -> MetaData;

    /// Payload specific structural self-check
    fn is_data_invalid(&self) -> bool;

    /// Relative cost used to scale proof of work at the network layer
    fn cost_factor(&self) -> f64;

    fn to_bytes(&self) -> StoreResult<Vec<u8>> {
        bincode::serialize(self).map_err(StoreError::from)
    }

    /// BLAKE3 hash of the serialized payload
    fn payload_hash(&self) -> StoreResult<[u8; 32]> {
        Ok(*blake3::hash(&self.to_bytes()?).as_bytes())
    }
}

/// The three store families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreFamily {
    Authenticated,
    Mailbox,
    AppendOnly,
}

impl StoreFamily {
    /// Directory name under the network database root
    pub fn dir_name(&self) -> &'static str {
        match self {
            StoreFamily::Authenticated => "authenticated",
            StoreFamily::Mailbox => "mailbox",
            StoreFamily::AppendOnly => "append_only",
        }
    }
}

impl fmt::Display for StoreFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Every payload type known to this node
///
/// Doubles as the whitelist of persisted store files picked up at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayloadType {
    UserProfile,
    Offer,
    ChatMessage,
    AuthorizedBondedRole,
    MailboxMessage,
    ProofOfBurn,
}

impl PayloadType {
    pub const ALL: [PayloadType; 6] = [
        PayloadType::UserProfile,
        PayloadType::Offer,
        PayloadType::ChatMessage,
        PayloadType::AuthorizedBondedRole,
        PayloadType::MailboxMessage,
        PayloadType::ProofOfBurn,
    ];

    pub fn meta_data(&self) -> MetaData {
        match self {
            PayloadType::UserProfile => USER_PROFILE_META,
            PayloadType::Offer => OFFER_META,
            PayloadType::ChatMessage => CHAT_MESSAGE_META,
            PayloadType::AuthorizedBondedRole => BONDED_ROLE_META,
            PayloadType::MailboxMessage => MAILBOX_MESSAGE_META,
            PayloadType::ProofOfBurn => PROOF_OF_BURN_META,
        }
    }

    pub fn family(&self) -> StoreFamily {
        match self {
            PayloadType::UserProfile
            | PayloadType::Offer
            | PayloadType::ChatMessage
            | PayloadType::AuthorizedBondedRole => StoreFamily::Authenticated,
            PayloadType::MailboxMessage => StoreFamily::Mailbox,
            PayloadType::ProofOfBurn => StoreFamily::AppendOnly,
        }
    }

    pub fn type_id(&self) -> &'static str {
        self.meta_data().type_id
    }

    pub fn from_type_id(type_id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.type_id() == type_id)
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_id())
    }
}

/// Payload handed to listeners and returned from accepted requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StorageData {
    Authenticated(AuthenticatedPayload),
    Mailbox(MailboxMessage),
    AppendOnly(AppendOnlyPayload),
}

impl StorageData {
    pub fn payload_type(&self) -> PayloadType {
        match self {
            StorageData::Authenticated(p) => p.payload_type(),
            StorageData::Mailbox(_) => PayloadType::MailboxMessage,
            StorageData::AppendOnly(p) => p.payload_type(),
        }
    }
}

impl From<AuthenticatedPayload> for StorageData {
    fn from(payload: AuthenticatedPayload) -> Self {
        StorageData::Authenticated(payload)
    }
}

impl From<MailboxMessage> for StorageData {
    fn from(message: MailboxMessage) -> Self {
        StorageData::Mailbox(message)
    }
}

impl From<AppendOnlyPayload> for StorageData {
    fn from(payload: AppendOnlyPayload) -> Self {
        StorageData::AppendOnly(payload)
    }
}
