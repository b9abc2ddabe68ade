/*
    request - Signed data requests and stored records

    Requests are what peers gossip. Stores keep the requests themselves as
    their records: a live entry is the last accepted add, a tombstone is the
    last accepted remove. Keeping the signed request lets a node hand the
    exact same bytes on to other peers during reconciliation.
*/

mod append_only;
mod authenticated;
mod mailbox;

pub use append_only::AddAppendOnlyDataRequest;
pub use authenticated::{
    AddAuthenticatedDataRequest, AuthenticatedEntry, AuthenticatedSequentialData,
    RefreshAuthenticatedDataRequest, RemoveAuthenticatedDataRequest,
};
pub use mailbox::{AddMailboxRequest, MailboxEntry, MailboxSequentialData, RemoveMailboxRequest};

use serde::{Deserialize, Serialize};

use crate::core_store::payload::PayloadType;
use crate::core_store::store::{StoreError, StoreResult};

/// Creation dates further ahead than this are not accepted
pub const MAX_FUTURE_CREATION_MS: u64 = 2 * crate::core_store::metadata::HOUR_MS;

/// Concatenate a domain tag and the signed fields
fn signing_message(domain: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    let len = domain.len() + parts.iter().map(|p| p.len()).sum::<usize>();
    let mut message = Vec::with_capacity(len);
    message.extend_from_slice(domain);
    for part in parts {
        message.extend_from_slice(part);
    }
    message
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddDataRequest {
    Authenticated(AddAuthenticatedDataRequest),
    Mailbox(AddMailboxRequest),
    AppendOnly(AddAppendOnlyDataRequest),
}

impl AddDataRequest {
    pub fn payload_type(&self) -> PayloadType {
        match self {
            AddDataRequest::Authenticated(r) => r.data.payload.payload_type(),
            AddDataRequest::Mailbox(_) => PayloadType::MailboxMessage,
            AddDataRequest::AppendOnly(r) => r.payload.payload_type(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoveDataRequest {
    Authenticated(RemoveAuthenticatedDataRequest),
    Mailbox(RemoveMailboxRequest),
}

impl RemoveDataRequest {
    pub fn payload_type(&self) -> PayloadType {
        match self {
            RemoveDataRequest::Authenticated(r) => r.payload_type,
            RemoveDataRequest::Mailbox(_) => PayloadType::MailboxMessage,
        }
    }
}

/// Any request that can travel in an inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataRequest {
    Add(AddDataRequest),
    Remove(RemoveDataRequest),
    /// A refreshed authenticated entry: the original add and the refresh on top of it
    Refresh {
        add: AddAuthenticatedDataRequest,
        refresh: RefreshAuthenticatedDataRequest,
    },
}

impl DataRequest {
    pub fn payload_type(&self) -> PayloadType {
        match self {
            DataRequest::Add(r) => r.payload_type(),
            DataRequest::Remove(r) => r.payload_type(),
            DataRequest::Refresh { add, .. } => add.data.payload.payload_type(),
        }
    }

    pub fn is_removal(&self) -> bool {
        matches!(self, DataRequest::Remove(_))
    }

    /// Encoded size on the wire
    pub fn serialized_size(&self) -> StoreResult<u64> {
        bincode::serialized_size(self).map_err(StoreError::from)
    }
}
