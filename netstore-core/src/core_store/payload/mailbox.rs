//! Mailbox payload
//!
//! Sealed message parked in the network for an offline receiver.

use serde::{Deserialize, Serialize};

use super::DistributedData;
use crate::core_identity::PubKeyHash;
use crate::core_store::metadata::{MetaData, LOW_PRIORITY, MAX_MAP_SIZE_10_000, TTL_10_DAYS};

pub const MAILBOX_MESSAGE_META: MetaData =
    MetaData::new("MailboxMessage", TTL_10_DAYS, 100_000, MAX_MAP_SIZE_10_000, LOW_PRIORITY);

const MAX_ID_LENGTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxMessage {
    pub id: String,
    pub sender: PubKeyHash,
    pub receiver: PubKeyHash,
    /// Ciphertext only the receiver can open
    pub sealed: Vec<u8>,
}

impl MailboxMessage {
    pub fn new(id: impl Into<String>, sender: PubKeyHash, receiver: PubKeyHash, sealed: Vec<u8>) -> Self {
        MailboxMessage {
            id: id.into(),
            sender,
            receiver,
            sealed,
        }
    }
}

impl DistributedData for MailboxMessage {
    fn meta_data(&self) -> MetaData {
        MAILBOX_MESSAGE_META
    }

    fn is_data_invalid(&self) -> bool {
        self.id.is_empty() || self.id.len() > MAX_ID_LENGTH || self.sealed.is_empty()
    }

    fn cost_factor(&self) -> f64 {
        0.2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_validity() {
        let sender = PubKeyHash::from_public_key(b"sender");
        let receiver = PubKeyHash::from_public_key(b"receiver");

        assert!(!MailboxMessage::new("m1", sender, receiver, vec![1, 2, 3]).is_data_invalid());
        assert!(MailboxMessage::new("m1", sender, receiver, vec![]).is_data_invalid());
        assert!(MailboxMessage::new("", sender, receiver, vec![1]).is_data_invalid());
    }
}
