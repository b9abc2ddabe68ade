//! Append-only payloads
//!
//! Immutable public attestations, keyed by their content hash.

use serde::{Deserialize, Serialize};

use super::{DistributedData, PayloadType};
use crate::core_store::metadata::{MetaData, DEFAULT_PRIORITY, MAX_MAP_SIZE_10_000, TTL_100_DAYS};

pub const PROOF_OF_BURN_META: MetaData =
    MetaData::new("ProofOfBurn", TTL_100_DAYS, 1_000, MAX_MAP_SIZE_10_000, DEFAULT_PRIORITY);

/// Public proof that `amount` was burned in transaction `tx_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOfBurn {
    pub tx_id: String,
    pub amount: u64,
    pub block_height: u32,
    /// Hash committed in the burn output
    pub proof_hash: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppendOnlyPayload {
    ProofOfBurn(ProofOfBurn),
}

impl AppendOnlyPayload {
    pub fn payload_type(&self) -> PayloadType {
        match self {
            AppendOnlyPayload::ProofOfBurn(_) => PayloadType::ProofOfBurn,
        }
    }
}

impl DistributedData for AppendOnlyPayload {
    fn meta_data(&self) -> MetaData {
        self.payload_type().meta_data()
    }

    fn is_data_invalid(&self) -> bool {
        match self {
            AppendOnlyPayload::ProofOfBurn(p) => {
                p.tx_id.is_empty() || p.amount == 0 || p.proof_hash.is_empty()
            }
        }
    }

    fn cost_factor(&self) -> f64 {
        0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn burn(amount: u64) -> AppendOnlyPayload {
        AppendOnlyPayload::ProofOfBurn(ProofOfBurn {
            tx_id: "tx1".to_string(),
            amount,
            block_height: 800_000,
            proof_hash: vec![7; 20],
        })
    }

    #[test]
    fn test_proof_of_burn_validity() {
        assert!(!burn(1_000).is_data_invalid());
        assert!(burn(0).is_data_invalid());
    }

    #[test]
    fn test_content_hash_differs_by_content() {
        assert_ne!(burn(1).payload_hash().unwrap(), burn(2).payload_hash().unwrap());
    }
}
