//! Identity primitives for the data layer
//!
//! Publishers own their entries through an Ed25519 key. Stores never see the
//! key directly in the payload; they see a [`PubKeyHash`] and check that the
//! public key shipped with a request hashes to it before verifying signatures.

mod keypair;
mod pub_key_hash;

pub use keypair::{Keypair, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
pub use pub_key_hash::{PubKeyHash, PUB_KEY_HASH_LENGTH};
