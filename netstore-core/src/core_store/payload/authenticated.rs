//! Authenticated payload types
//!
//! Owner signed payloads stored in the authenticated store family. Each
//! payload names its owner's public key hash and a stable id; together they
//! select the storage slot.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::{DistributedData, PayloadType};
use crate::core_identity::{Keypair, PubKeyHash, PUBLIC_KEY_LENGTH};
use crate::core_store::metadata::{
    MetaData, DEFAULT_PRIORITY, HIGHEST_PRIORITY, HIGH_PRIORITY, MAX_MAP_SIZE_1_000,
    MAX_MAP_SIZE_10_000, TTL_100_DAYS, TTL_10_DAYS, TTL_15_DAYS,
};
use crate::core_store::store::{StoreError, StoreResult};

pub const USER_PROFILE_META: MetaData =
    MetaData::new("UserProfile", TTL_15_DAYS, 10_000, MAX_MAP_SIZE_10_000, HIGH_PRIORITY);
pub const OFFER_META: MetaData =
    MetaData::new("Offer", TTL_10_DAYS, 10_000, MAX_MAP_SIZE_10_000, DEFAULT_PRIORITY);
pub const CHAT_MESSAGE_META: MetaData =
    MetaData::new("ChatMessage", TTL_10_DAYS, 20_000, MAX_MAP_SIZE_10_000, DEFAULT_PRIORITY);
pub const BONDED_ROLE_META: MetaData = MetaData::new(
    "AuthorizedBondedRole",
    TTL_100_DAYS,
    10_000,
    MAX_MAP_SIZE_1_000,
    HIGHEST_PRIORITY,
);

const MAX_NICK_NAME_LENGTH: usize = 100;
const MAX_STATEMENT_LENGTH: usize = 1_000;
const MAX_ID_LENGTH: usize = 100;
const MAX_TEXT_LENGTH: usize = 10_000;

const BONDED_ROLE_AUTHORIZATION_DOMAIN: &[u8] = b"netstore/authorize/bonded-role";

/// Public profile of a network participant, one per owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub nick_name: String,
    pub owner: PubKeyHash,
    pub statement: String,
}

impl UserProfile {
    pub fn new(nick_name: impl Into<String>, owner: PubKeyHash) -> Self {
        UserProfile {
            nick_name: nick_name.into(),
            owner,
            statement: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

/// Offer published by its maker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub owner: PubKeyHash,
    pub market: String,
    pub direction: Direction,
    pub amount: u64,
    pub price: u64,
}

/// Metadata of a public chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub channel_id: String,
    pub author: PubKeyHash,
    pub text: String,
    pub was_edited: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BondedRoleType {
    Mediator,
    Arbitrator,
    Moderator,
    SeedNode,
    Oracle,
}

impl fmt::Display for BondedRoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BondedRoleType::Mediator => "mediator",
            BondedRoleType::Arbitrator => "arbitrator",
            BondedRoleType::Moderator => "moderator",
            BondedRoleType::SeedNode => "seed-node",
            BondedRoleType::Oracle => "oracle",
        };
        f.write_str(name)
    }
}

/// Set of Ed25519 keys allowed to authorize bonded roles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizedKeySet {
    keys: HashSet<[u8; PUBLIC_KEY_LENGTH]>,
}

impl AuthorizedKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse hex encoded public keys
    pub fn from_hex<I, S>(keys: I) -> StoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for key in keys {
            let bytes = hex::decode(key.as_ref().trim()).map_err(|e| {
                StoreError::InvalidKey(format!("authorized key is not hex: {}", e))
            })?;
            let bytes: [u8; PUBLIC_KEY_LENGTH] = bytes.try_into().map_err(|_| {
                StoreError::InvalidKey(format!(
                    "authorized key must be {} bytes",
                    PUBLIC_KEY_LENGTH
                ))
            })?;
            set.keys.insert(bytes);
        }
        Ok(set)
    }

    pub fn insert(&mut self, public_key: &[u8]) -> bool {
        match <[u8; PUBLIC_KEY_LENGTH]>::try_from(public_key) {
            Ok(key) => self.keys.insert(key),
            Err(_) => false,
        }
    }

    pub fn contains(&self, public_key: &[u8]) -> bool {
        <[u8; PUBLIC_KEY_LENGTH]>::try_from(public_key)
            .map(|key| self.keys.contains(&key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Bonded role attestation
///
/// Published by the role holder, countersigned by one of the authorized keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedBondedRole {
    pub role: BondedRoleType,
    pub profile_id: String,
    pub owner: PubKeyHash,
    pub authorizer_public_key: Vec<u8>,
    pub authorizer_signature: Vec<u8>,
}

impl AuthorizedBondedRole {
    /// Build an attestation countersigned by `authorizer`
    pub fn new_signed(
        role: BondedRoleType,
        profile_id: impl Into<String>,
        owner: PubKeyHash,
        authorizer: &Keypair,
    ) -> Self {
        let profile_id = profile_id.into();
        let message = Self::authorization_message(role, &profile_id, &owner);
        AuthorizedBondedRole {
            role,
            profile_id,
            owner,
            authorizer_public_key: authorizer.public_key().to_vec(),
            authorizer_signature: authorizer.sign(&message),
        }
    }

    fn authorization_message(role: BondedRoleType, profile_id: &str, owner: &PubKeyHash) -> Vec<u8> {
        let mut message = Vec::with_capacity(BONDED_ROLE_AUTHORIZATION_DOMAIN.len() + 64);
        message.extend_from_slice(BONDED_ROLE_AUTHORIZATION_DOMAIN);
        message.extend_from_slice(role.to_string().as_bytes());
        message.push(0);
        message.extend_from_slice(profile_id.as_bytes());
        message.push(0);
        message.extend_from_slice(owner.as_bytes());
        message
    }

    /// Whether the countersignature is valid and made by an authorized key
    pub fn is_authorized(&self, authorized_keys: &AuthorizedKeySet) -> bool {
        if !authorized_keys.contains(&self.authorizer_public_key) {
            return false;
        }
        let message = Self::authorization_message(self.role, &self.profile_id, &self.owner);
        Keypair::verify(&self.authorizer_public_key, &message, &self.authorizer_signature)
    }
}

/// Closed set of authenticated payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticatedPayload {
    UserProfile(UserProfile),
    Offer(Offer),
    ChatMessage(ChatMessage),
    AuthorizedBondedRole(AuthorizedBondedRole),
}

impl AuthenticatedPayload {
    pub fn payload_type(&self) -> PayloadType {
        match self {
            AuthenticatedPayload::UserProfile(_) => PayloadType::UserProfile,
            AuthenticatedPayload::Offer(_) => PayloadType::Offer,
            AuthenticatedPayload::ChatMessage(_) => PayloadType::ChatMessage,
            AuthenticatedPayload::AuthorizedBondedRole(_) => PayloadType::AuthorizedBondedRole,
        }
    }

    /// Public key hash the payload claims as its owner
    pub fn owner(&self) -> &PubKeyHash {
        match self {
            AuthenticatedPayload::UserProfile(p) => &p.owner,
            AuthenticatedPayload::Offer(o) => &o.owner,
            AuthenticatedPayload::ChatMessage(m) => &m.author,
            AuthenticatedPayload::AuthorizedBondedRole(r) => &r.owner,
        }
    }

    /// Identity of the logical item, stable across updates
    pub fn stable_id(&self) -> String {
        match self {
            AuthenticatedPayload::UserProfile(_) => "user-profile".to_string(),
            AuthenticatedPayload::Offer(o) => o.id.clone(),
            AuthenticatedPayload::ChatMessage(m) => m.id.clone(),
            AuthenticatedPayload::AuthorizedBondedRole(r) => format!("{}/{}", r.role, r.profile_id),
        }
    }

    /// Bonded roles must be authorized, everything else is unconditionally authorized
    pub fn is_not_authorized(&self, authorized_keys: &AuthorizedKeySet) -> bool {
        match self {
            AuthenticatedPayload::AuthorizedBondedRole(role) => !role.is_authorized(authorized_keys),
            _ => false,
        }
    }
}

fn is_bad_id(id: &str) -> bool {
    id.is_empty() || id.len() > MAX_ID_LENGTH
}

impl DistributedData for AuthenticatedPayload {
    fn meta_data(&self) -> MetaData {
        self.payload_type().meta_data()
    }

    fn is_data_invalid(&self) -> bool {
        match self {
            AuthenticatedPayload::UserProfile(p) => {
                p.nick_name.is_empty()
                    || p.nick_name.chars().count() > MAX_NICK_NAME_LENGTH
                    || p.statement.chars().count() > MAX_STATEMENT_LENGTH
            }
            AuthenticatedPayload::Offer(o) => {
                is_bad_id(&o.id) || o.market.is_empty() || o.amount == 0 || o.price == 0
            }
            AuthenticatedPayload::ChatMessage(m) => {
                is_bad_id(&m.id)
                    || is_bad_id(&m.channel_id)
                    || m.text.chars().count() > MAX_TEXT_LENGTH
            }
            AuthenticatedPayload::AuthorizedBondedRole(r) => {
                is_bad_id(&r.profile_id)
                    || r.authorizer_public_key.len() != PUBLIC_KEY_LENGTH
                    || r.authorizer_signature.is_empty()
            }
        }
    }

    fn cost_factor(&self) -> f64 {
        match self {
            AuthenticatedPayload::UserProfile(_) => 0.5,
            AuthenticatedPayload::Offer(_) => 0.5,
            AuthenticatedPayload::ChatMessage(_) => 0.3,
            AuthenticatedPayload::AuthorizedBondedRole(_) => 0.5,
        }
    }
}
