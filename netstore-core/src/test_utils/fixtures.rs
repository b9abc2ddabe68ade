//! Test fixtures for creating common test objects
//!
//! Fixture builders panic on failure; they are only used where a failure
//! means the test itself is broken.

use crate::core_identity::Keypair;
use crate::core_store::metadata::now_millis;
use crate::core_store::payload::{
    AppendOnlyPayload, AuthenticatedPayload, AuthorizedBondedRole, BondedRoleType, ChatMessage,
    Direction, MailboxMessage, Offer, ProofOfBurn, UserProfile,
};
use crate::core_store::request::{
    AddAppendOnlyDataRequest, AddAuthenticatedDataRequest, AddMailboxRequest,
};

/// Key pair derived from a one byte seed, stable across runs
pub fn keypair(seed: u8) -> Keypair {
    Keypair::from_seed([seed; 32])
}

pub fn user_profile(owner: &Keypair, nick_name: &str) -> AuthenticatedPayload {
    AuthenticatedPayload::UserProfile(UserProfile::new(nick_name, owner.pub_key_hash()))
}

pub fn offer(owner: &Keypair, id: &str) -> AuthenticatedPayload {
    TestOfferBuilder::new(owner, id).build()
}

pub fn chat_message(author: &Keypair, id: &str, text: &str) -> AuthenticatedPayload {
    AuthenticatedPayload::ChatMessage(ChatMessage {
        id: id.to_string(),
        channel_id: "general".to_string(),
        author: author.pub_key_hash(),
        text: text.to_string(),
        was_edited: false,
    })
}

pub fn bonded_role(owner: &Keypair, authorizer: &Keypair, profile_id: &str) -> AuthenticatedPayload {
    AuthenticatedPayload::AuthorizedBondedRole(AuthorizedBondedRole::new_signed(
        BondedRoleType::Mediator,
        profile_id,
        owner.pub_key_hash(),
        authorizer,
    ))
}

/// Add request for `payload` signed by `owner`, created now
pub fn signed_request(owner: &Keypair, payload: AuthenticatedPayload, seq: u32) -> AddAuthenticatedDataRequest {
    signed_request_at(owner, payload, seq, now_millis())
}

pub fn signed_request_at(
    owner: &Keypair,
    payload: AuthenticatedPayload,
    seq: u32,
    created: u64,
) -> AddAuthenticatedDataRequest {
    AddAuthenticatedDataRequest::new_with_created(owner, payload, seq, created)
        .expect("fixture payload must serialize")
}

pub fn user_profile_request(owner: &Keypair, nick_name: &str, seq: u32) -> AddAuthenticatedDataRequest {
    signed_request(owner, user_profile(owner, nick_name), seq)
}

pub fn offer_request(owner: &Keypair, id: &str, seq: u32) -> AddAuthenticatedDataRequest {
    signed_request(owner, offer(owner, id), seq)
}

pub fn mailbox_request(sender: &Keypair, receiver: &Keypair, id: &str, seq: u32) -> AddMailboxRequest {
    mailbox_request_at(sender, receiver, id, seq, now_millis())
}

pub fn mailbox_request_at(
    sender: &Keypair,
    receiver: &Keypair,
    id: &str,
    seq: u32,
    created: u64,
) -> AddMailboxRequest {
    let message = MailboxMessage::new(
        id,
        sender.pub_key_hash(),
        receiver.pub_key_hash(),
        format!("sealed:{}", id).into_bytes(),
    );
    AddMailboxRequest::new_with_created(sender, message, seq, created)
        .expect("fixture payload must serialize")
}

pub fn proof_of_burn(tx_id: &str) -> AppendOnlyPayload {
    AppendOnlyPayload::ProofOfBurn(ProofOfBurn {
        tx_id: tx_id.to_string(),
        amount: 10_000,
        block_height: 800_000,
        proof_hash: blake3::hash(tx_id.as_bytes()).as_bytes()[..20].to_vec(),
    })
}

pub fn proof_of_burn_request(tx_id: &str) -> AddAppendOnlyDataRequest {
    AddAppendOnlyDataRequest::new(proof_of_burn(tx_id))
}

/// Builder for offers with non-default fields
pub struct TestOfferBuilder {
    offer: Offer,
}

impl TestOfferBuilder {
    pub fn new(owner: &Keypair, id: &str) -> Self {
        Self {
            offer: Offer {
                id: id.to_string(),
                owner: owner.pub_key_hash(),
                market: "BTC/EUR".to_string(),
                direction: Direction::Buy,
                amount: 100_000,
                price: 60_000,
            },
        }
    }

    pub fn market(mut self, market: &str) -> Self {
        self.offer.market = market.to_string();
        self
    }

    pub fn sell(mut self) -> Self {
        self.offer.direction = Direction::Sell;
        self
    }

    pub fn amount(mut self, amount: u64) -> Self {
        self.offer.amount = amount;
        self
    }

    pub fn price(mut self, price: u64) -> Self {
        self.offer.price = price;
        self
    }

    pub fn build(self) -> AuthenticatedPayload {
        AuthenticatedPayload::Offer(self.offer)
    }
}
