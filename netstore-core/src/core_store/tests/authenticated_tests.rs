/*
    Authenticated store scenarios

    Admission order, sequence numbers, tombstones, refresh and bonded role
    authorization against a single in-memory store.
*/

use std::sync::Arc;

use super::{authenticated_service, authenticated_service_with};
use crate::core_store::key::StorageKey;
use crate::core_store::metadata::{now_millis, MetaData, HOUR_MS};
use crate::core_store::payload::{
    AuthenticatedPayload, AuthorizedKeySet, PayloadType, BONDED_ROLE_META, OFFER_META,
    USER_PROFILE_META,
};
use crate::core_store::request::{
    AuthenticatedEntry, RefreshAuthenticatedDataRequest, RemoveAuthenticatedDataRequest,
};
use crate::core_store::result::Rejection;
use crate::core_store::service::{AuthenticatedPolicy, DataListener};
use crate::core_store::store::{MemoryBlobStore, StoreEntry};
use crate::test_utils::assertions::{assert_accepted, assert_rejected};
use crate::test_utils::fixtures::{
    bonded_role, keypair, offer, signed_request_at, user_profile, TestOfferBuilder,
};
use crate::test_utils::listener::RecordingListener;

#[test]
fn test_capacity_rejects_new_slots_only() {
    let service = authenticated_service(OFFER_META.with_max_map_size(2));
    let kp = keypair(1);
    let now = now_millis();

    assert_accepted(service.add_at(signed_request_at(&kp, offer(&kp, "o1"), 1, now), now).unwrap());
    assert_accepted(service.add_at(signed_request_at(&kp, offer(&kp, "o2"), 1, now), now).unwrap());
    assert_rejected(
        service.add_at(signed_request_at(&kp, offer(&kp, "o3"), 1, now), now).unwrap(),
        Rejection::MaxMapSizeReached,
    );

    // An update lands on an existing slot
    let update = TestOfferBuilder::new(&kp, "o1").amount(5).build();
    assert_accepted(service.add_at(signed_request_at(&kp, update, 2, now), now).unwrap());
    assert_eq!(service.len().unwrap(), 2);
}

#[test]
fn test_sequence_numbers_and_tombstones() {
    let service = authenticated_service(OFFER_META);
    let kp = keypair(1);
    let now = now_millis();
    let add = signed_request_at(&kp, offer(&kp, "o1"), 5, now);
    let key = add.key();

    assert_accepted(service.add_at(add.clone(), now).unwrap());

    let stale = RemoveAuthenticatedDataRequest::for_add(&kp, &add, 4);
    assert_rejected(service.remove_at(stale, now).unwrap(), Rejection::SequenceNrInvalid);
    assert!(service.get(&key).unwrap().is_some());

    let remove = RemoveAuthenticatedDataRequest::for_add(&kp, &add, 6);
    let removed = assert_accepted(service.remove_at(remove.clone(), now).unwrap());
    assert_eq!(removed, add.data.payload);
    assert!(service.get(&key).unwrap().is_none());
    assert!(service.get_entry(&key).unwrap().map(|e| e.is_tombstone()).unwrap_or(false));

    assert_rejected(service.remove_at(remove, now).unwrap(), Rejection::AlreadyRemoved);

    let later = RemoveAuthenticatedDataRequest::for_add(&kp, &add, 7);
    assert_rejected(service.remove_at(later, now).unwrap(), Rejection::NoEntry);
    assert_eq!(service.get_entry(&key).unwrap().map(|e| e.sequence_number()), Some(7));
}

#[test]
fn test_tombstone_blocks_replay() {
    let service = authenticated_service(OFFER_META);
    let kp = keypair(1);
    let now = now_millis();
    let add = signed_request_at(&kp, offer(&kp, "o1"), 1, now);

    assert_accepted(service.add_at(add.clone(), now).unwrap());
    assert_accepted(
        service
            .remove_at(RemoveAuthenticatedDataRequest::for_add(&kp, &add, 2), now)
            .unwrap(),
    );

    assert_rejected(service.add_at(add, now).unwrap(), Rejection::SequenceNrInvalid);

    let republished = signed_request_at(&kp, offer(&kp, "o1"), 3, now);
    assert_accepted(service.add_at(republished, now).unwrap());
}

#[test]
fn test_duplicate_add_is_benign() {
    let service = authenticated_service(USER_PROFILE_META);
    let kp = keypair(1);
    let now = now_millis();
    let add = signed_request_at(&kp, user_profile(&kp, "alice"), 1, now);

    assert_accepted(service.add_at(add.clone(), now).unwrap());
    assert_rejected(service.add_at(add, now).unwrap(), Rejection::RequestAlreadyReceived);

    let same_seq = signed_request_at(&kp, user_profile(&kp, "alice2"), 1, now);
    assert_rejected(service.add_at(same_seq, now).unwrap(), Rejection::SequenceNrInvalid);
}

#[test]
fn test_forged_owner_is_rejected() {
    let service = authenticated_service(OFFER_META);
    let kp = keypair(1);
    let victim = keypair(2);
    let now = now_millis();

    let forged = signed_request_at(&kp, offer(&victim, "o1"), 1, now);
    assert_rejected(service.add_at(forged, now).unwrap(), Rejection::PublicKeyHashInvalid);

    let mut swapped_key = signed_request_at(&kp, offer(&kp, "o1"), 1, now);
    swapped_key.owner_public_key = victim.public_key().to_vec();
    assert_rejected(service.add_at(swapped_key, now).unwrap(), Rejection::PublicKeyHashInvalid);
    assert!(service.is_empty().unwrap());
}

#[test]
fn test_tampered_payload_breaks_signature() {
    let service = authenticated_service(OFFER_META);
    let kp = keypair(1);
    let now = now_millis();

    let mut request = signed_request_at(&kp, offer(&kp, "o1"), 1, now);
    request.data.payload = TestOfferBuilder::new(&kp, "o1").price(1).build();
    assert_rejected(service.add_at(request, now).unwrap(), Rejection::SignatureInvalid);
}

#[test]
fn test_creation_date_bounds() {
    let service = authenticated_service(OFFER_META);
    let kp = keypair(1);
    let now = now_millis();

    let expired = signed_request_at(&kp, offer(&kp, "old"), 1, now - OFFER_META.ttl_ms - 1);
    assert_rejected(service.add_at(expired, now).unwrap(), Rejection::Expired);

    let future = signed_request_at(&kp, offer(&kp, "future"), 1, now + 3 * HOUR_MS);
    assert_rejected(service.add_at(future, now).unwrap(), Rejection::CreationDateInvalid);

    let skewed = signed_request_at(&kp, offer(&kp, "skewed"), 1, now + 2 * HOUR_MS);
    assert_accepted(service.add_at(skewed, now).unwrap());
}

#[test]
fn test_size_and_structure_checks() {
    let tiny = MetaData {
        max_size_bytes: 10,
        ..OFFER_META
    };
    let service = authenticated_service(tiny);
    let kp = keypair(1);
    let now = now_millis();
    assert_rejected(
        service.add_at(signed_request_at(&kp, offer(&kp, "o1"), 1, now), now).unwrap(),
        Rejection::MetaDataInvalid,
    );

    let profiles = authenticated_service(USER_PROFILE_META);
    let long_nick = "n".repeat(101);
    assert_rejected(
        profiles
            .add_at(signed_request_at(&kp, user_profile(&kp, &long_nick), 1, now), now)
            .unwrap(),
        Rejection::DataInvalid,
    );

    // Routed to the wrong store
    assert_rejected(
        profiles.add_at(signed_request_at(&kp, offer(&kp, "o1"), 1, now), now).unwrap(),
        Rejection::MetaDataInvalid,
    );
}

#[test]
fn test_remove_of_absent_key_leaves_tombstone() {
    let service = authenticated_service(OFFER_META);
    let kp = keypair(1);
    let now = now_millis();
    let remove = RemoveAuthenticatedDataRequest::new_with_created(&kp, PayloadType::Offer, "o1", 3, now);
    assert_eq!(remove.key, StorageKey::authenticated(&kp.pub_key_hash(), "o1"));
    assert_rejected(service.remove_at(remove, now).unwrap(), Rejection::NoEntry);
    assert_eq!(service.stats().unwrap().tombstones, 1);

    // The add arrives after its removal
    let late = signed_request_at(&kp, offer(&kp, "o1"), 2, now);
    assert_rejected(service.add_at(late, now).unwrap(), Rejection::SequenceNrInvalid);
}

#[test]
fn test_remove_by_non_owner() {
    let service = authenticated_service(OFFER_META);
    let kp = keypair(1);
    let other = keypair(2);
    let now = now_millis();
    let add = signed_request_at(&kp, offer(&kp, "o1"), 1, now);
    assert_accepted(service.add_at(add.clone(), now).unwrap());

    let hostile = RemoveAuthenticatedDataRequest::for_add(&other, &add, 2);
    assert_rejected(service.remove_at(hostile, now).unwrap(), Rejection::PublicKeyHashInvalid);
    assert!(service.get(&add.key()).unwrap().is_some());
}

#[test]
fn test_stranger_cannot_tombstone_owner_slot() {
    let service = authenticated_service(OFFER_META);
    let kp = keypair(1);
    let other = keypair(2);
    let now = now_millis();
    let add = signed_request_at(&kp, offer(&kp, "o1"), 1, now);

    let squat = RemoveAuthenticatedDataRequest::for_add(&other, &add, 100);
    assert!(squat.is_signature_valid());
    assert_rejected(service.remove_at(squat, now).unwrap(), Rejection::PublicKeyHashInvalid);
    assert_eq!(service.stats().unwrap().tombstones, 0);

    // The owner's remove overtakes its own add
    let remove = RemoveAuthenticatedDataRequest::new_with_created(&kp, PayloadType::Offer, "o1", 2, now);
    assert_rejected(service.remove_at(remove, now).unwrap(), Rejection::NoEntry);
    assert_eq!(service.stats().unwrap().tombstones, 1);

    // so the late add must not resurrect the offer
    assert_rejected(service.add_at(add.clone(), now).unwrap(), Rejection::SequenceNrInvalid);
    assert!(service.get(&add.key()).unwrap().is_none());
}

#[test]
fn test_remove_with_wrong_payload_type() {
    let service = authenticated_service(OFFER_META);
    let kp = keypair(1);
    let now = now_millis();
    let add = signed_request_at(&kp, offer(&kp, "o1"), 1, now);
    assert_accepted(service.add_at(add.clone(), now).unwrap());

    let remove = RemoveAuthenticatedDataRequest::new_with_created(&kp, PayloadType::UserProfile, "o1", 2, now);
    assert_rejected(service.remove_at(remove, now).unwrap(), Rejection::MetaDataInvalid);
}

#[test]
fn test_tombstone_counts_against_capacity() {
    let service = authenticated_service(OFFER_META.with_max_map_size(1));
    let kp = keypair(1);
    let now = now_millis();
    assert_accepted(service.add_at(signed_request_at(&kp, offer(&kp, "o1"), 1, now), now).unwrap());

    let remove = RemoveAuthenticatedDataRequest::new_with_created(&kp, PayloadType::Offer, "o2", 1, now);
    assert_rejected(service.remove_at(remove, now).unwrap(), Rejection::MaxMapSizeReached);
    assert_eq!(service.stats().unwrap().tombstones, 0);
}

#[test]
fn test_refresh_renews_lifetime() {
    let service = authenticated_service(OFFER_META);
    let kp = keypair(1);
    let t0 = now_millis();
    let add = signed_request_at(&kp, offer(&kp, "o1"), 1, t0);
    assert_accepted(service.add_at(add.clone(), t0).unwrap());

    let t1 = t0 + 24 * HOUR_MS;
    let refresh = RefreshAuthenticatedDataRequest::new_with_created(&kp, PayloadType::Offer, add.key(), 2, t1);
    assert_accepted(service.refresh_at(refresh.clone(), t1).unwrap());

    match service.get_entry(&add.key()).unwrap() {
        Some(entry @ AuthenticatedEntry::Refreshed { .. }) => {
            assert_eq!(entry.created(), t1);
            assert_eq!(entry.sequence_number(), 2);
        }
        other => panic!("expected refreshed entry, got {:?}", other),
    }

    // Outlives the original ttl
    assert_eq!(service.prune_expired_at(t0 + OFFER_META.ttl_ms + 1).unwrap(), 0);
    assert_eq!(service.prune_expired_at(t1 + OFFER_META.ttl_ms + 1).unwrap(), 1);

    assert_rejected(service.refresh_at(refresh, t1).unwrap(), Rejection::NoEntry);
}

#[test]
fn test_refresh_with_stale_creation_date() {
    let service = authenticated_service(OFFER_META);
    let kp = keypair(1);
    let now = now_millis();
    let add = signed_request_at(&kp, offer(&kp, "o1"), 1, now);
    assert_accepted(service.add_at(add.clone(), now).unwrap());

    let stale = now - OFFER_META.ttl_ms - 1;
    let expired = RefreshAuthenticatedDataRequest::new_with_created(&kp, PayloadType::Offer, add.key(), 2, stale);
    assert_rejected(service.refresh_at(expired, now).unwrap(), Rejection::Expired);

    let future = now + 3 * HOUR_MS;
    let early = RefreshAuthenticatedDataRequest::new_with_created(&kp, PayloadType::Offer, add.key(), 2, future);
    assert_rejected(service.refresh_at(early, now).unwrap(), Rejection::CreationDateInvalid);

    let mistyped = RefreshAuthenticatedDataRequest::new(&kp, PayloadType::UserProfile, add.key(), 2);
    assert_rejected(service.refresh_at(mistyped, now).unwrap(), Rejection::MetaDataInvalid);
}

#[test]
fn test_relayed_refresh_carries_its_add() {
    let service = authenticated_service(OFFER_META);
    let recorder = Arc::new(RecordingListener::<AuthenticatedPayload>::new());
    service.add_listener(recorder.clone());
    let kp = keypair(1);
    let other = keypair(2);
    let t0 = now_millis();
    let add = signed_request_at(&kp, offer(&kp, "o1"), 1, t0);

    // The add alone would have expired, the refresh keeps it alive
    let t1 = t0 + OFFER_META.ttl_ms + HOUR_MS;
    let refresh = RefreshAuthenticatedDataRequest::new_with_created(&kp, PayloadType::Offer, add.key(), 2, t1);
    assert_rejected(service.add_at(add.clone(), t1).unwrap(), Rejection::Expired);
    assert_accepted(service.add_refreshed_at(add.clone(), refresh.clone(), t1).unwrap());
    assert_rejected(
        service.add_refreshed_at(add.clone(), refresh.clone(), t1).unwrap(),
        Rejection::RequestAlreadyReceived,
    );
    assert_eq!(service.get_entry(&add.key()).unwrap().map(|e| e.sequence_number()), Some(2));
    assert_eq!(recorder.added(), vec![add.data.payload.clone()]);

    let newer = RefreshAuthenticatedDataRequest::new_with_created(&kp, PayloadType::Offer, add.key(), 3, t1);
    assert_accepted(service.add_refreshed_at(add.clone(), newer, t1).unwrap());
    assert_eq!(recorder.refreshed(), vec![add.data.payload.clone()]);
    assert_rejected(
        service.add_refreshed_at(add.clone(), refresh, t1).unwrap(),
        Rejection::SequenceNrInvalid,
    );

    let foreign = RefreshAuthenticatedDataRequest::new_with_created(&other, PayloadType::Offer, add.key(), 9, t1);
    assert_rejected(
        service.add_refreshed_at(add.clone(), foreign, t1).unwrap(),
        Rejection::PublicKeyHashInvalid,
    );
    let elsewhere = StorageKey::authenticated(&kp.pub_key_hash(), "o2");
    let misplaced = RefreshAuthenticatedDataRequest::new_with_created(&kp, PayloadType::Offer, elsewhere, 9, t1);
    assert_rejected(service.add_refreshed_at(add.clone(), misplaced, t1).unwrap(), Rejection::DataInvalid);
    let behind = RefreshAuthenticatedDataRequest::new_with_created(&kp, PayloadType::Offer, add.key(), 1, t1);
    assert_rejected(service.add_refreshed_at(add, behind, t1).unwrap(), Rejection::SequenceNrInvalid);
}

#[test]
fn test_refresh_rejections() {
    let service = authenticated_service(OFFER_META);
    let kp = keypair(1);
    let other = keypair(2);
    let now = now_millis();
    let add = signed_request_at(&kp, offer(&kp, "o1"), 1, now);
    let key = add.key();

    let early = RefreshAuthenticatedDataRequest::new(&kp, PayloadType::Offer, key, 2);
    assert_rejected(service.refresh_at(early.clone(), now).unwrap(), Rejection::NoEntry);

    assert_accepted(service.add_at(add.clone(), now).unwrap());
    assert_accepted(service.refresh_at(early.clone(), now).unwrap());
    assert_rejected(service.refresh_at(early, now).unwrap(), Rejection::SequenceNrInvalid);

    let foreign = RefreshAuthenticatedDataRequest::new(&other, PayloadType::Offer, key, 3);
    assert_rejected(service.refresh_at(foreign, now).unwrap(), Rejection::PublicKeyHashInvalid);

    let mut forged = RefreshAuthenticatedDataRequest::new(&kp, PayloadType::Offer, key, 3);
    forged.sequence_number = 4;
    assert_rejected(service.refresh_at(forged, now).unwrap(), Rejection::SignatureInvalid);

    // The original add is still recognized after a refresh
    assert_rejected(service.add_at(add.clone(), now).unwrap(), Rejection::RequestAlreadyReceived);

    assert_accepted(
        service
            .remove_at(RemoveAuthenticatedDataRequest::for_add(&kp, &add, 3), now)
            .unwrap(),
    );
    let after_remove = RefreshAuthenticatedDataRequest::new(&kp, PayloadType::Offer, key, 4);
    assert_rejected(service.refresh_at(after_remove, now).unwrap(), Rejection::AlreadyRemoved);
}

#[test]
fn test_bonded_role_needs_authorized_key() {
    let authorizer = keypair(10);
    let stranger = keypair(11);
    let owner = keypair(1);
    let now = now_millis();

    let mut keys = AuthorizedKeySet::new();
    keys.insert(authorizer.public_key());
    let service = authenticated_service_with(
        AuthenticatedPolicy::new(keys),
        BONDED_ROLE_META,
        Arc::new(MemoryBlobStore::new()),
    );

    let unauthorized = signed_request_at(&owner, bonded_role(&owner, &stranger, "p1"), 1, now);
    assert_rejected(service.add_at(unauthorized, now).unwrap(), Rejection::NotAuthorized);

    let authorized = signed_request_at(&owner, bonded_role(&owner, &authorizer, "p1"), 1, now);
    assert_accepted(service.add_at(authorized, now).unwrap());

    let no_keys = authenticated_service(BONDED_ROLE_META);
    let again = signed_request_at(&owner, bonded_role(&owner, &authorizer, "p1"), 1, now);
    assert_rejected(no_keys.add_at(again, now).unwrap(), Rejection::NotAuthorized);
}

#[test]
fn test_listener_events() {
    let service = authenticated_service(OFFER_META);
    let recorder = Arc::new(RecordingListener::<AuthenticatedPayload>::new());
    let listener: Arc<dyn DataListener<AuthenticatedPayload>> = recorder.clone();
    service.add_listener(listener.clone());

    let kp = keypair(1);
    let now = now_millis();
    let add = signed_request_at(&kp, offer(&kp, "o1"), 1, now);
    assert_accepted(service.add_at(add.clone(), now).unwrap());
    assert_rejected(service.add_at(add.clone(), now).unwrap(), Rejection::RequestAlreadyReceived);

    let refresh = RefreshAuthenticatedDataRequest::new(&kp, PayloadType::Offer, add.key(), 2);
    assert_accepted(service.refresh_at(refresh, now).unwrap());
    assert_accepted(
        service
            .remove_at(RemoveAuthenticatedDataRequest::for_add(&kp, &add, 3), now)
            .unwrap(),
    );

    assert_eq!(recorder.added(), vec![add.data.payload.clone()]);
    assert_eq!(recorder.refreshed(), vec![add.data.payload.clone()]);
    assert_eq!(recorder.removed(), vec![add.data.payload.clone()]);

    assert!(service.remove_listener(&listener));
    let next = signed_request_at(&kp, offer(&kp, "o2"), 1, now);
    assert_accepted(service.add_at(next, now).unwrap());
    assert_eq!(recorder.added().len(), 1);
}

#[test]
fn test_expiry_notifies_listeners() {
    let service = authenticated_service(OFFER_META);
    let recorder = Arc::new(RecordingListener::<AuthenticatedPayload>::new());
    service.add_listener(recorder.clone());

    let kp = keypair(1);
    let now = now_millis();
    let add = signed_request_at(&kp, offer(&kp, "o1"), 1, now);
    assert_accepted(service.add_at(add.clone(), now).unwrap());

    assert_eq!(service.prune_expired_at(now + OFFER_META.ttl_ms).unwrap(), 0);
    assert_eq!(service.prune_expired_at(now + OFFER_META.ttl_ms + 1).unwrap(), 1);
    assert_eq!(recorder.removed(), vec![add.data.payload]);
    assert!(service.is_empty().unwrap());
}
