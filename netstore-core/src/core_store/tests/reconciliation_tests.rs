/*
    Reconciliation between two nodes

    A node sends its DataFilter, the peer answers with an Inventory of what
    the filter does not cover, and the node admits that inventory through the
    normal add/remove path.
*/

use std::sync::Arc;

use crate::config::Config;
use crate::core_store::key::StorageKey;
use crate::core_store::metadata::now_millis;
use crate::core_store::payload::{PayloadType, StorageData, PROOF_OF_BURN_META};
use crate::core_store::request::{
    AddDataRequest, AuthenticatedEntry, RefreshAuthenticatedDataRequest, RemoveAuthenticatedDataRequest,
    RemoveDataRequest,
};
use crate::core_store::storage_service::StorageService;
use crate::core_store::store::{MemoryBlobStore, StoreEntry};
use crate::core_store::sync::{compute_inventory, DataFilter, FilterEntry, InventoryCandidate};
use crate::test_utils::fixtures::{
    keypair, offer_request, proof_of_burn_request, signed_request_at, user_profile_request,
    TestOfferBuilder,
};

fn node() -> StorageService {
    node_with(Config::default())
}

fn node_with(config: Config) -> StorageService {
    StorageService::new(&config, Arc::new(MemoryBlobStore::new())).unwrap()
}

/// One filter/inventory round from `requester` to `responder`
async fn sync_once(requester: &StorageService, responder: &StorageService) -> (usize, bool) {
    let filter = requester.data_filter().unwrap();
    let inventory = responder.get_inventory_of_all_stores(&filter).unwrap();
    let max_size_reached = inventory.max_size_reached;
    let accepted = requester.apply_inventory(inventory).await.unwrap();
    (accepted, max_size_reached)
}

fn offer_count(node: &StorageService) -> usize {
    match node.get_authenticated_data(Some("Offer")) {
        Ok(view) => view.iter().count(),
        Err(_) => 0,
    }
}

#[tokio::test]
async fn test_fresh_node_catches_up() {
    let seed = node();
    let fresh = node();
    let kp = keypair(1);

    for request in [
        AddDataRequest::Authenticated(offer_request(&kp, "o1", 1)),
        AddDataRequest::Authenticated(user_profile_request(&kp, "alice", 1)),
        AddDataRequest::AppendOnly(proof_of_burn_request("tx-1")),
    ] {
        assert!(seed.on_add_data_request(request).await.unwrap().is_some());
    }

    let (accepted, more) = sync_once(&fresh, &seed).await;
    assert_eq!(accepted, 3);
    assert!(!more);
    assert_eq!(offer_count(&fresh), 1);
    assert!(fresh.is_store_open(PROOF_OF_BURN_META.type_id).unwrap());

    // Nothing left to send
    let filter = fresh.data_filter().unwrap();
    let inventory = seed.get_inventory_of_all_stores(&filter).unwrap();
    assert!(inventory.is_empty());
    assert_eq!(inventory.num_filtered_out, 3);
}

#[tokio::test]
async fn test_stale_replica_receives_newer_version() {
    let seed = node();
    let replica = node();
    let kp = keypair(1);
    let now = now_millis();

    let v1 = signed_request_at(&kp, TestOfferBuilder::new(&kp, "o1").price(100).build(), 1, now);
    seed.add_data(AddDataRequest::Authenticated(v1)).await.unwrap();
    assert_eq!(sync_once(&replica, &seed).await.0, 1);

    let v2 = signed_request_at(&kp, TestOfferBuilder::new(&kp, "o1").price(200).build(), 2, now);
    let key = v2.key();
    seed.add_data(AddDataRequest::Authenticated(v2.clone())).await.unwrap();
    assert_eq!(sync_once(&replica, &seed).await.0, 1);

    let stored = replica
        .authenticated_store(PayloadType::Offer)
        .await
        .unwrap()
        .get(&key)
        .unwrap();
    assert_eq!(stored, Some(v2.data.payload));
}

#[tokio::test]
async fn test_removal_propagates() {
    let seed = node();
    let replica = node();
    let kp = keypair(1);
    let add = offer_request(&kp, "o1", 1);

    seed.add_data(AddDataRequest::Authenticated(add.clone())).await.unwrap();
    sync_once(&replica, &seed).await;
    assert_eq!(offer_count(&replica), 1);

    let remove = RemoveAuthenticatedDataRequest::for_add(&kp, &add, 2);
    let removed = seed
        .on_remove_data_request(RemoveDataRequest::Authenticated(remove))
        .await
        .unwrap();
    assert!(matches!(removed, Some(StorageData::Authenticated(_))));

    assert_eq!(sync_once(&replica, &seed).await.0, 1);
    assert_eq!(offer_count(&replica), 0);
    let entry = replica
        .authenticated_store(PayloadType::Offer)
        .await
        .unwrap()
        .get_entry(&add.key())
        .unwrap();
    assert!(entry.map(|e| e.is_tombstone()).unwrap_or(false));
}

#[tokio::test]
async fn test_refresh_propagates_and_converges() {
    let seed = node();
    let replica = node();
    let kp = keypair(1);
    let add = offer_request(&kp, "o1", 1);
    let key = add.key();

    seed.add_data(AddDataRequest::Authenticated(add.clone())).await.unwrap();
    let refreshed = seed
        .refresh_data(RefreshAuthenticatedDataRequest::for_add(&kp, &add, 2))
        .await
        .unwrap();
    assert!(refreshed.is_accepted());

    // The replica never saw the add, the refresh brings it along
    assert_eq!(sync_once(&replica, &seed).await.0, 1);
    let entry = replica
        .authenticated_store(PayloadType::Offer)
        .await
        .unwrap()
        .get_entry(&key)
        .unwrap();
    assert!(matches!(entry, Some(AuthenticatedEntry::Refreshed { .. })));
    assert_eq!(entry.map(|e| e.sequence_number()), Some(2));

    for _ in 0..3 {
        let filter = replica.data_filter().unwrap();
        let inventory = seed.get_inventory_of_all_stores(&filter).unwrap();
        assert!(inventory.is_empty());
        assert_eq!(replica.apply_inventory(inventory).await.unwrap(), 0);
    }

    // A later refresh replaces the replica's copy in place
    let again = seed
        .refresh_data(RefreshAuthenticatedDataRequest::for_add(&kp, &add, 3))
        .await
        .unwrap();
    assert!(again.is_accepted());
    assert_eq!(sync_once(&replica, &seed).await.0, 1);
    assert_eq!(sync_once(&replica, &seed).await.0, 0);
    let entry = replica
        .authenticated_store(PayloadType::Offer)
        .await
        .unwrap()
        .get_entry(&key)
        .unwrap();
    assert_eq!(entry.map(|e| e.sequence_number()), Some(3));
    assert_eq!(offer_count(&replica), 1);

    // Seed and replica now report the same filter
    assert_eq!(seed.data_filter().unwrap(), replica.data_filter().unwrap());
}

#[tokio::test]
async fn test_small_budget_needs_several_rounds() {
    let mut config = Config::default();
    config.inventory.max_size_kb = 1;
    let seed = node_with(config.clone());
    let fresh = node_with(config);
    let kp = keypair(1);

    for i in 0..20 {
        seed.add_data(AddDataRequest::Authenticated(offer_request(&kp, &format!("o{}", i), 1)))
            .await
            .unwrap();
    }

    let (first, more) = sync_once(&fresh, &seed).await;
    assert!(more);
    assert!(first > 0 && first < 20);

    let mut rounds = 1;
    loop {
        let (_, more) = sync_once(&fresh, &seed).await;
        rounds += 1;
        if !more || rounds > 20 {
            break;
        }
    }
    assert_eq!(offer_count(&fresh), 20);
}

#[tokio::test]
async fn test_inventory_of_unopened_store_is_empty() {
    let seed = node();
    let inventory = seed
        .get_inventory_from_store(&DataFilter::new(), "ChatMessage")
        .unwrap();
    assert!(inventory.is_empty());
    assert!(!inventory.max_size_reached);
}

mod proptests {
    use super::*;
    use crate::core_store::payload::OFFER_META;
    use crate::core_store::tests::authenticated_service;
    use proptest::prelude::*;

    fn candidates(count: usize) -> Vec<InventoryCandidate> {
        (0..count)
            .map(|i| {
                let request = proof_of_burn_request(&format!("tx-{}", i));
                let key = request.key().unwrap();
                InventoryCandidate::from_entry(&key, &request, &PROOF_OF_BURN_META)
            })
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        // Merging two disjoint filters covers exactly their union
        #[test]
        fn prop_filter_union_loses_nothing(
            picks in prop::collection::vec(0u8..3, 1..30),
        ) {
            let all = candidates(picks.len());
            let mut a = Vec::new();
            let mut b = Vec::new();
            for (candidate, pick) in all.iter().zip(&picks) {
                match pick {
                    0 => a.push(candidate.filter_entry),
                    1 => b.push(candidate.filter_entry),
                    _ => {}
                }
            }
            let known = a.len() + b.len();

            let mut union = DataFilter::from_entries(a);
            for entry in b {
                union.insert(entry);
            }
            prop_assert_eq!(union.len(), known);

            let inventory = compute_inventory(all, &union, u64::MAX).unwrap();
            prop_assert_eq!(inventory.num_filtered_out, known);
            prop_assert_eq!(inventory.len(), picks.len() - known);
        }

        // A filter entry at or above the stored version hides it
        #[test]
        fn prop_filter_version_threshold(stored in 0u32..1000, known in 0u32..1000) {
            let key = StorageKey::hash(&stored.to_be_bytes());
            let filter = DataFilter::from_entries([FilterEntry::new(key, known)]);
            prop_assert_eq!(filter.knows(&FilterEntry::new(key, stored)), known >= stored);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        // The stored sequence number never decreases and only strictly higher ones are accepted
        #[test]
        fn prop_sequence_numbers_are_monotonic(seqs in prop::collection::vec(0u32..20, 1..12)) {
            let service = authenticated_service(OFFER_META);
            let kp = keypair(3);
            let now = now_millis();
            let mut highest: Option<u32> = None;

            for (i, seq) in seqs.iter().enumerate() {
                // Distinct content per step so no request is an exact duplicate
                let payload = TestOfferBuilder::new(&kp, "o1").price(i as u64 + 1).build();
                let request = signed_request_at(&kp, payload, *seq, now);
                let outcome = service.add_at(request.clone(), now).unwrap();

                let expect_accept = highest.map_or(true, |h| *seq > h);
                prop_assert_eq!(outcome.is_accepted(), expect_accept);
                if expect_accept {
                    highest = Some(*seq);
                }
                let stored = service.get_entry(&request.key()).unwrap().map(|e| e.sequence_number());
                prop_assert_eq!(stored, highest);
            }
        }
    }
}
