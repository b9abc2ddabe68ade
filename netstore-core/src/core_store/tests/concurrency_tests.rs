/*
    Concurrent admission

    The stateful checks run under the store's write lock, so racing requests
    for one slot resolve as if they arrived one after another.
*/

use std::sync::Arc;
use std::thread;

use super::{append_only_service, authenticated_service};
use crate::core_store::metadata::now_millis;
use crate::core_store::payload::{OFFER_META, PROOF_OF_BURN_META};
use crate::core_store::result::Rejection;
use crate::core_store::store::StoreEntry;
use crate::test_utils::fixtures::{keypair, offer, proof_of_burn_request, signed_request_at, TestOfferBuilder};

#[test]
fn test_same_sequence_number_accepted_once() {
    let service = authenticated_service(OFFER_META);
    let kp = keypair(1);
    let now = now_millis();

    // Different content, same slot and sequence number
    let requests: Vec<_> = (0..8u64)
        .map(|i| signed_request_at(&kp, TestOfferBuilder::new(&kp, "o1").price(i + 1).build(), 1, now))
        .collect();

    let outcomes: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = requests
            .into_iter()
            .map(|request| {
                let service = &service;
                scope.spawn(move || service.add_at(request, now).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let accepted = outcomes.iter().filter(|o| o.is_accepted()).count();
    assert_eq!(accepted, 1);
    assert!(outcomes
        .iter()
        .filter_map(|o| o.rejection())
        .all(|r| r == Rejection::SequenceNrInvalid));
    assert_eq!(service.len().unwrap(), 1);
}

#[test]
fn test_highest_sequence_number_wins() {
    let service = Arc::new(authenticated_service(OFFER_META));
    let kp = keypair(1);
    let now = now_millis();
    let key = signed_request_at(&kp, offer(&kp, "o1"), 1, now).key();

    let handles: Vec<_> = (1..=16u32)
        .map(|seq| {
            let service = service.clone();
            let request = signed_request_at(&kp, offer(&kp, "o1"), seq, now);
            thread::spawn(move || service.add_at(request, now).unwrap())
        })
        .collect();
    for handle in handles {
        let _ = handle.join().unwrap();
    }

    let stored = service.get_entry(&key).unwrap().map(|e| e.sequence_number());
    assert_eq!(stored, Some(16));
}

#[test]
fn test_capacity_holds_under_contention() {
    let service = append_only_service(PROOF_OF_BURN_META.with_max_map_size(10));
    let now = now_millis();

    let outcomes: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let service = &service;
                scope.spawn(move || {
                    (0..10)
                        .map(|i| {
                            let request = proof_of_burn_request(&format!("tx-{}-{}", worker, i));
                            service.add_at(request, now).unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    let accepted = outcomes.iter().filter(|o| o.is_accepted()).count();
    assert_eq!(accepted, 10);
    assert_eq!(service.len().unwrap(), 10);
    assert!(outcomes
        .iter()
        .filter_map(|o| o.rejection())
        .all(|r| r == Rejection::MaxMapSizeReached));
}
