//! Assertions over admission outcomes

use std::fmt::Debug;

use crate::core_store::result::{DataStorageResult, Rejection};

/// Assert that a request was accepted and return its payload
#[track_caller]
pub fn assert_accepted<T: Debug>(outcome: DataStorageResult<T>) -> T {
    match outcome {
        DataStorageResult::Accepted(value) => value,
        DataStorageResult::Rejected(reason) => panic!("Expected Accepted, got Rejected({})", reason),
    }
}

/// Assert that a request was rejected for `expected`
#[track_caller]
pub fn assert_rejected<T: Debug>(outcome: DataStorageResult<T>, expected: Rejection) {
    match outcome {
        DataStorageResult::Rejected(reason) => assert_eq!(
            reason, expected,
            "Expected Rejected({}), got Rejected({})",
            expected, reason
        ),
        DataStorageResult::Accepted(value) => {
            panic!("Expected Rejected({}), got Accepted({:?})", expected, value)
        }
    }
}

/// Assert that a Result is Ok and return the value
#[track_caller]
pub fn assert_ok<T, E: Debug>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => panic!("Expected Ok, got Err: {:?}", e),
    }
}
