//! Test utilities for netstore
//!
//! Deterministic key pairs, payload and signed request builders, outcome
//! assertions and a recording listener, shared by unit tests, integration
//! tests and benches.

pub mod assertions;
pub mod fixtures;
pub mod listener;

pub use assertions::*;
pub use fixtures::*;
pub use listener::RecordingListener;
