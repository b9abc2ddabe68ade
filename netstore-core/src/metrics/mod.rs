//! Metrics for the storage layer
//!
//! Recorded through the `metrics` facade. No exporter is installed here; the
//! embedding process decides where the numbers go. A [`MetricsCollector`]
//! keeps process local totals for stats output.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Instant;

mod collector;

pub use collector::{MetricsCollector, MetricsSnapshot};

pub const ADD_ACCEPTED: &str = "store.add.accepted";
pub const ADD_REJECTED: &str = "store.add.rejected";
pub const REMOVE_ACCEPTED: &str = "store.remove.accepted";
pub const REMOVE_REJECTED: &str = "store.remove.rejected";
pub const REFRESH_ACCEPTED: &str = "store.refresh.accepted";
pub const REFRESH_REJECTED: &str = "store.refresh.rejected";
pub const SEVERE_FAILURES: &str = "store.severe_failures";
pub const PRUNED_EXPIRED: &str = "store.pruned.expired";
pub const PRUNED_CAPACITY: &str = "store.pruned.capacity";
pub const PERSIST_WRITES: &str = "store.persist.writes";
pub const PERSIST_FAILURES: &str = "store.persist.failures";
pub const PERSIST_DURATION: &str = "store.persist.duration_ms";
pub const INVENTORY_REQUESTS: &str = "inventory.requests";
pub const STORE_ENTRIES: &str = "store.entries";

/// Describe all storage metrics
pub fn init_metrics() {
    describe_counter!(ADD_ACCEPTED, "Add requests that changed a store");
    describe_counter!(ADD_REJECTED, "Add requests rejected by admission");
    describe_counter!(REMOVE_ACCEPTED, "Remove requests that removed a live entry");
    describe_counter!(REMOVE_REJECTED, "Remove requests rejected by admission");
    describe_counter!(REFRESH_ACCEPTED, "Refresh requests that renewed an entry");
    describe_counter!(REFRESH_REJECTED, "Refresh requests rejected by admission");
    describe_counter!(SEVERE_FAILURES, "Rejections caused by authenticity violations");
    describe_counter!(PRUNED_EXPIRED, "Entries removed after their ttl elapsed");
    describe_counter!(PRUNED_CAPACITY, "Entries dropped at load to respect store capacity");
    describe_counter!(PERSIST_WRITES, "Store snapshots written to disk");
    describe_counter!(PERSIST_FAILURES, "Store snapshots that failed to write");
    describe_histogram!(PERSIST_DURATION, "Duration of one store snapshot write in milliseconds");
    describe_counter!(INVENTORY_REQUESTS, "Inventories computed for peers");
    describe_gauge!(STORE_ENTRIES, "Entries held by a store, tombstones included");
}

/// Increment a counter labelled with the store name
pub fn record_store_counter(name: &'static str, store: &str, value: u64) {
    counter!(name, "store" => store.to_string()).increment(value);
}

/// Set the entry gauge of a store
pub fn record_store_entries(store: &str, entries: usize) {
    gauge!(STORE_ENTRIES, "store" => store.to_string()).set(entries as f64);
}

/// Record a counter metric
pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Stop the timer and record the duration
    pub fn stop(self) {
        let duration = self.start.elapsed();
        histogram!(self.name).record(duration.as_secs_f64() * 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_init() {
        // No recorder installed, calls are no-ops
        init_metrics();
        record_store_counter(ADD_ACCEPTED, "authenticated/Offer", 1);
        record_store_entries("authenticated/Offer", 3);
        record_counter(INVENTORY_REQUESTS, 1);
    }

    #[test]
    fn test_timer() {
        let timer = Timer::new(PERSIST_DURATION);
        std::thread::sleep(std::time::Duration::from_millis(5));
        timer.stop();
    }
}
