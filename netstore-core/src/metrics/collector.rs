//! Process local storage counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core_store::result::Rejection;

/// Totals mirrored from the metrics facade, readable without an exporter
#[derive(Debug, Default)]
pub struct MetricsCollector {
    accepted: AtomicU64,
    rejected: AtomicU64,
    severe: AtomicU64,
    pruned_expired: AtomicU64,
    pruned_capacity: AtomicU64,
    persist_writes: AtomicU64,
    persist_failures: AtomicU64,
    inventory_requests: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub accepted: u64,
    pub rejected: u64,
    pub severe: u64,
    pub pruned_expired: u64,
    pub pruned_capacity: u64,
    pub persist_writes: u64,
    pub persist_failures: u64,
    pub inventory_requests: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejected(&self, reason: Rejection) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        if reason.is_severe() {
            self.severe.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn add_pruned_expired(&self, count: u64) {
        self.pruned_expired.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_pruned_capacity(&self, count: u64) {
        self.pruned_capacity.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_persist_writes(&self) {
        self.persist_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_persist_failures(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_inventory_requests(&self) {
        self.inventory_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            severe: self.severe.load(Ordering::Relaxed),
            pruned_expired: self.pruned_expired.load(Ordering::Relaxed),
            pruned_capacity: self.pruned_capacity.load(Ordering::Relaxed),
            persist_writes: self.persist_writes.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            inventory_requests: self.inventory_requests.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severe_rejections_counted_twice() {
        let collector = MetricsCollector::new();
        collector.inc_accepted();
        collector.inc_rejected(Rejection::SignatureInvalid);
        collector.inc_rejected(Rejection::Expired);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.accepted, 1);
        assert_eq!(snapshot.rejected, 2);
        assert_eq!(snapshot.severe, 1);
    }
}
