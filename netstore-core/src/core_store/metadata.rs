/*
    metadata.rs - Per payload type storage policy

    Every payload type carries one constant MetaData value. It decides:
    - how long an entry lives (ttl)
    - how large a serialized entry may be
    - how many entries one store keeps
    - where the store is routed and persisted (type id)
    - in which order inventory responses are filled (priority)
*/

use std::time::Duration;

pub const MINUTE_MS: u64 = 60 * 1000;
pub const HOUR_MS: u64 = 60 * MINUTE_MS;
pub const DAY_MS: u64 = 24 * HOUR_MS;

pub const TTL_10_DAYS: u64 = 10 * DAY_MS;
pub const TTL_15_DAYS: u64 = 15 * DAY_MS;
pub const TTL_100_DAYS: u64 = 100 * DAY_MS;

pub const MAX_MAP_SIZE_100: usize = 100;
pub const MAX_MAP_SIZE_1_000: usize = 1_000;
pub const MAX_MAP_SIZE_10_000: usize = 10_000;

pub const LOW_PRIORITY: i32 = -1;
pub const DEFAULT_PRIORITY: i32 = 0;
pub const HIGH_PRIORITY: i32 = 1;
pub const HIGHEST_PRIORITY: i32 = 2;

/// Storage policy shared by all instances of one payload type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaData {
    /// Time to live in milliseconds, measured from the entry's creation date
    pub ttl_ms: u64,

    /// Maximum serialized payload size in bytes
    pub max_size_bytes: usize,

    /// Maximum number of entries (tombstones included) in one store
    pub max_map_size: usize,

    /// Inventory ordering, higher goes first
    pub priority: i32,

    /// Stable identifier used for routing and as persisted file name
    pub type_id: &'static str,
}

impl MetaData {
    pub const fn new(
        type_id: &'static str,
        ttl_ms: u64,
        max_size_bytes: usize,
        max_map_size: usize,
        priority: i32,
    ) -> Self {
        MetaData {
            ttl_ms,
            max_size_bytes,
            max_map_size,
            priority,
            type_id,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Whether an entry created at `created_ms` is past its ttl at `now_ms`
    pub fn is_expired(&self, created_ms: u64, now_ms: u64) -> bool {
        now_ms.saturating_sub(created_ms) > self.ttl_ms
    }

    /// Same policy with a different capacity
    pub fn with_max_map_size(mut self, max_map_size: usize) -> Self {
        self.max_map_size = max_map_size;
        self
    }

    /// Same policy with a different ttl
    pub fn with_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }
}

/// Current wall clock time in milliseconds since the unix epoch
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
