//! netstore - authenticated, replicated data store for peer to peer overlays
//!
//! Each node keeps per payload type stores, admits or rejects signed updates
//! from peers without a central authority, bounds storage by ttl and
//! capacity, and reconciles with peers through filter and inventory exchange.

pub mod config;
pub mod core_identity;
pub mod core_store;
pub mod logging;
pub mod metrics;
pub mod scheduler;
pub mod shutdown;
pub mod test_utils;

pub use config::{Config, ConfigError};
pub use core_store::{Rejection, StorageService, StoreError, StoreResult};
pub use logging::{init_logging, LogLevel};
