/*
    Store subsystem - Persistence layer
*/

pub mod blob;
pub mod data_store;
pub mod errors;

pub use blob::{BlobStore, FileBlobStore, MemoryBlobStore};
pub use data_store::{prune_on_load, DataStore, LoadReport, StoreEntry};
pub use errors::*;
