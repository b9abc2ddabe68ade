/*
    blob.rs - Keyed blob persistence

    One blob per store, addressed by store family and payload type id.
    The file backend writes atomically (temp file, then rename) under
    <data_dir>/db/network/<family>/<type_id>.bin.
*/

use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use super::errors::{handle_poison, StoreError, StoreResult};
use crate::core_store::payload::StoreFamily;

const BLOB_EXTENSION: &str = "bin";

/// Load/save capability for persisted store snapshots
pub trait BlobStore: Send + Sync + 'static {
    fn read(&self, family: StoreFamily, type_id: &str) -> StoreResult<Option<Vec<u8>>>;

    fn write(&self, family: StoreFamily, type_id: &str, bytes: &[u8]) -> StoreResult<()>;

    fn exists(&self, family: StoreFamily, type_id: &str) -> bool;
}

/// Blobs as files below a network database root
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Open the network database below `data_dir`
    pub fn new(data_dir: impl AsRef<Path>) -> StoreResult<Self> {
        let root = data_dir.as_ref().join("db").join("network");
        create_dir_all(&root)?;
        Ok(FileBlobStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, family: StoreFamily, type_id: &str) -> PathBuf {
        self.root
            .join(family.dir_name())
            .join(format!("{}.{}", type_id, BLOB_EXTENSION))
    }
}

impl BlobStore for FileBlobStore {
    fn read(&self, family: StoreFamily, type_id: &str) -> StoreResult<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(family, type_id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, family: StoreFamily, type_id: &str, bytes: &[u8]) -> StoreResult<()> {
        let final_path = self.path_for(family, type_id);
        if let Some(parent) = final_path.parent() {
            create_dir_all(parent)?;
        }

        // Write to temporary file first
        let temp_path = final_path.with_extension("tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);

        // Atomically rename to final name
        std::fs::rename(temp_path, final_path)?;
        Ok(())
    }

    fn exists(&self, family: StoreFamily, type_id: &str) -> bool {
        self.path_for(family, type_id).is_file()
    }
}

/// In-memory blobs, used by tests and ephemeral nodes
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<(StoreFamily, String), Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail, simulating a broken disk
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn read(&self, family: StoreFamily, type_id: &str) -> StoreResult<Option<Vec<u8>>> {
        let blobs = self.blobs.read().map_err(handle_poison)?;
        Ok(blobs.get(&(family, type_id.to_string())).cloned())
    }

    fn write(&self, family: StoreFamily, type_id: &str, bytes: &[u8]) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Storage("simulated write failure".to_string()));
        }
        let mut blobs = self.blobs.write().map_err(handle_poison)?;
        blobs.insert((family, type_id.to_string()), bytes.to_vec());
        Ok(())
    }

    fn exists(&self, family: StoreFamily, type_id: &str) -> bool {
        self.blobs
            .read()
            .map(|b| b.contains_key(&(family, type_id.to_string())))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_blob_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();

        assert!(!store.exists(StoreFamily::Authenticated, "Offer"));
        assert_eq!(store.read(StoreFamily::Authenticated, "Offer").unwrap(), None);

        store.write(StoreFamily::Authenticated, "Offer", b"snapshot").unwrap();
        assert!(store.exists(StoreFamily::Authenticated, "Offer"));
        assert_eq!(
            store.read(StoreFamily::Authenticated, "Offer").unwrap(),
            Some(b"snapshot".to_vec())
        );
    }

    #[test]
    fn test_file_layout() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();
        store.write(StoreFamily::Mailbox, "MailboxMessage", b"x").unwrap();

        let expected = dir
            .path()
            .join("db")
            .join("network")
            .join("mailbox")
            .join("MailboxMessage.bin");
        assert!(expected.is_file());
        assert!(!expected.with_extension("tmp").exists());
    }

    #[test]
    fn test_overwrite_replaces_content() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();
        store.write(StoreFamily::AppendOnly, "ProofOfBurn", b"first").unwrap();
        store.write(StoreFamily::AppendOnly, "ProofOfBurn", b"second").unwrap();
        assert_eq!(
            store.read(StoreFamily::AppendOnly, "ProofOfBurn").unwrap(),
            Some(b"second".to_vec())
        );
    }

    #[test]
    fn test_memory_blob_failure_switch() {
        let store = MemoryBlobStore::new();
        store.write(StoreFamily::Mailbox, "MailboxMessage", b"ok").unwrap();

        store.set_fail_writes(true);
        assert!(store.write(StoreFamily::Mailbox, "MailboxMessage", b"lost").is_err());
        assert_eq!(
            store.read(StoreFamily::Mailbox, "MailboxMessage").unwrap(),
            Some(b"ok".to_vec())
        );
        assert_eq!(store.len(), 1);
    }
}
