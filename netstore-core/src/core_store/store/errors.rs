/*
    errors.rs - Error types for the store subsystem

    Infrastructure faults only. Admission decisions are not errors and are
    reported through DataStorageResult instead.
*/

use thiserror::Error;

/// Errors that can occur in the store subsystem
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage I/O error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Persisted blob failed its integrity check
    #[error("Corrupted data: {0}")]
    CorruptedData(String),

    /// No store is registered under the given type id
    #[error("Unknown store: {0}")]
    UnknownStore(String),

    /// Malformed key material
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Settings the store cannot run with
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Helper to convert poison errors into StoreError
pub(crate) fn handle_poison<T>(_err: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Storage("Lock poisoned: a thread panicked while holding the lock".to_string())
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Storage(err.to_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<crate::config::ConfigError> for StoreError {
    fn from(err: crate::config::ConfigError) -> Self {
        StoreError::InvalidConfig(err.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Internal(format!("background task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::UnknownStore("Widget".to_string());
        assert_eq!(err.to_string(), "Unknown store: Widget");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read only");
        let err: StoreError = io.into();
        assert!(matches!(err, StoreError::Storage(_)));
        assert!(err.to_string().contains("read only"));
    }
}
