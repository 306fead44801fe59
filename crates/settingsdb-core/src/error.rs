//! Error types for SettingsDB.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The main error type for SettingsDB operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A lock was poisoned (internal error)
    #[error("Lock poisoned")]
    LockPoisoned,

    /// Exclusive access to the backing file could not be acquired in time
    #[error("Timed out after {waited:?} waiting for exclusive access to {}", .path.display())]
    LockTimeout {
        /// Path of the database file
        path: PathBuf,
        /// How long the open was retried
        waited: Duration,
    },

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Storage engine error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Transaction could not be started or committed
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Input rejected by validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Data on disk does not match its recorded checksum
    #[error("Corruption detected: {0}")]
    Corruption(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for SettingsDB operations.
pub type Result<T> = std::result::Result<T, Error>;
