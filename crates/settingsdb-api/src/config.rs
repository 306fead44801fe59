//! Collection configuration.

use settingsdb_snapshot::SnapshotConfig;
use settingsdb_storage::StorageConfig;
use std::path::Path;

/// Where a collection keeps its database file and snapshots.
///
/// The default places `Data.db` and `data_<name>.json` files in the current
/// directory.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Backing database settings
    pub storage: StorageConfig,
    /// Snapshot file settings
    pub snapshot: SnapshotConfig,
}

impl Config {
    /// Place both the database file and snapshots under `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            storage: StorageConfig::new(dir),
            snapshot: SnapshotConfig::new(dir),
        }
    }

    /// Replace the storage settings
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// Replace the snapshot settings
    pub fn with_snapshot(mut self, snapshot: SnapshotConfig) -> Self {
        self.snapshot = snapshot;
        self
    }
}
