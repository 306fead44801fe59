// Common test utilities for collection integration tests

use settingsdb::{Collection, Config, StorageConfig};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// Test fixture owning a temporary directory for the database file and
/// snapshots
pub struct CollectionFixture {
    pub temp_dir: TempDir,
}

impl CollectionFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self { temp_dir }
    }

    #[allow(dead_code)]
    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Config rooted in the temp dir, giving up on the file lock quickly
    pub fn config(&self) -> Config {
        Config::in_dir(self.dir()).with_storage(
            StorageConfig::new(self.dir())
                .with_lock_timeout(Duration::from_millis(500))
                .with_backoff(Duration::from_millis(5), Duration::from_millis(50)),
        )
    }

    pub fn open(&self, name: &str) -> Collection {
        Collection::open(name, self.config()).expect("Failed to open collection")
    }
}

impl Default for CollectionFixture {
    fn default() -> Self {
        Self::new()
    }
}
