//! # SettingsDB Storage
//!
//! Transactional bucket storage for SettingsDB, built on the
//! [`redb`](https://docs.rs/redb) embedded key-value engine.
//!
//! ## ⚠️ Internal Implementation Detail
//!
//! **This crate is an internal implementation detail of SettingsDB.**
//!
//! Users should depend on the main [`settingsdb`](https://crates.io/crates/settingsdb)
//! crate instead, which provides the stable public API.
//!
//! ---
//!
//! A [`DataBase`] is a short-lived session over one database file. Opening it
//! takes the engine's exclusive file lock; dropping (or [`DataBase::close`])
//! releases it. Each named [`Bucket`] maps to one engine table.
//!
//! ```text
//! DataBase::open ─┬─ bucket(name) ── add / print / get / update / delete
//!                 ├─ print_all(name)
//!                 └─ delete(name)
//! ```
//!
//! Every mutating call runs in exactly one write transaction that is
//! committed explicitly. A transaction dropped before commit is aborted.

use redb::{ReadableTable, TableDefinition, TableError, TableHandle, WriteTransaction};
use settingsdb_core::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

pub mod bucket;

pub use bucket::{Bucket, BucketWriter};

/// Table holding the per-bucket write sequence counters
pub const SEQUENCE_TABLE: &str = "settingsdb.sequences";

/// Default database name; the file is `<name>.db`
pub const DEFAULT_DB_NAME: &str = "Data";

/// Default wait for the exclusive file lock
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new(SEQUENCE_TABLE);

/// Table definition for a bucket
pub(crate) fn definition(name: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(name)
}

pub(crate) fn storage_error(err: impl std::fmt::Display) -> Error {
    Error::Storage(err.to_string())
}

pub(crate) fn transaction_error(err: impl std::fmt::Display) -> Error {
    Error::Transaction(err.to_string())
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding the database file
    pub dir: PathBuf,
    /// Database name, without the `.db` extension
    pub db_name: String,
    /// Maximum time to wait for the exclusive file lock
    pub lock_timeout: Duration,
    /// First delay between lock attempts; doubles after each attempt
    pub retry_backoff: Duration,
    /// Upper bound for the delay between lock attempts
    pub max_backoff: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            db_name: DEFAULT_DB_NAME.to_string(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            retry_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(500),
        }
    }
}

impl StorageConfig {
    /// Config with the database file placed in `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }

    /// Set the database name
    pub fn with_db_name(mut self, name: impl Into<String>) -> Self {
        self.db_name = name.into();
        self
    }

    /// Set the lock wait timeout
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Set the initial and maximum retry delays
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.retry_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Full path of the database file
    pub fn db_path(&self) -> PathBuf {
        self.dir.join(format!("{}.db", self.db_name))
    }
}

/// An open session over one database file.
///
/// Holds the engine's exclusive file lock for as long as it lives.
pub struct DataBase {
    db: redb::Database,
    path: PathBuf,
}

impl DataBase {
    /// Open (creating if needed) the database described by `config`.
    ///
    /// If another handle holds the file lock, the open is retried with
    /// exponential backoff until `config.lock_timeout` has elapsed, after
    /// which [`Error::LockTimeout`] is returned.
    pub fn open(config: &StorageConfig) -> Result<Self> {
        let path = config.db_path();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let started = Instant::now();
        let mut backoff = config.retry_backoff;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match redb::Database::create(&path) {
                Ok(db) => {
                    debug!(path = %path.display(), attempts, "database opened");
                    return Ok(Self { db, path });
                }
                Err(redb::DatabaseError::DatabaseAlreadyOpen) => {
                    let waited = started.elapsed();
                    if waited >= config.lock_timeout {
                        warn!(path = %path.display(), attempts, ?waited, "gave up waiting for database lock");
                        return Err(Error::LockTimeout { path, waited });
                    }
                    let delay = backoff.min(config.lock_timeout - waited);
                    trace!(path = %path.display(), ?delay, "database locked, retrying");
                    std::thread::sleep(delay);
                    backoff = (backoff * 2).min(config.max_backoff);
                }
                Err(err) => return Err(storage_error(err)),
            }
        }
    }

    /// Close the database, releasing the file lock
    pub fn close(self) -> Result<()> {
        debug!(path = %self.path.display(), "database closed");
        drop(self.db);
        Ok(())
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return a handle to bucket `name`, creating it if absent.
    pub fn bucket(&self, name: &str) -> Result<Bucket<'_>> {
        validate_bucket_name(name)?;
        let txn = self.begin_write()?;
        txn.open_table(definition(name)).map_err(storage_error)?;
        commit(txn, name)?;
        Ok(Bucket::new(self, name))
    }

    /// Return a handle to bucket `name` without touching the file.
    ///
    /// Reads through the handle see a missing bucket as empty, and the first
    /// [`Bucket::update`] creates it inside that write transaction.
    pub fn handle(&self, name: &str) -> Result<Bucket<'_>> {
        validate_bucket_name(name)?;
        Ok(Bucket::new(self, name))
    }

    /// Delete bucket `name` and its sequence counter.
    ///
    /// Returns `true` if the bucket existed.
    pub fn delete(&self, name: &str) -> Result<bool> {
        validate_bucket_name(name)?;
        let txn = self.begin_write()?;
        let existed = txn.delete_table(definition(name)).map_err(storage_error)?;
        {
            let mut sequences = txn.open_table(SEQUENCES).map_err(storage_error)?;
            sequences.remove(name).map_err(storage_error)?;
        }
        commit(txn, name)?;
        debug!(bucket = name, existed, "bucket deleted");
        Ok(existed)
    }

    /// Dump every key/value pair of bucket `name`. A missing bucket is empty.
    pub fn print_all(&self, name: &str) -> Result<BTreeMap<String, Vec<u8>>> {
        self.scan_prefix(name, "")
    }

    /// Names of all buckets in the file
    pub fn buckets(&self) -> Result<Vec<String>> {
        let txn = self.db.begin_read().map_err(transaction_error)?;
        let names = txn
            .list_tables()
            .map_err(storage_error)?
            .map(|handle| handle.name().to_string())
            .filter(|name| name != SEQUENCE_TABLE)
            .collect();
        Ok(names)
    }

    pub(crate) fn begin_write(&self) -> Result<WriteTransaction> {
        self.db.begin_write().map_err(transaction_error)
    }

    /// Point read; `None` when the key or the bucket is missing.
    pub(crate) fn read_key(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(transaction_error)?;
        let table = match txn.open_table(definition(bucket)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(err) => return Err(storage_error(err)),
        };
        let value = table
            .get(key)
            .map_err(storage_error)?
            .map(|guard| guard.value().to_vec());
        Ok(value)
    }

    /// Ordered scan of every key starting with `prefix`.
    pub(crate) fn scan_prefix(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>> {
        let txn = self.db.begin_read().map_err(transaction_error)?;
        let table = match txn.open_table(definition(bucket)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(BTreeMap::new()),
            Err(err) => return Err(storage_error(err)),
        };

        let mut entries = BTreeMap::new();
        for entry in table.range(prefix..).map_err(storage_error)? {
            let (key, value) = entry.map_err(storage_error)?;
            let key = key.value();
            // Keys are sorted, so the first miss ends the prefix run
            if !key.starts_with(prefix) {
                break;
            }
            entries.insert(key.to_string(), value.value().to_vec());
        }
        Ok(entries)
    }
}

/// Commit `txn`. A failed commit aborts the calling operation.
pub(crate) fn commit(txn: WriteTransaction, bucket: &str) -> Result<()> {
    txn.commit().map_err(|err| {
        error!(bucket, error = %err, "commit failed");
        transaction_error(err)
    })?;
    trace!(bucket, "transaction committed");
    Ok(())
}

fn validate_bucket_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidInput("Bucket name cannot be empty".to_string()));
    }
    if name == SEQUENCE_TABLE {
        return Err(Error::InvalidInput(format!(
            "Bucket name '{}' is reserved",
            SEQUENCE_TABLE
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.db_name, "Data");
        assert_eq!(config.lock_timeout, Duration::from_secs(10));
        assert_eq!(config.db_path(), PathBuf::from("./Data.db"));
    }

    #[test]
    fn test_config_builders() {
        let config = StorageConfig::new("/var/lib/app")
            .with_db_name("settings")
            .with_lock_timeout(Duration::from_millis(200))
            .with_backoff(Duration::from_millis(1), Duration::from_millis(20));
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/app/settings.db"));
        assert_eq!(config.lock_timeout, Duration::from_millis(200));
        assert_eq!(config.max_backoff, Duration::from_millis(20));
    }

    #[test]
    fn test_open_creates_file() {
        let dir = tempdir().unwrap();
        let config = StorageConfig::new(dir.path().join("nested"));
        let db = DataBase::open(&config).unwrap();

        assert!(config.db_path().exists());
        assert_eq!(db.path(), config.db_path());
        db.close().unwrap();
    }

    #[test]
    fn test_lock_timeout() {
        let dir = tempdir().unwrap();
        let config = StorageConfig::new(dir.path())
            .with_lock_timeout(Duration::from_millis(100))
            .with_backoff(Duration::from_millis(5), Duration::from_millis(20));

        let _holder = DataBase::open(&config).unwrap();
        let started = Instant::now();
        let result = DataBase::open(&config);

        assert!(matches!(result, Err(Error::LockTimeout { .. })));
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_open_waits_for_release() {
        let dir = tempdir().unwrap();
        let config = StorageConfig::new(dir.path())
            .with_lock_timeout(Duration::from_secs(5))
            .with_backoff(Duration::from_millis(5), Duration::from_millis(20));

        let holder = DataBase::open(&config).unwrap();
        let releaser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            holder.close().unwrap();
        });

        let db = DataBase::open(&config).unwrap();
        releaser.join().unwrap();
        db.close().unwrap();
    }

    #[test]
    fn test_bucket_lifecycle() {
        let dir = tempdir().unwrap();
        let db = DataBase::open(&StorageConfig::new(dir.path())).unwrap();

        db.bucket("themes").unwrap();
        db.bucket("fonts").unwrap();
        let mut names = db.buckets().unwrap();
        names.sort();
        assert_eq!(names, vec!["fonts".to_string(), "themes".to_string()]);

        assert!(db.delete("themes").unwrap());
        assert!(!db.delete("themes").unwrap());
        assert_eq!(db.buckets().unwrap(), vec!["fonts".to_string()]);
    }

    #[test]
    fn test_reserved_bucket_names() {
        let dir = tempdir().unwrap();
        let db = DataBase::open(&StorageConfig::new(dir.path())).unwrap();

        assert!(matches!(db.bucket(""), Err(Error::InvalidInput(_))));
        assert!(matches!(db.bucket(SEQUENCE_TABLE), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_handle_creates_bucket_on_first_write() {
        let dir = tempdir().unwrap();
        let db = DataBase::open(&StorageConfig::new(dir.path())).unwrap();

        let bucket = db.handle("lazy").unwrap();
        assert_eq!(bucket.print("k").unwrap(), None);
        assert!(db.buckets().unwrap().is_empty());

        bucket.update(|w| w.put("k", b"v")).unwrap();
        assert_eq!(db.buckets().unwrap(), vec!["lazy".to_string()]);
        assert_eq!(bucket.print("k").unwrap(), Some(b"v".to_vec()));

        assert!(db.handle(SEQUENCE_TABLE).is_err());
    }

    #[test]
    fn test_print_all_missing_bucket() {
        let dir = tempdir().unwrap();
        let db = DataBase::open(&StorageConfig::new(dir.path())).unwrap();

        assert!(db.print_all("nothing").unwrap().is_empty());
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = tempdir().unwrap();
        let config = StorageConfig::new(dir.path());

        {
            let db = DataBase::open(&config).unwrap();
            db.bucket("themes").unwrap().add("mode", "dark", false).unwrap();
            db.close().unwrap();
        }

        let db = DataBase::open(&config).unwrap();
        let all = db.print_all("themes").unwrap();
        assert_eq!(all.get("mode1").map(Vec::as_slice), Some(&b"dark"[..]));
    }
}
