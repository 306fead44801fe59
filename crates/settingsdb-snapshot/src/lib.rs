//! # SettingsDB Snapshot Manager
//!
//! Flat-file snapshots for SettingsDB collections.
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
//! A snapshot is the pretty-printed JSON encoding of a value, written to
//! `<dir>/<prefix><name>.<extension>` (by default `./data_<name>.json`).
//! Snapshots are independent of the bucket storage: they can be taken,
//! copied and restored without opening the database.
//!
//! ## Usage
//!
//! ```ignore
//! use settingsdb_snapshot::{SnapshotConfig, SnapshotManager};
//!
//! let manager = SnapshotManager::new(SnapshotConfig::new("/path/to/snapshots"));
//! let meta = manager.save("themes", &collection_state)?;
//! manager.verify(&meta)?;
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use settingsdb_core::{Error, Result};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Snapshot metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Name the snapshot was saved under
    pub name: String,
    /// File the snapshot was written to
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Checksum (CRC32) of the file contents
    pub checksum: u32,
    /// Timestamp when snapshot was created (Unix milliseconds)
    pub timestamp: u64,
}

/// Snapshot configuration
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Directory snapshot files are written to and read from
    pub dir: PathBuf,
    /// File name prefix
    pub prefix: String,
    /// File extension, without the dot
    pub extension: String,
    /// Re-read and verify the checksum after each write
    pub verify_checksums: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            prefix: "data_".to_string(),
            extension: "json".to_string(),
            verify_checksums: true,
        }
    }
}

impl SnapshotConfig {
    /// Config with snapshots placed in `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }
}

/// Snapshot manager
#[derive(Debug, Clone, Default)]
pub struct SnapshotManager {
    config: SnapshotConfig,
}

impl SnapshotManager {
    /// Create a snapshot manager with the given configuration
    pub fn new(config: SnapshotConfig) -> Self {
        Self { config }
    }

    /// Configuration in use
    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// File a snapshot named `name` lives in
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.config.dir.join(format!(
            "{}{}.{}",
            self.config.prefix, name, self.config.extension
        ))
    }

    /// Encode `value` as indented JSON text
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(value)?)
    }

    /// Write `value` as snapshot `name`, replacing any previous one.
    pub fn save<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<SnapshotMeta> {
        let encoded = serde_json::to_vec_pretty(value)?;
        fs::create_dir_all(&self.config.dir)?;

        let path = self.path_for(name);
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&encoded)?;
        writer.flush()?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        let meta = SnapshotMeta {
            name: name.to_string(),
            path,
            size: encoded.len() as u64,
            checksum: crc32fast::hash(&encoded),
            timestamp,
        };

        if self.config.verify_checksums {
            self.verify(&meta)?;
        }

        debug!(name, path = %meta.path.display(), size = meta.size, "snapshot saved");
        Ok(meta)
    }

    /// Read snapshot `name`.
    ///
    /// Returns [`Error::NotFound`] if no such snapshot file exists.
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.path_for(name);
        if !path.exists() {
            return Err(Error::NotFound(format!("snapshot {}", path.display())));
        }
        Self::load_from(&path)
    }

    /// Read a snapshot from an explicit file
    pub fn load_from<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);

        let mut contents = Vec::new();
        reader.read_to_end(&mut contents)?;

        Ok(serde_json::from_slice(&contents)?)
    }

    /// Check the file behind `meta` still matches its checksum
    pub fn verify(&self, meta: &SnapshotMeta) -> Result<()> {
        let actual = Self::compute_checksum(&meta.path)?;
        if actual != meta.checksum {
            return Err(Error::Corruption(format!(
                "Checksum mismatch for {}: expected {}, got {}",
                meta.path.display(),
                meta.checksum,
                actual
            )));
        }
        Ok(())
    }

    /// Names of all snapshots present in the directory, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.config.dir.exists() {
            return Ok(Vec::new());
        }

        let suffix = format!(".{}", self.config.extension);
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.config.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(name) = file_name
                .strip_prefix(self.config.prefix.as_str())
                .and_then(|rest| rest.strip_suffix(suffix.as_str()))
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete snapshot `name`. Returns `true` if it existed.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name);
        if path.exists() {
            fs::remove_file(&path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Compute CRC32 checksum of a file
    fn compute_checksum(path: &Path) -> Result<u32> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut hasher = crc32fast::Hasher::new();

        let mut buffer = [0u8; 8192];
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(hasher.finalize())
    }
}
