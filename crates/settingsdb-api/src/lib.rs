//! # SettingsDB
//!
//! An embedded settings store: named collections of named items, each item
//! an ordered list of string key/value entries, persisted to a local
//! transactional database file and optionally to JSON snapshot files.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use settingsdb::{Collection, Config};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut editor = Collection::open("editor", Config::in_dir("./settings"))?;
//!
//!     // Find or create an item, then set entries on it
//!     editor.item("fonts")?.add("family", "Fira Code").add("size", "13");
//!     editor.item("theme")?.add("mode", "dark");
//!
//!     // Persist every item to the "editor" bucket
//!     editor.save(false)?;
//!
//!     // Later: pull everything back in
//!     let mut again = Collection::open("editor", Config::in_dir("./settings"))?;
//!     again.item_prefix("")?;
//!     for value in again.find("Fira") {
//!         println!("{}", value);
//!     }
//!
//!     // Snapshot to ./settings/data_editor.json
//!     again.save_json()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Reconciliation
//!
//! Looking an item up by name ([`Collection::item`], [`Collection::exist`])
//! merges the in-memory copy, the persisted copy and the caller's candidate.
//! The persisted copy wins over memory, and the candidate's entries are
//! applied last. Lookups never write; [`Collection::save`] does.
//!
//! ## Crates
//!
//! - `settingsdb-core`: errors, identifiers, the [`Item`] / [`Entry`] model
//! - `settingsdb-storage`: [`DataBase`] sessions and [`Bucket`] transactions
//! - `settingsdb-snapshot`: JSON snapshot files
//!
//! Enable logging with [`logging::LogConfig`].

#![warn(missing_docs)]

pub mod collection;
pub mod config;
pub mod logging;
pub mod security;
pub mod shared;

// Re-export core types
pub use settingsdb_core::id;
pub use settingsdb_core::{Entry, Error, Item, Result};

// Storage components
pub use settingsdb_storage::{Bucket, BucketWriter, DataBase, StorageConfig};

// Snapshot components
pub use settingsdb_snapshot::{SnapshotConfig, SnapshotManager, SnapshotMeta};

pub use collection::{Collection, ItemName};
pub use config::Config;
pub use shared::SharedCollection;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
