//! # SettingsDB Core
//!
//! Core types shared by the SettingsDB crates: the error taxonomy, random
//! identifiers, and the record model.
//!
//! ## ⚠️ Internal Implementation Detail
//!
//! Users should depend on the main [`settingsdb`](https://crates.io/crates/settingsdb)
//! crate instead, which re-exports everything needed from here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod id;
pub mod record;

pub use error::{Error, Result};
pub use record::{Entry, Item};
