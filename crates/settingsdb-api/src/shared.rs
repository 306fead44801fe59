//! Thread-safe handle to a collection.

use crate::collection::Collection;
use settingsdb_core::{Error, Result};
use std::sync::{Arc, Mutex};

/// A [`Collection`] shared between threads.
///
/// Cloning is cheap and every clone refers to the same collection. Calls are
/// serialized by a mutex, and each persistence operation still opens and
/// closes the database file on its own.
///
/// # Examples
///
/// ```rust,no_run
/// use settingsdb::{Collection, Config};
///
/// let shared = Collection::open("themes", Config::default())?.into_shared();
/// let worker = shared.clone();
/// std::thread::spawn(move || {
///     worker.with(|c| c.item("dark").map(|item| item.add("mode", "dark").clone()))
/// });
/// # Ok::<(), settingsdb::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct SharedCollection {
    inner: Arc<Mutex<Collection>>,
}

impl SharedCollection {
    /// Wrap `collection`
    pub fn new(collection: Collection) -> Self {
        Self {
            inner: Arc::new(Mutex::new(collection)),
        }
    }

    /// Run `f` with exclusive access to the collection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockPoisoned`] if another thread panicked while
    /// holding the lock, otherwise whatever `f` returns.
    pub fn with<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Collection) -> Result<T>,
    {
        let mut guard = self.inner.lock().map_err(|_| Error::LockPoisoned)?;
        f(&mut guard)
    }
}

impl From<Collection> for SharedCollection {
    fn from(collection: Collection) -> Self {
        Self::new(collection)
    }
}
