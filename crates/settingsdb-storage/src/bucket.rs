//! Named buckets and their write transactions.

use crate::{commit, definition, storage_error, DataBase, SEQUENCES};
use redb::{ReadableTable, Table};
use settingsdb_core::id::{self, SUFFIX_LEN};
use settingsdb_core::{Error, Result};
use std::collections::BTreeMap;
use tracing::trace;

/// A handle to one bucket of an open [`DataBase`].
pub struct Bucket<'db> {
    db: &'db DataBase,
    name: String,
}

impl<'db> Bucket<'db> {
    pub(crate) fn new(db: &'db DataBase, name: &str) -> Self {
        Self {
            db,
            name: name.to_string(),
        }
    }

    /// Bucket name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `f` inside one write transaction on this bucket.
    ///
    /// The transaction commits only if `f` returns `Ok`. On an error (or a
    /// panic) it is dropped uncommitted, which rolls it back.
    pub fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut BucketWriter<'_>) -> Result<T>,
    {
        let txn = self.db.begin_write()?;
        let output = {
            let mut writer = BucketWriter {
                bucket: self.name.as_str(),
                table: txn.open_table(definition(&self.name)).map_err(storage_error)?,
                sequences: txn.open_table(SEQUENCES).map_err(storage_error)?,
            };
            f(&mut writer)?
        };
        commit(txn, &self.name)?;
        Ok(output)
    }

    /// Append `value` under `key` followed by the next sequence number.
    ///
    /// With `disambiguate` set, a random suffix is inserted between the key
    /// and the sequence number. Returns the key actually written.
    pub fn add(&self, key: &str, value: &str, disambiguate: bool) -> Result<String> {
        self.update(|writer| writer.put_sequenced(key, value.as_bytes(), disambiguate))
    }

    /// Exact-key read; `None` on a miss.
    pub fn print(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.db.read_key(&self.name, key)
    }

    /// Values stored under `key`, or under every key starting with `key`
    /// when `prefix` is set. Ordered by key.
    ///
    /// A value that is not valid UTF-8 fails the call with
    /// [`Error::Serialization`].
    pub fn get(&self, key: &str, prefix: bool) -> Result<BTreeMap<String, String>> {
        let raw = if prefix {
            self.db.scan_prefix(&self.name, key)?
        } else {
            self.print(key)?
                .map(|value| BTreeMap::from([(key.to_string(), value)]))
                .unwrap_or_default()
        };
        raw.into_iter()
            .map(|(k, v)| match String::from_utf8(v) {
                Ok(value) => Ok((k, value)),
                Err(err) => Err(Error::Serialization(format!(
                    "value under {} in bucket {} is not UTF-8: {}",
                    k, self.name, err
                ))),
            })
            .collect()
    }

    /// Raw dump of every key starting with `prefix`
    pub fn print_all_prefix(&self, prefix: &str) -> Result<BTreeMap<String, Vec<u8>>> {
        self.db.scan_prefix(&self.name, prefix)
    }

    /// Delete the whole bucket. Returns `true` if it existed.
    pub fn delete(self) -> Result<bool> {
        self.db.delete(&self.name)
    }
}

/// Write access to a bucket inside an open transaction.
pub struct BucketWriter<'txn> {
    bucket: &'txn str,
    table: Table<'txn, &'static str, &'static [u8]>,
    sequences: Table<'txn, &'static str, u64>,
}

impl BucketWriter<'_> {
    /// Insert or overwrite `key`
    pub fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        trace!(bucket = self.bucket, key, len = value.len(), "put");
        self.table.insert(key, value).map_err(storage_error)?;
        Ok(())
    }

    /// Remove `key`. Returns `true` if it was present.
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        trace!(bucket = self.bucket, key, "remove");
        let removed = self.table.remove(key).map_err(storage_error)?.is_some();
        Ok(removed)
    }

    /// Advance and return the bucket's sequence counter (first value is 1).
    pub fn next_sequence(&mut self) -> Result<u64> {
        let current = self
            .sequences
            .get(self.bucket)
            .map_err(storage_error)?
            .map(|guard| guard.value())
            .unwrap_or(0);
        let next = current + 1;
        self.sequences
            .insert(self.bucket, next)
            .map_err(storage_error)?;
        Ok(next)
    }

    /// Write `value` under `key [+ random suffix] + next sequence`.
    /// Returns the key written.
    pub fn put_sequenced(&mut self, key: &str, value: &[u8], disambiguate: bool) -> Result<String> {
        let suffix = if disambiguate {
            id::generate(SUFFIX_LEN)
        } else {
            String::new()
        };
        let sequence = self.next_sequence()?;
        let effective = format!("{}{}{}", key, suffix, sequence);
        self.put(&effective, value)?;
        Ok(effective)
    }
}

#[cfg(test)]
mod tests {
    use crate::{DataBase, StorageConfig};
    use settingsdb_core::Error;
    use tempfile::tempdir;

    fn open(dir: &std::path::Path) -> DataBase {
        DataBase::open(&StorageConfig::new(dir)).unwrap()
    }

    #[test]
    fn test_add_appends_sequence() {
        let dir = tempdir().unwrap();
        let db = open(dir.path());
        let bucket = db.bucket("log").unwrap();

        assert_eq!(bucket.add("event", "a", false).unwrap(), "event1");
        assert_eq!(bucket.add("event", "b", false).unwrap(), "event2");
        assert_eq!(bucket.add("other", "c", false).unwrap(), "other3");

        let events = bucket.get("event", true).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events.get("event1").map(String::as_str), Some("a"));
    }

    #[test]
    fn test_add_disambiguated() {
        let dir = tempdir().unwrap();
        let db = open(dir.path());
        let bucket = db.bucket("log").unwrap();

        let first = bucket.add("event", "a", true).unwrap();
        let second = bucket.add("event", "a", true).unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with("event"));
        assert_eq!(first.len(), "event".len() + 24 + 1);
        assert_eq!(bucket.print_all_prefix("event").unwrap().len(), 2);
    }

    #[test]
    fn test_print_hit_and_miss() {
        let dir = tempdir().unwrap();
        let db = open(dir.path());
        let bucket = db.bucket("themes").unwrap();
        bucket.update(|w| w.put("dark", b"{}")).unwrap();

        assert_eq!(bucket.print("dark").unwrap(), Some(b"{}".to_vec()));
        assert_eq!(bucket.print("light").unwrap(), None);
    }

    #[test]
    fn test_get_exact_vs_prefix() {
        let dir = tempdir().unwrap();
        let db = open(dir.path());
        let bucket = db.bucket("kv").unwrap();
        bucket
            .update(|w| {
                w.put("color", b"red")?;
                w.put("color.dark", b"black")?;
                w.put("colour", b"blue")?;
                w.put("size", b"10")
            })
            .unwrap();

        let exact = bucket.get("color", false).unwrap();
        assert_eq!(exact.len(), 1);
        assert_eq!(exact.get("color").map(String::as_str), Some("red"));

        let prefixed = bucket.get("color", true).unwrap();
        let keys: Vec<_> = prefixed.keys().cloned().collect();
        assert_eq!(keys, vec!["color".to_string(), "color.dark".to_string()]);

        assert!(bucket.get("missing", false).unwrap().is_empty());
    }

    #[test]
    fn test_get_rejects_non_utf8_value() {
        let dir = tempdir().unwrap();
        let db = open(dir.path());
        let bucket = db.bucket("kv").unwrap();
        bucket
            .update(|w| {
                w.put("good", b"text")?;
                w.put("gone", &[0xff, 0xfe])
            })
            .unwrap();

        assert_eq!(
            bucket.get("good", false).unwrap().get("good").map(String::as_str),
            Some("text")
        );
        assert!(matches!(bucket.get("gone", false), Err(Error::Serialization(_))));
        assert!(matches!(bucket.get("go", true), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_update_rolls_back_on_error() {
        let dir = tempdir().unwrap();
        let db = open(dir.path());
        let bucket = db.bucket("kv").unwrap();

        let result: settingsdb_core::Result<()> = bucket.update(|w| {
            w.put("half", b"written")?;
            Err(Error::InvalidInput("abort".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(bucket.print("half").unwrap(), None);
    }

    #[test]
    fn test_remove() {
        let dir = tempdir().unwrap();
        let db = open(dir.path());
        let bucket = db.bucket("kv").unwrap();
        bucket.update(|w| w.put("a", b"1")).unwrap();

        assert!(bucket.update(|w| w.remove("a")).unwrap());
        assert!(!bucket.update(|w| w.remove("a")).unwrap());
    }

    #[test]
    fn test_delete_resets_sequence() {
        let dir = tempdir().unwrap();
        let db = open(dir.path());

        let bucket = db.bucket("log").unwrap();
        bucket.add("e", "x", false).unwrap();
        bucket.add("e", "y", false).unwrap();
        assert!(bucket.delete().unwrap());

        let bucket = db.bucket("log").unwrap();
        assert!(bucket.print_all_prefix("").unwrap().is_empty());
        assert_eq!(bucket.add("e", "z", false).unwrap(), "e1");
    }

    #[test]
    fn test_print_after_bucket_deleted() {
        let dir = tempdir().unwrap();
        let db = open(dir.path());
        let bucket = db.bucket("gone").unwrap();
        db.delete("gone").unwrap();

        assert_eq!(bucket.print("anything").unwrap(), None);
    }
}
