//! Named collections of items and their reconciliation with storage.
//!
//! A [`Collection`] caches items in memory and persists them to the bucket
//! that shares its name. Looking an item up merges three sources: the
//! in-memory copy, the persisted copy, and the caller's candidate. Persisted
//! state forms the base and the candidate's entries are applied on top.

use crate::config::Config;
use crate::security;
use serde::{Deserialize, Serialize};
use settingsdb_core::id::{self, ITEM_ID_LEN};
use settingsdb_core::record::{key_matches, null_as_empty};
use settingsdb_core::{Item, Result};
use settingsdb_snapshot::{SnapshotManager, SnapshotMeta};
use settingsdb_storage::{Bucket, DataBase};
use std::fmt;
use std::path::Path;
use tracing::{debug, trace};

/// Name used to find or create an item.
///
/// Built from strings or integers; numbers are converted to their decimal
/// text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemName(String);

impl ItemName {
    /// The name as text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the underlying string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for ItemName {
    fn from(name: &str) -> Self {
        ItemName(name.to_string())
    }
}

impl From<String> for ItemName {
    fn from(name: String) -> Self {
        ItemName(name)
    }
}

impl From<&String> for ItemName {
    fn from(name: &String) -> Self {
        ItemName(name.clone())
    }
}

macro_rules! item_name_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ItemName {
                fn from(value: $ty) -> Self {
                    ItemName(value.to_string())
                }
            }
        )*
    };
}

item_name_from_integer!(i32, i64, u32, u64, usize);

impl fmt::Display for ItemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot encoding of a collection
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SnapshotRef<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    name: &'a str,
    items: &'a [Item],
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SnapshotOwned {
    #[serde(rename = "ID", default)]
    id: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    items: Vec<Item>,
}

/// A named, in-memory set of items backed by one bucket.
///
/// Every persistence operation opens the database, runs one transaction and
/// closes it again before returning, so no file lock is held between calls.
///
/// # Examples
///
/// ```rust,no_run
/// use settingsdb::{Collection, Config};
///
/// let mut themes = Collection::open("themes", Config::in_dir("./settings"))?;
/// themes.item("dark")?.add("background", "#000").add("foreground", "#eee");
/// themes.save(false)?;
///
/// let mut again = Collection::open("themes", Config::in_dir("./settings"))?;
/// assert_eq!(again.item("dark")?.find("background"), Some("#000"));
/// # Ok::<(), settingsdb::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Collection {
    id: String,
    name: String,
    items: Vec<Item>,
    config: Config,
    snapshots: SnapshotManager,
}

impl Collection {
    /// Open collection `name`, creating its bucket if needed.
    ///
    /// The collection starts with no items in memory; use [`item`],
    /// [`item_prefix`] or [`load_json`] to populate it.
    ///
    /// [`item`]: Collection::item
    /// [`item_prefix`]: Collection::item_prefix
    /// [`load_json`]: Collection::load_json
    pub fn open(name: impl Into<String>, config: Config) -> Result<Self> {
        let name = name.into();
        security::validate_collection_name(&name)?;

        let collection = Self {
            id: id::generate(ITEM_ID_LEN),
            snapshots: SnapshotManager::new(config.snapshot.clone()),
            name,
            items: Vec::new(),
            config,
        };
        collection.session(|db| db.bucket(&collection.name).map(|_| ()))?;
        debug!(collection = %collection.name, id = %collection.id, "collection opened");
        Ok(collection)
    }

    /// Collection name, also the bucket name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collection identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Items in memory, in insertion order
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Number of items in memory
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no items are in memory
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// In-memory item called `name`, without consulting storage
    pub fn get_item(&self, name: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.name == name)
    }

    /// Mutable in-memory item called `name`, without consulting storage
    pub fn get_item_mut(&mut self, name: &str) -> Option<&mut Item> {
        self.items.iter_mut().find(|item| item.name == name)
    }

    /// Reconcile `candidate` with memory and storage and return the result.
    ///
    /// - In memory and persisted: the in-memory item is overwritten by the
    ///   persisted one (keeping its position), then the candidate's entries
    ///   are applied on top.
    /// - In memory only: the candidate's entries are applied to it.
    /// - Persisted only: the candidate's entries are applied to the persisted
    ///   item, which is appended.
    /// - Neither: the candidate is appended unchanged.
    ///
    /// Nothing is written back; call [`save`](Collection::save) for that.
    pub fn exist(&mut self, candidate: Item) -> Result<&mut Item> {
        let index = self.reconcile(candidate)?;
        Ok(&mut self.items[index])
    }

    /// Find or create the item called `name`. Does not persist.
    pub fn item(&mut self, name: impl Into<ItemName>) -> Result<&mut Item> {
        let name = name.into();
        self.exist(Item::new(name.into_string()))
    }

    /// Reconcile a fully-formed item, then persist the collection.
    pub fn insert(&mut self, item: Item) -> Result<&mut Item> {
        let index = self.reconcile(item)?;
        self.save(false)?;
        Ok(&mut self.items[index])
    }

    /// Pull every persisted item whose key starts with `prefix` into the
    /// collection, merging each as [`insert`](Collection::insert) would, then
    /// persist once.
    ///
    /// An empty prefix loads the whole bucket. Returns the merged item
    /// names in key order.
    pub fn item_prefix(&mut self, prefix: impl Into<ItemName>) -> Result<Vec<String>> {
        let prefix = prefix.into();
        let hits = self.session(|db| db.handle(&self.name)?.print_all_prefix(prefix.as_str()))?;

        let mut merged: Vec<String> = Vec::with_capacity(hits.len());
        for (key, bytes) in hits {
            let item = Item::from_slice(&bytes)?;
            trace!(collection = %self.name, key = %key, item = %item.name, "merging persisted item");
            if !merged.contains(&item.name) {
                merged.push(item.name.clone());
            }
            self.reconcile(item)?;
        }

        if !merged.is_empty() {
            self.save(false)?;
        }
        debug!(collection = %self.name, prefix = %prefix, merged = merged.len(), "prefix lookup");
        Ok(merged)
    }

    /// Replace every in-memory item with its persisted copy.
    ///
    /// Unlike [`exist`](Collection::exist) nothing is merged. Items with no
    /// persisted copy are left as they are. Returns how many were replaced.
    pub fn load(&mut self) -> Result<usize> {
        let fresh = self.session(|db| {
            let bucket = db.handle(&self.name)?;
            self.items
                .iter()
                .map(|item| read_persisted(&bucket, &item.name))
                .collect::<Result<Vec<_>>>()
        })?;

        let mut replaced = 0;
        for (item, fresh) in self.items.iter_mut().zip(fresh) {
            if let Some(fresh) = fresh {
                *item = fresh;
                replaced += 1;
            }
        }
        debug!(collection = %self.name, replaced, "reloaded from storage");
        Ok(replaced)
    }

    /// Set `key` to `value` on every item, then persist.
    pub fn add(&mut self, key: &str, value: &str) -> Result<&mut Self> {
        security::validate_entry_key(key)?;
        for item in &mut self.items {
            item.add(key, value);
        }
        self.save(false)?;
        Ok(self)
    }

    /// Values of every entry whose key equals `key` (or starts with it when
    /// `prefix` is set), in item then entry order.
    pub fn get(&self, key: &str, prefix: bool) -> Vec<String> {
        self.items
            .iter()
            .flat_map(|item| item.values.iter())
            .filter(|entry| key_matches(&entry.key, key, prefix))
            .map(|entry| entry.value.clone())
            .collect()
    }

    /// Remove matching entries from every item, then persist.
    ///
    /// Each item is filtered on its own. Returns the number of entries
    /// removed.
    pub fn clear(&mut self, key: &str, prefix: bool) -> Result<usize> {
        let removed = self
            .items
            .iter_mut()
            .map(|item| item.remove(key, prefix))
            .sum();
        self.save(false)?;
        Ok(removed)
    }

    /// A view over the items whose name starts with `key`.
    ///
    /// If no name matches, falls back to items holding an entry whose key or
    /// value starts with `key`. Each item appears at most once. The view
    /// holds copies and shares this collection's name, id and storage.
    pub fn filter(&self, key: &str) -> Collection {
        let mut items: Vec<Item> = self
            .items
            .iter()
            .filter(|item| item.name.starts_with(key))
            .cloned()
            .collect();

        if items.is_empty() {
            items = self
                .items
                .iter()
                .filter(|item| {
                    item.values
                        .iter()
                        .any(|entry| entry.key.starts_with(key) || entry.value.starts_with(key))
                })
                .cloned()
                .collect();
        }

        Collection {
            id: self.id.clone(),
            name: self.name.clone(),
            items,
            config: self.config.clone(),
            snapshots: self.snapshots.clone(),
        }
    }

    /// Values of entries whose key or value contains `key`.
    ///
    /// An entry matching on both key and value is reported twice.
    pub fn find(&self, key: &str) -> Vec<String> {
        let mut found = Vec::new();
        for entry in self.items.iter().flat_map(|item| item.values.iter()) {
            if entry.key.contains(key) {
                found.push(entry.value.clone());
            }
            if entry.value.contains(key) {
                found.push(entry.value.clone());
            }
        }
        found
    }

    /// Write every item to the bucket in one transaction.
    ///
    /// Items are stored under their name, or under name plus the bucket's
    /// next sequence number when `disambiguate` is set.
    pub fn save(&self, disambiguate: bool) -> Result<()> {
        let encoded = self
            .items
            .iter()
            .map(|item| Ok((item.name.as_str(), item.to_json()?)))
            .collect::<Result<Vec<_>>>()?;

        self.session(|db| {
            db.handle(&self.name)?.update(|writer| {
                for (name, bytes) in &encoded {
                    if disambiguate {
                        writer.put_sequenced(name, bytes, false)?;
                    } else {
                        writer.put(name, bytes)?;
                    }
                }
                Ok(())
            })
        })?;
        debug!(collection = %self.name, items = encoded.len(), disambiguate, "saved");
        Ok(())
    }

    /// Write the collection snapshot to `data_<name>.json`
    pub fn save_json(&self) -> Result<SnapshotMeta> {
        self.snapshots.save(&self.name, &self.snapshot())
    }

    /// The collection snapshot as indented JSON text
    pub fn json(&self) -> Result<String> {
        SnapshotManager::encode(&self.snapshot())
    }

    /// Replace the id and items with those from `data_<name>.json`.
    ///
    /// The collection keeps its own name.
    pub fn load_json(&mut self) -> Result<()> {
        let snapshot: SnapshotOwned = self.snapshots.load(&self.name)?;
        self.apply_snapshot(snapshot);
        Ok(())
    }

    /// Like [`load_json`](Collection::load_json), reading an explicit file
    pub fn load_json_from(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let snapshot: SnapshotOwned = SnapshotManager::load_from(path)?;
        self.apply_snapshot(snapshot);
        Ok(())
    }

    /// Remove every in-memory item's key from the bucket in one
    /// transaction. Returns how many keys were present.
    pub fn delete(&self) -> Result<usize> {
        let removed = self.session(|db| {
            db.handle(&self.name)?.update(|writer| {
                let mut removed = 0;
                for item in &self.items {
                    if writer.remove(&item.name)? {
                        removed += 1;
                    }
                }
                Ok(removed)
            })
        })?;
        debug!(collection = %self.name, removed, "deleted items from storage");
        Ok(removed)
    }

    /// Delete the whole bucket. Returns `true` if it existed.
    pub fn drop_bucket(&self) -> Result<bool> {
        self.session(|db| db.delete(&self.name))
    }

    /// Share this collection between threads
    pub fn into_shared(self) -> crate::SharedCollection {
        crate::SharedCollection::new(self)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|item| item.name == name)
    }

    fn reconcile(&mut self, candidate: Item) -> Result<usize> {
        security::validate_item_name(&candidate.name)?;
        let persisted = self.session(|db| read_persisted(&db.handle(&self.name)?, &candidate.name))?;

        let index = match self.position(&candidate.name) {
            Some(index) => {
                let current = &mut self.items[index];
                if let Some(persisted) = persisted {
                    *current = persisted;
                }
                current.merge(&candidate);
                index
            }
            None => {
                let item = match persisted {
                    Some(mut persisted) => {
                        persisted.merge(&candidate);
                        persisted
                    }
                    None => candidate,
                };
                self.items.push(item);
                self.items.len() - 1
            }
        };

        trace!(collection = %self.name, item = %self.items[index].name, index, "reconciled");
        Ok(index)
    }

    fn snapshot(&self) -> SnapshotRef<'_> {
        SnapshotRef {
            id: &self.id,
            name: &self.name,
            items: &self.items,
        }
    }

    fn apply_snapshot(&mut self, snapshot: SnapshotOwned) {
        if let Some(id) = snapshot.id {
            self.id = id;
        }
        self.items = snapshot.items;
        debug!(collection = %self.name, items = self.items.len(), "loaded snapshot");
    }

    /// Open the database, run `f`, and close it again.
    fn session<T>(&self, f: impl FnOnce(&DataBase) -> Result<T>) -> Result<T> {
        let db = DataBase::open(&self.config.storage)?;
        let output = f(&db);
        db.close()?;
        output
    }
}

/// Persisted copy of item `name`; a miss or a record stored under another
/// name counts as absent.
fn read_persisted(bucket: &Bucket<'_>, name: &str) -> Result<Option<Item>> {
    let Some(bytes) = bucket.print(name)? else {
        return Ok(None);
    };
    let item = Item::from_slice(&bytes)?;
    if item.name != name {
        trace!(key = name, stored = %item.name, "persisted name mismatch");
        return Ok(None);
    }
    Ok(Some(item))
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            for entry in &item.values {
                writeln!(f, "{} {} {} {}", self.name, item.name, entry.key, entry.value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settingsdb_core::Error;
    use tempfile::tempdir;

    fn open(dir: &Path, name: &str) -> Collection {
        Collection::open(name, Config::in_dir(dir)).unwrap()
    }

    #[test]
    fn test_item_name_conversions() {
        assert_eq!(ItemName::from("a").as_str(), "a");
        assert_eq!(ItemName::from(String::from("b")).as_str(), "b");
        assert_eq!(ItemName::from(42i32).as_str(), "42");
        assert_eq!(ItemName::from(-7i64).as_str(), "-7");
        assert_eq!(ItemName::from(9usize).to_string(), "9");
    }

    #[test]
    fn test_open_rejects_bad_name() {
        let dir = tempdir().unwrap();
        let result = Collection::open("../escape", Config::in_dir(dir.path()));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_open_releases_lock() {
        let dir = tempdir().unwrap();
        let _a = open(dir.path(), "a");
        let _b = open(dir.path(), "b");
    }

    #[test]
    fn test_item_creates_once() {
        let dir = tempdir().unwrap();
        let mut c = open(dir.path(), "themes");

        let id = c.item("dark").unwrap().id.clone();
        assert_eq!(c.item("dark").unwrap().id, id);
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_item_rejects_empty_name() {
        let dir = tempdir().unwrap();
        let mut c = open(dir.path(), "themes");
        assert!(matches!(c.item(""), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_numeric_item_name() {
        let dir = tempdir().unwrap();
        let mut c = open(dir.path(), "users");

        c.item(1001u64).unwrap().add("role", "admin");
        assert_eq!(c.get_item("1001").and_then(|i| i.find("role")), Some("admin"));
    }

    #[test]
    fn test_exist_in_memory_only_merges_candidate() {
        let dir = tempdir().unwrap();
        let mut c = open(dir.path(), "themes");
        c.item("dark").unwrap().add("mode", "dark");

        let mut candidate = Item::new("dark");
        candidate.add("accent", "blue");
        let merged = c.exist(candidate).unwrap();

        assert_eq!(merged.find("mode"), Some("dark"));
        assert_eq!(merged.find("accent"), Some("blue"));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_get_and_find() {
        let dir = tempdir().unwrap();
        let mut c = open(dir.path(), "palette");
        c.item("primary").unwrap().add("color", "red").add("color.dark", "maroon");
        c.item("secondary").unwrap().add("color", "green");

        assert_eq!(c.get("color", false), vec!["red", "green"]);
        assert_eq!(c.get("color", true), vec!["red", "maroon", "green"]);
        assert_eq!(c.find("red"), vec!["red"]);
        // "color.dark" matches on key, "maroon" does not contain "dark"
        assert_eq!(c.find("dark"), vec!["maroon"]);
    }

    #[test]
    fn test_find_counts_key_and_value_matches() {
        let dir = tempdir().unwrap();
        let mut c = open(dir.path(), "misc");
        c.item("x").unwrap().add("echo", "echo");

        assert_eq!(c.find("ech"), vec!["echo", "echo"]);
    }

    #[test]
    fn test_filter_by_name_then_values() {
        let dir = tempdir().unwrap();
        let mut c = open(dir.path(), "palette");
        c.item("primary").unwrap().add("color", "red");
        c.item("secondary").unwrap().add("color", "rose").add("rim", "round");

        let by_name = c.filter("prim");
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name.items()[0].name, "primary");
        assert_eq!(by_name.name(), c.name());

        // No name starts with "r": fall back to entries, once per item
        let by_value = c.filter("r");
        let names: Vec<_> = by_value.items().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["primary", "secondary"]);

        assert!(c.filter("zzz").is_empty());
    }

    #[test]
    fn test_display_lists_entries() {
        let dir = tempdir().unwrap();
        let mut c = open(dir.path(), "themes");
        c.item("dark").unwrap().add("mode", "dark");

        assert_eq!(c.to_string(), "themes dark mode dark\n");
    }

    #[test]
    fn test_json_shape() {
        let dir = tempdir().unwrap();
        let mut c = open(dir.path(), "themes");
        c.item("dark").unwrap().add("mode", "dark");

        let value: serde_json::Value = serde_json::from_str(&c.json().unwrap()).unwrap();
        assert_eq!(value["ID"], c.id());
        assert_eq!(value["Name"], "themes");
        assert_eq!(value["Items"][0]["Name"], "dark");
        assert_eq!(value["Items"][0]["Values"][0]["Key"], "mode");
    }
}
