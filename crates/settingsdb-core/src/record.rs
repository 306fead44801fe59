//! Record model: named items holding ordered key/value entries.
//!
//! Items encode as `{"Name", "ID", "Values": [{"Key", "Value"}]}` so data
//! written by earlier releases stays readable.

use crate::id::{self, ITEM_ID_LEN};
use crate::Result;
use serde::{Deserialize, Deserializer, Serialize};

/// A single key/value pair inside an [`Item`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Entry {
    /// Entry key, unique within its item
    pub key: String,
    /// Entry value
    pub value: String,
}

impl Entry {
    /// Create a new entry
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A named record of settings.
///
/// Entries keep the order of their first insertion. Writing an existing key
/// replaces its value in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Item {
    /// Lookup and merge key within a collection and its bucket
    pub name: String,
    /// Randomly generated identifier
    #[serde(rename = "ID", default)]
    pub id: String,
    /// Ordered entries
    #[serde(default, deserialize_with = "null_as_empty")]
    pub values: Vec<Entry>,
}

impl Item {
    /// Create an empty item with a fresh identifier
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(name, id::generate(ITEM_ID_LEN))
    }

    /// Create an empty item with the given identifier
    pub fn with_id(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            values: Vec::new(),
        }
    }

    /// Create a child item whose identifier extends this item's identifier.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut child = Self::new(name);
        child.id = format!("{}{}", self.id, child.id);
        child
    }

    /// Insert or update an entry.
    ///
    /// # Examples
    ///
    /// ```
    /// use settingsdb_core::Item;
    ///
    /// let mut item = Item::new("theme");
    /// item.add("mode", "dark").add("mode", "light");
    /// assert_eq!(item.values.len(), 1);
    /// assert_eq!(item.find("mode"), Some("light"));
    /// ```
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.values.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => entry.value = value,
            None => self.values.push(Entry { key, value }),
        }
        self
    }

    /// Upsert every entry of `other` into this item, in `other`'s order.
    pub fn merge(&mut self, other: &Item) -> &mut Self {
        for entry in &other.values {
            self.add(entry.key.as_str(), entry.value.as_str());
        }
        self
    }

    /// Value of the first entry with `key`, or `None` when absent
    pub fn find(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_str())
    }

    /// Remove entries whose key equals `key` (or starts with it when
    /// `prefix` is set). Returns the number of entries removed.
    pub fn remove(&mut self, key: &str, prefix: bool) -> usize {
        let before = self.values.len();
        self.values.retain(|entry| !key_matches(&entry.key, key, prefix));
        before - self.values.len()
    }

    /// Whether the item has no entries
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Pretty JSON encoding of the entries alone
    pub fn values_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.values)?)
    }

    /// Pretty JSON encoding of the whole item
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Decode an item from its JSON encoding
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Exact or prefix key comparison shared by lookups and removals.
pub fn key_matches(candidate: &str, key: &str, prefix: bool) -> bool {
    if prefix {
        candidate.starts_with(key)
    } else {
        candidate == key
    }
}

/// Deserialize a list that older writers may have encoded as `null`.
pub fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
