//! Catalog models.
//!
//! These mirror the on-disk JSON documents. Fields this tool doesn't
//! interpret are still typed where the catalog format defines them, and
//! anything unknown is carried through `extra` so a rewrite never drops data.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One library release in the catalog. Identity is `(name, version)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LibraryRecord {
    pub name: String,
    pub version: String,
    pub author: String,
    pub maintainer: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub license: String,
    pub sentence: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub paragraph: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub website: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub category: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub architectures: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
    /// Externally-distributed dependencies, as discovered by probing.
    #[serde(deserialize_with = "null_as_default")]
    pub requires: Vec<String>,
    /// Locally-provided (core or built-in) dependencies. Only written when
    /// explicitly enabled.
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub bundled_requires: Vec<String>,
    pub url: String,
    pub archive_file_name: String,
    pub size: i64,
    pub checksum: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub support_level: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
impl LibraryRecord {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: version.into(), ..Self::default() }
    }

    pub fn is(&self, name: &str, version: &str) -> bool {
        self.name == name && self.version == version
    }
}

/// The catalog document: an ordered list of [`LibraryRecord`]s. Order is
/// preserved on rewrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default, deserialize_with = "null_as_default")]
    pub libraries: Vec<LibraryRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
impl Catalog {
    pub fn new(libraries: Vec<LibraryRecord>) -> Self {
        Self { libraries, extra: Map::new() }
    }

    /// Index of the record for a given identity.
    pub fn position(&self, name: &str, version: &str) -> Option<usize> {
        self.libraries.iter().position(|lib| lib.is(name, version))
    }

    pub fn get(&self, index: usize) -> Option<&LibraryRecord> {
        self.libraries.get(index)
    }

    pub fn find(&self, name: &str, version: &str) -> Option<&LibraryRecord> {
        self.position(name, version).and_then(|i| self.get(i))
    }

    /// Overwrite a record's dependency fields. Returns `false` if there is no
    /// record at `index`.
    pub fn set_requires(&mut self, index: usize, requires: Vec<String>, bundled: Option<Vec<String>>) -> bool {
        let Some(record) = self.libraries.get_mut(index) else {
            return false;
        };
        record.requires = requires;
        if let Some(bundled) = bundled {
            record.bundled_requires = bundled;
        }
        true
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

/// Which libraries have already been attempted. Membership means "was
/// attempted", not "succeeded".
///
/// Serialized under a `name` key, which is the shape existing cache files
/// already have on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedCache {
    #[serde(rename = "name", default, deserialize_with = "null_as_default")]
    entries: BTreeMap<String, bool>,
}
impl ProcessedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_processed(&self, name: &str) -> bool {
        self.entries.get(name).copied().unwrap_or(false)
    }

    /// Marks a library as processed. Entries are never removed.
    pub fn mark(&mut self, name: impl Into<String>) {
        self.entries.insert(name.into(), true);
    }

    /// Number of libraries marked as processed.
    pub fn len(&self) -> usize {
        self.entries.values().filter(|processed| **processed).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter(|(_, processed)| **processed).map(|(name, _)| name.as_str())
    }
}
impl<S: Into<String>> FromIterator<S> for ProcessedCache {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut cache = Self::new();
        for name in iter {
            cache.mark(name);
        }
        cache
    }
}

/// Older catalogs have `"requires": null`; treat it the same as missing.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
