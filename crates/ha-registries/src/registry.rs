//! Identifier-keyed registry maps
//!
//! A registry is rebuilt wholesale from the record list a hub returns for
//! one registry query. Entries are never patched in place.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// A record that can be indexed in a [`RegistryMap`]
pub trait RegistryRecord: DeserializeOwned {
    /// Registry name used in log lines
    const KIND: &'static str;

    /// Key the record is indexed by
    fn key(&self) -> &str;
}

/// Registry contents keyed by identifier
///
/// Iteration follows the order records arrived in, so two maps built from
/// the same reply always compile to the same list.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryMap<T> {
    by_id: IndexMap<String, T>,
}

impl<T> Default for RegistryMap<T> {
    fn default() -> Self {
        Self {
            by_id: IndexMap::new(),
        }
    }
}

impl<T: RegistryRecord> RegistryMap<T> {
    /// Build a registry from raw records, keeping only those `keep` accepts
    ///
    /// Records that do not deserialize into `T` are skipped. A later record
    /// with the same key replaces the earlier one.
    pub fn from_records<F>(records: &[Value], keep: F) -> Self
    where
        F: Fn(&Value) -> bool,
    {
        let mut by_id = IndexMap::with_capacity(records.len());
        let mut skipped = 0usize;

        for record in records.iter().filter(|r| keep(*r)) {
            match T::deserialize(record) {
                Ok(entry) => {
                    by_id.insert(entry.key().to_string(), entry);
                }
                Err(e) => {
                    skipped += 1;
                    warn!(registry = T::KIND, error = %e, "Skipping malformed record");
                }
            }
        }

        debug!(
            registry = T::KIND,
            received = records.len(),
            indexed = by_id.len(),
            skipped,
            "Indexed registry records"
        );

        Self { by_id }
    }

    /// Build a registry from already-typed entries
    pub fn from_entries(entries: impl IntoIterator<Item = T>) -> Self {
        let by_id = entries
            .into_iter()
            .map(|entry| (entry.key().to_string(), entry))
            .collect();
        Self { by_id }
    }
}

impl<T> RegistryMap<T> {
    /// Look up an entry by key
    pub fn get(&self, key: &str) -> Option<&T> {
        self.by_id.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_id.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Entries in arrival order
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.by_id.values()
    }
}

/// Deserialize a nullable string as an empty string
///
/// Hub registries report unset names, models and categories as `null`;
/// downstream consumers only ever want plain strings.
pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
