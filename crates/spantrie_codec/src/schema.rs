//! Per-name attribute schemas.
//!
//! For every record name the tracker remembers which coded attribute keys
//! have been observed, in first-seen order. That order fixes trie depth and
//! branch order for the name and never changes; new keys only append.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The ordered attribute keys observed for one record name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaEntry {
    /// Record name.
    pub name: String,
    /// Coded attribute keys (`attr_<code>`) in first-seen order.
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct KeyOrder {
    order: Vec<String>,
    present: HashSet<String>,
}

/// Tracks attribute key order per record name.
#[derive(Debug, Clone, Default)]
pub struct SchemaTracker {
    schemas: HashMap<String, KeyOrder>,
}

impl SchemaTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a tracker from snapshot entries.
    #[must_use]
    pub fn from_entries(entries: &[SchemaEntry]) -> Self {
        let mut tracker = Self::new();
        for entry in entries {
            for key in &entry.keys {
                tracker.record_schema(&entry.name, key);
            }
        }
        tracker
    }

    /// Appends `key` to the schema of `name` unless it is already present.
    ///
    /// Returns true if the key was appended.
    pub fn record_schema(&mut self, name: &str, key: &str) -> bool {
        let schema = self.schemas.entry(name.to_string()).or_default();
        if schema.present.contains(key) {
            return false;
        }
        schema.present.insert(key.to_string());
        schema.order.push(key.to_string());
        true
    }

    /// Returns the ordered keys for `name` (empty if the name is unknown).
    #[must_use]
    pub fn keys(&self, name: &str) -> &[String] {
        self.schemas.get(name).map_or(&[], |s| s.order.as_slice())
    }

    /// Returns true if `key` is part of the schema of `name`.
    #[must_use]
    pub fn contains(&self, name: &str, key: &str) -> bool {
        self.schemas
            .get(name)
            .is_some_and(|s| s.present.contains(key))
    }

    /// Returns the number of known record names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Returns true if no name has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Returns all schemas, sorted by name.
    #[must_use]
    pub fn entries(&self) -> Vec<SchemaEntry> {
        let mut entries: Vec<SchemaEntry> = self
            .schemas
            .iter()
            .map(|(name, schema)| SchemaEntry {
                name: name.clone(),
                keys: schema.order.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }
}
