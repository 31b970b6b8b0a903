//! Shared codec state.
//!
//! The dictionary, the schema tracker and the frequency oracle are the only
//! state that outlives a single encode call. They are owned by a
//! [`CodecState`] that callers construct explicitly and pass by reference,
//! so independent instances never share codes. Each structure sits behind
//! its own mutex; concurrent encoders serialize every check-then-assign on
//! them. Lock order is always dictionary, then schema, then oracle.

use crate::dictionary::{AttributeDictionary, DictionaryUpdate};
use crate::error::{Error, Result};
use crate::oracle::FrequencyOracle;
use crate::schema::{SchemaEntry, SchemaTracker};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

/// Current snapshot format version.
const SNAPSHOT_VERSION: u32 = 1;

/// Process-lifetime state shared by encode calls.
#[derive(Debug, Default)]
pub struct CodecState {
    dictionary: Mutex<AttributeDictionary>,
    schema: Mutex<SchemaTracker>,
    oracle: Mutex<FrequencyOracle>,
}

impl CodecState {
    /// Creates empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores dictionary and schema from a snapshot. The oracle starts
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot fails verification.
    pub fn restore(snapshot: &StateSnapshot) -> Result<Self> {
        snapshot.verify()?;
        let dictionary = AttributeDictionary::from_entries(&snapshot.dictionary)?;
        let schema = SchemaTracker::from_entries(&snapshot.schemas);
        info!(
            "Restored codec state: {} dictionary entries, {} schemas",
            dictionary.len(),
            schema.len()
        );
        Ok(Self {
            dictionary: Mutex::new(dictionary),
            schema: Mutex::new(schema),
            oracle: Mutex::new(FrequencyOracle::new()),
        })
    }

    /// Clears all state.
    ///
    /// # Errors
    ///
    /// Returns `Error::StatePoisoned` if a lock is poisoned.
    pub fn reset(&self) -> Result<()> {
        let mut dictionary = self.dictionary()?;
        let mut schema = self.schema()?;
        let mut oracle = self.oracle()?;
        *dictionary = AttributeDictionary::new();
        *schema = SchemaTracker::new();
        *oracle = FrequencyOracle::new();
        Ok(())
    }

    /// Captures dictionary and schema as one consistent unit.
    ///
    /// # Errors
    ///
    /// Returns `Error::StatePoisoned` if a lock is poisoned.
    pub fn snapshot(&self) -> Result<StateSnapshot> {
        let dictionary = self.dictionary()?;
        let schema = self.schema()?;
        Ok(StateSnapshot::new(dictionary.entries(), schema.entries()))
    }

    /// Returns the dictionary fingerprint.
    ///
    /// # Errors
    ///
    /// Returns `Error::StatePoisoned` if the lock is poisoned.
    pub fn dictionary_fingerprint(&self) -> Result<String> {
        Ok(self.dictionary()?.fingerprint())
    }

    /// Returns the number of dictionary entries.
    ///
    /// # Errors
    ///
    /// Returns `Error::StatePoisoned` if the lock is poisoned.
    pub fn dictionary_len(&self) -> Result<usize> {
        Ok(self.dictionary()?.len())
    }

    /// Returns the number of nodes in the frequency oracle.
    ///
    /// # Errors
    ///
    /// Returns `Error::StatePoisoned` if the lock is poisoned.
    pub fn oracle_nodes(&self) -> Result<usize> {
        Ok(self.oracle()?.node_count())
    }

    pub(crate) fn dictionary(&self) -> Result<MutexGuard<'_, AttributeDictionary>> {
        self.dictionary
            .lock()
            .map_err(|_| Error::StatePoisoned("dictionary"))
    }

    pub(crate) fn schema(&self) -> Result<MutexGuard<'_, SchemaTracker>> {
        self.schema.lock().map_err(|_| Error::StatePoisoned("schema"))
    }

    pub(crate) fn oracle(&self) -> Result<MutexGuard<'_, FrequencyOracle>> {
        self.oracle.lock().map_err(|_| Error::StatePoisoned("oracle"))
    }
}

/// Persisted dictionary and schema state.
///
/// Code assignment depends on everything seen before, so the two are saved
/// and restored together and tagged with the dictionary fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Snapshot format version.
    pub version: u32,
    /// Fingerprint of `dictionary`.
    pub fingerprint: String,
    /// When the snapshot was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    /// Dictionary entries in code order.
    pub dictionary: Vec<DictionaryUpdate>,
    /// Schemas sorted by record name.
    #[serde(default)]
    pub schemas: Vec<SchemaEntry>,
}

impl StateSnapshot {
    /// Creates a snapshot, computing its fingerprint.
    #[must_use]
    pub fn new(dictionary: Vec<DictionaryUpdate>, schemas: Vec<SchemaEntry>) -> Self {
        let fingerprint = fingerprint_of(&dictionary);
        Self {
            version: SNAPSHOT_VERSION,
            fingerprint,
            saved_at: None,
            dictionary,
            schemas,
        }
    }

    /// Stamps the snapshot with the current time.
    #[must_use]
    pub fn with_timestamp(mut self) -> Self {
        self.saved_at = Some(Utc::now());
        self
    }

    /// Checks that the stored fingerprint matches the contents.
    ///
    /// # Errors
    ///
    /// Returns `Error::SnapshotMismatch` on mismatch.
    pub fn verify(&self) -> Result<()> {
        let computed = fingerprint_of(&self.dictionary);
        if computed != self.fingerprint {
            return Err(Error::SnapshotMismatch {
                stored: self.fingerprint.clone(),
                computed,
            });
        }
        Ok(())
    }

    /// Loads a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let snapshot: Self = serde_json::from_str(&content)?;
        Ok(snapshot)
    }

    /// Saves the snapshot as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}

fn fingerprint_of(entries: &[DictionaryUpdate]) -> String {
    // Conflicting entries have no fingerprint; restore rejects them anyway.
    let mut mirror = crate::dictionary::MirroredDictionary::new();
    match mirror.apply(entries) {
        Ok(_) => mirror.fingerprint(),
        Err(_) => String::from("invalid"),
    }
}
