//! Attribute-name dictionary.
//!
//! The encoder replaces every raw attribute key with a short numeric code
//! (`attr_<code>`). Codes are assigned sequentially on first sight and never
//! reassigned. Each encode call reports the entries it introduced as
//! [`DictionaryUpdate`]s; the decoder folds those into a
//! [`MirroredDictionary`] before resolving any code.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use xxhash_rust::xxh64::xxh64;

/// Prefix of coded attribute keys in encoded payloads.
pub const ATTR_PREFIX: &str = "attr_";

/// Seed for the dictionary fingerprint hash.
const FINGERPRINT_SEED: u64 = 0x5350_414E_5452_4945; // "SPANTRIE" in hex

/// Returns the coded key for an attribute code, e.g. `attr_3`.
#[must_use]
pub fn coded_key(code: u32) -> String {
    format!("{ATTR_PREFIX}{code}")
}

/// Parses a coded key back into its code.
#[must_use]
pub fn parse_coded_key(key: &str) -> Option<u32> {
    key.strip_prefix(ATTR_PREFIX)?.parse().ok()
}

/// A newly assigned dictionary entry, delivered to the decoder alongside
/// the payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DictionaryUpdate {
    /// Raw attribute key.
    pub key: String,
    /// Assigned code. Written as a decimal string on the wire.
    #[serde(with = "code_string")]
    pub value: u32,
}

impl DictionaryUpdate {
    /// Creates a new update entry.
    #[must_use]
    pub fn new(key: impl Into<String>, value: u32) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Encoder-side dictionary: raw key to code, append-only.
#[derive(Debug, Clone, Default)]
pub struct AttributeDictionary {
    codes: HashMap<String, u32>,
    /// Raw keys indexed by code.
    keys: Vec<String>,
}

impl AttributeDictionary {
    /// Creates an empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a dictionary from previously issued entries.
    ///
    /// Entries may come in any order but must cover codes `0..n` exactly once.
    ///
    /// # Errors
    ///
    /// Returns `Error::DictionaryConflict` if a key or code repeats or the
    /// codes leave a gap.
    pub fn from_entries(entries: &[DictionaryUpdate]) -> Result<Self> {
        let mut sorted: Vec<&DictionaryUpdate> = entries.iter().collect();
        sorted.sort_by_key(|e| e.value);

        let mut dict = Self::new();
        for entry in sorted {
            let expected = dict.next_code()?;
            if entry.value != expected || dict.codes.contains_key(&entry.key) {
                return Err(Error::DictionaryConflict {
                    key: entry.key.clone(),
                    existing: dict.codes.get(&entry.key).copied().unwrap_or(expected),
                    incoming: entry.value,
                });
            }
            dict.codes.insert(entry.key.clone(), entry.value);
            dict.keys.push(entry.key.clone());
        }
        Ok(dict)
    }

    /// Returns the number of known keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if no key has been assigned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the code for a raw key, if assigned.
    #[must_use]
    pub fn get(&self, raw_key: &str) -> Option<u32> {
        self.codes.get(raw_key).copied()
    }

    /// Returns the existing code for `raw_key`, or assigns the next one.
    ///
    /// The update entry is `Some` only when a new code was assigned.
    ///
    /// # Errors
    ///
    /// Returns `Error::Encoding` if the code space is exhausted.
    pub fn resolve_or_assign(&mut self, raw_key: &str) -> Result<(u32, Option<DictionaryUpdate>)> {
        if let Some(code) = self.get(raw_key) {
            return Ok((code, None));
        }
        let code = self.next_code()?;
        self.codes.insert(raw_key.to_string(), code);
        self.keys.push(raw_key.to_string());
        Ok((code, Some(DictionaryUpdate::new(raw_key, code))))
    }

    /// Returns every entry in code order.
    #[must_use]
    pub fn entries(&self) -> Vec<DictionaryUpdate> {
        self.keys
            .iter()
            .zip(0u32..)
            .map(|(key, code)| DictionaryUpdate::new(key.clone(), code))
            .collect()
    }

    /// Returns a stable fingerprint of the dictionary contents.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        fingerprint(self.keys.iter().zip(0u32..).map(|(k, c)| (c, k.as_str())))
    }

    fn next_code(&self) -> Result<u32> {
        u32::try_from(self.keys.len())
            .map_err(|_| Error::Encoding("attribute dictionary code space exhausted".to_string()))
    }
}

/// Decoder-side dictionary: code to raw key.
#[derive(Debug, Clone, Default)]
pub struct MirroredDictionary {
    keys: BTreeMap<u32, String>,
    codes: HashMap<String, u32>,
}

impl MirroredDictionary {
    /// Creates an empty mirrored dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of known codes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if no code is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Applies update entries.
    ///
    /// Re-delivered entries that match the current state are accepted, so
    /// at-least-once delivery is safe. Nothing is applied if any entry
    /// conflicts.
    ///
    /// Returns the number of entries that were new.
    ///
    /// # Errors
    ///
    /// Returns `Error::DictionaryConflict` if an entry rebinds a known key
    /// or code.
    pub fn apply(&mut self, updates: &[DictionaryUpdate]) -> Result<usize> {
        let mut pending: HashMap<&str, u32> = HashMap::new();
        let mut pending_codes: HashMap<u32, &str> = HashMap::new();

        for update in updates {
            let known_code = self
                .codes
                .get(&update.key)
                .copied()
                .or_else(|| pending.get(update.key.as_str()).copied());
            if let Some(existing) = known_code {
                if existing != update.value {
                    return Err(conflict(update, existing));
                }
                continue;
            }
            let known_key = self
                .keys
                .get(&update.value)
                .map(String::as_str)
                .or_else(|| pending_codes.get(&update.value).copied());
            if let Some(bound) = known_key {
                return Err(Error::DictionaryConflict {
                    key: bound.to_string(),
                    existing: update.value,
                    incoming: update.value,
                });
            }
            pending.insert(&update.key, update.value);
            pending_codes.insert(update.value, &update.key);
        }

        let added = pending.len();
        for (key, code) in pending {
            self.codes.insert(key.to_string(), code);
            self.keys.insert(code, key.to_string());
        }
        Ok(added)
    }

    /// Resolves a code to its raw key.
    ///
    /// # Errors
    ///
    /// Returns `Error::DictionaryDesync` if the code is unknown.
    pub fn resolve(&self, code: u32) -> Result<&str> {
        self.keys
            .get(&code)
            .map(String::as_str)
            .ok_or(Error::DictionaryDesync { code })
    }

    /// Returns every entry in code order.
    #[must_use]
    pub fn entries(&self) -> Vec<DictionaryUpdate> {
        self.keys
            .iter()
            .map(|(code, key)| DictionaryUpdate::new(key.clone(), *code))
            .collect()
    }

    /// Returns a fingerprint comparable with [`AttributeDictionary::fingerprint`].
    #[must_use]
    pub fn fingerprint(&self) -> String {
        fingerprint(self.keys.iter().map(|(c, k)| (*c, k.as_str())))
    }
}

fn conflict(update: &DictionaryUpdate, existing: u32) -> Error {
    Error::DictionaryConflict {
        key: update.key.clone(),
        existing,
        incoming: update.value,
    }
}

fn fingerprint<'a>(entries: impl Iterator<Item = (u32, &'a str)>) -> String {
    let mut buf = String::new();
    for (code, key) in entries {
        buf.push_str(&code.to_string());
        buf.push('=');
        buf.push_str(key);
        buf.push('\n');
    }
    format!("{:016x}", xxh64(buf.as_bytes(), FINGERPRINT_SEED))
}

mod code_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(code: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&code.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Code {
            Text(String),
            Number(u32),
        }

        match Code::deserialize(deserializer)? {
            Code::Number(n) => Ok(n),
            Code::Text(s) => s
                .parse()
                .map_err(|_| de::Error::custom(format!("invalid attribute code: {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_sequential_codes() {
        let mut dict = AttributeDictionary::new();

        let (a, update_a) = dict.resolve_or_assign("http.method").unwrap();
        let (b, update_b) = dict.resolve_or_assign("http.route").unwrap();

        assert_eq!((a, b), (0, 1));
        assert_eq!(update_a, Some(DictionaryUpdate::new("http.method", 0)));
        assert_eq!(update_b, Some(DictionaryUpdate::new("http.route", 1)));
    }

    #[test]
    fn second_sight_yields_no_update() {
        let mut dict = AttributeDictionary::new();
        let (first, _) = dict.resolve_or_assign("db.system").unwrap();
        let (second, update) = dict.resolve_or_assign("db.system").unwrap();

        assert_eq!(first, second);
        assert!(update.is_none());
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn coded_key_roundtrip() {
        assert_eq!(coded_key(12), "attr_12");
        assert_eq!(parse_coded_key("attr_12"), Some(12));
        assert_eq!(parse_coded_key("attr_x"), None);
        assert_eq!(parse_coded_key("name"), None);
    }

    #[test]
    fn update_wire_format_uses_string_codes() {
        let json = serde_json::to_string(&DictionaryUpdate::new("k", 3)).unwrap();
        assert_eq!(json, r#"{"key":"k","value":"3"}"#);

        let parsed: DictionaryUpdate = serde_json::from_str(r#"{"key":"k","value":4}"#).unwrap();
        assert_eq!(parsed.value, 4);
    }

    #[test]
    fn mirrored_apply_is_idempotent() {
        let mut mirror = MirroredDictionary::new();
        let updates = vec![DictionaryUpdate::new("a", 0), DictionaryUpdate::new("b", 1)];

        assert_eq!(mirror.apply(&updates).unwrap(), 2);
        assert_eq!(mirror.apply(&updates).unwrap(), 0);
        assert_eq!(mirror.resolve(1).unwrap(), "b");
    }

    #[test]
    fn mirrored_rejects_rebinding() {
        let mut mirror = MirroredDictionary::new();
        mirror.apply(&[DictionaryUpdate::new("a", 0)]).unwrap();

        let err = mirror.apply(&[DictionaryUpdate::new("a", 5)]).unwrap_err();
        assert!(matches!(err, Error::DictionaryConflict { existing: 0, incoming: 5, .. }));

        let err = mirror.apply(&[DictionaryUpdate::new("z", 0)]).unwrap_err();
        assert!(matches!(err, Error::DictionaryConflict { .. }));
        assert_eq!(mirror.len(), 1);
    }

    #[test]
    fn mirrored_conflict_applies_nothing() {
        let mut mirror = MirroredDictionary::new();
        let updates = vec![DictionaryUpdate::new("a", 0), DictionaryUpdate::new("b", 0)];

        assert!(mirror.apply(&updates).is_err());
        assert!(mirror.is_empty());
    }

    #[test]
    fn unknown_code_is_desync() {
        let mirror = MirroredDictionary::new();
        assert!(matches!(mirror.resolve(7), Err(Error::DictionaryDesync { code: 7 })));
    }

    #[test]
    fn fingerprints_agree_across_sides() {
        let mut dict = AttributeDictionary::new();
        let mut updates = Vec::new();
        for key in ["service.name", "http.method", "http.status_code"] {
            let (_, update) = dict.resolve_or_assign(key).unwrap();
            updates.extend(update);
        }

        let mut mirror = MirroredDictionary::new();
        updates.reverse();
        mirror.apply(&updates).unwrap();

        assert_eq!(dict.fingerprint(), mirror.fingerprint());
        assert_ne!(dict.fingerprint(), AttributeDictionary::new().fingerprint());
    }

    #[test]
    fn from_entries_restores_state() {
        let entries = vec![DictionaryUpdate::new("b", 1), DictionaryUpdate::new("a", 0)];
        let mut dict = AttributeDictionary::from_entries(&entries).unwrap();

        assert_eq!(dict.get("a"), Some(0));
        let (code, update) = dict.resolve_or_assign("c").unwrap();
        assert_eq!(code, 2);
        assert!(update.is_some());
    }

    #[test]
    fn from_entries_rejects_gaps() {
        let entries = vec![DictionaryUpdate::new("a", 0), DictionaryUpdate::new("b", 2)];
        assert!(AttributeDictionary::from_entries(&entries).is_err());
    }
}
