//! Trie decoder.
//!
//! Every root-to-leaf path of an encoded forest is one record: the root
//! edge carries the name, deeper edges carry coded attributes, and the leaf
//! carries delta timestamps plus the passthrough fields. Paths that cannot
//! be rebuilt are reported individually; the rest of the batch still
//! decodes.

use crate::dictionary::{parse_coded_key, DictionaryUpdate, MirroredDictionary};
use crate::error::{Error, Result};
use crate::payload::{EncodedBatch, EncodedScope};
use crate::record::{Attribute, Batch, Record, ResourceBlock, ScopeBlock};
use crate::state::StateSnapshot;
use crate::trie::{EdgeValue, LeafRecord, TrieNode, NAME_KEY};
use tracing::{debug, info, warn};

/// A record that could not be rebuilt.
#[derive(Debug)]
pub struct RecordFailure {
    /// Index of the resource block.
    pub resource: usize,
    /// Index of the scope block within the resource.
    pub scope: usize,
    /// Record name, if the path carried one.
    pub name: Option<String>,
    /// What went wrong.
    pub error: Error,
}

/// The result of one decode call.
#[derive(Debug, Default)]
pub struct DecodeOutcome {
    /// Rebuilt records, in the encoded resource/scope hierarchy.
    pub batch: Batch,
    /// Records that failed to decode.
    pub failures: Vec<RecordFailure>,
}

impl DecodeOutcome {
    /// Returns true if any record failed to decode.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// One edge on the current root-to-leaf path.
type Edge<'a> = (&'a str, &'a EdgeValue);

/// Decodes trie forests back into span batches.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    dictionary: MirroredDictionary,
}

impl Decoder {
    /// Creates a decoder with an empty mirrored dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a decoder whose dictionary is restored from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot fails verification or its entries
    /// conflict.
    pub fn from_snapshot(snapshot: &StateSnapshot) -> Result<Self> {
        snapshot.verify()?;
        let mut dictionary = MirroredDictionary::new();
        dictionary.apply(&snapshot.dictionary)?;
        Ok(Self { dictionary })
    }

    /// Captures the mirrored dictionary.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::new(self.dictionary.entries(), Vec::new())
    }

    /// Returns the mirrored dictionary.
    #[must_use]
    pub const fn dictionary(&self) -> &MirroredDictionary {
        &self.dictionary
    }

    /// Applies `updates`, then decodes `payload`.
    ///
    /// # Errors
    ///
    /// Returns `Error::DictionaryConflict` if an update contradicts the
    /// mirrored dictionary. Per-record problems are reported in
    /// [`DecodeOutcome::failures`] instead.
    pub fn decode(&mut self, payload: &EncodedBatch, updates: &[DictionaryUpdate]) -> Result<DecodeOutcome> {
        let added = self.dictionary.apply(updates)?;
        debug!("Applied {} dictionary updates ({} new)", updates.len(), added);

        let mut outcome = DecodeOutcome::default();
        for (r, resource) in payload.resource_spans.iter().enumerate() {
            let mut block = ResourceBlock {
                schema_url: resource.schema_url.clone(),
                resource: resource.resource.clone(),
                scope_spans: Vec::with_capacity(resource.scope_spans.len()),
            };
            for (s, scope) in resource.scope_spans.iter().enumerate() {
                block
                    .scope_spans
                    .push(self.decode_scope(scope, (r, s), &mut outcome.failures));
            }
            outcome.batch.resource_spans.push(block);
        }

        info!(
            "Decoded {} records, {} failed",
            outcome.batch.record_count(),
            outcome.failures.len()
        );
        Ok(outcome)
    }

    /// Parses a JSON payload and decodes it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the payload is not valid, otherwise as
    /// [`Decoder::decode`].
    pub fn decode_json(&mut self, payload: &str, updates: &[DictionaryUpdate]) -> Result<DecodeOutcome> {
        let payload = EncodedBatch::from_json(payload)?;
        self.decode(&payload, updates)
    }

    fn decode_scope(
        &self,
        scope: &EncodedScope,
        position: (usize, usize),
        failures: &mut Vec<RecordFailure>,
    ) -> ScopeBlock {
        let mut records = Vec::new();
        let mut path: Vec<Edge<'_>> = Vec::new();
        for root in &scope.spans {
            self.expand(root, scope.t_offset, &mut path, &mut records, position, failures);
        }
        debug!(
            "Decoded scope block: {} roots, {} records",
            scope.spans.len(),
            records.len()
        );
        ScopeBlock {
            schema_url: scope.schema_url.clone(),
            scope: scope.scope.clone(),
            records,
        }
    }

    fn expand<'a>(
        &self,
        node: &'a TrieNode,
        offset: u64,
        path: &mut Vec<Edge<'a>>,
        records: &mut Vec<Record>,
        position: (usize, usize),
        failures: &mut Vec<RecordFailure>,
    ) {
        match node {
            TrieNode::Leaf(leaf) => match self.rebuild(path, leaf, offset) {
                Ok(record) => records.push(record),
                Err(error) => {
                    let name = path_name(path).map(str::to_string);
                    warn!(
                        "Failed to decode record '{}' in resource {} scope {}: {}",
                        name.as_deref().unwrap_or("?"),
                        position.0,
                        position.1,
                        error
                    );
                    failures.push(RecordFailure {
                        resource: position.0,
                        scope: position.1,
                        name,
                        error,
                    });
                }
            },
            TrieNode::Internal {
                key,
                value,
                children,
            } => {
                path.push((key.as_str(), value));
                for child in children {
                    self.expand(child, offset, path, records, position, failures);
                }
                path.pop();
            }
        }
    }

    fn rebuild(&self, path: &[Edge<'_>], leaf: &LeafRecord, offset: u64) -> Result<Record> {
        let Some((&(root_key, root_value), edges)) = path.split_first() else {
            return Err(Error::MalformedRecord("leaf outside any name root".to_string()));
        };
        if root_key != NAME_KEY {
            return Err(Error::MalformedRecord(format!(
                "root edge is '{root_key}', expected '{NAME_KEY}'"
            )));
        }
        let name = root_value
            .as_value()
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::MalformedRecord("name edge is not a string".to_string()))?;

        let mut attributes = Vec::with_capacity(edges.len());
        for &(key, value) in edges {
            let code = parse_coded_key(key)
                .ok_or_else(|| Error::MalformedRecord(format!("unexpected edge key '{key}'")))?;
            if let EdgeValue::Present(value) = value {
                let raw = self.dictionary.resolve(code)?;
                attributes.push(Attribute::new(raw, value.clone()));
            }
        }

        let restore = |delta: u64| {
            delta
                .checked_add(offset)
                .ok_or_else(|| Error::MalformedRecord(format!("timestamp {delta} + {offset} overflows")))
        };

        Ok(Record {
            name: Some(name.to_string()),
            start_time: restore(leaf.stun)?,
            end_time: restore(leaf.etun)?,
            attributes,
            remainder: leaf.fields.clone(),
        })
    }
}

fn path_name<'a>(path: &[Edge<'a>]) -> Option<&'a str> {
    let &(key, value) = path.first()?;
    if key != NAME_KEY {
        return None;
    }
    value.as_value().and_then(|v| v.as_str())
}
