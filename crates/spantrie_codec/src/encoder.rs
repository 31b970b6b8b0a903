//! Trie encoder.
//!
//! Encoding a batch happens in two passes. The first validates every
//! record, canonicalizes attribute values, rewrites raw keys to dictionary
//! codes and completes each name's schema. The second walks every scope
//! block: records are folded into the frequency oracle, classified, and
//! inserted into a per-call trie whose leaves hold the residual payloads
//! of the records the sampler keeps.

use crate::builder::{NodeId, PathStep, PathTrie};
use crate::config::CodecConfig;
use crate::dictionary::{coded_key, DictionaryUpdate};
use crate::error::{Error, Result};
use crate::payload::{EncodedBatch, EncodedResource, EncodedScope};
use crate::record::{Batch, Record, ScopeBlock};
use crate::sampling::{name_is_rare, AbnormalReason, Sampler};
use crate::state::CodecState;
use crate::trie::{LeafRecord, NAME_KEY, RESERVED_FIELDS};
use crate::value::Value;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Counters describing one encode call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EncodeStats {
    /// Records in the input batch.
    pub records_in: usize,
    /// Records whose leaf payload was emitted.
    pub retained: usize,
    /// Records classified abnormal (all of them retained).
    pub abnormal: usize,
    /// Records whose payload was dropped by sampling.
    pub sampled_out: usize,
    /// Records skipped because they could not be encoded.
    pub skipped: usize,
}

/// The result of one encode call.
#[derive(Debug, Clone)]
pub struct EncodeOutput {
    /// The encoded document.
    pub payload: EncodedBatch,
    /// Dictionary entries introduced by this call, in code order.
    pub updates: Vec<DictionaryUpdate>,
    /// Call statistics.
    pub stats: EncodeStats,
}

/// A record after canonicalization, before trie insertion.
struct Staged<'a> {
    name: &'a str,
    /// (raw key, value, canonical value), duplicates collapsed.
    attrs: Vec<(&'a str, &'a Value, String)>,
    /// Coded keys parallel to `attrs`.
    coded: Vec<String>,
}

/// A scope block after canonicalization.
struct StagedScope<'a> {
    source: &'a ScopeBlock,
    offset: u64,
    records: Vec<Staged<'a>>,
    leaves: Vec<LeafRecord>,
}

/// Per-call name tallies used by the rare-name test.
struct NameTally<'a> {
    counts: HashMap<&'a str, u64>,
    total: u64,
}

/// Encodes span batches into trie forests.
///
/// An encoder owns its sampling RNG; the shared dictionary, schema and
/// oracle live in the [`CodecState`] passed to each call. Encoders running
/// on different threads may share one state.
#[derive(Debug, Clone)]
pub struct Encoder {
    config: CodecConfig,
    sampler: Sampler,
}

impl Encoder {
    /// Creates an encoder with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if the configuration is out of range.
    pub fn new(config: CodecConfig) -> Result<Self> {
        config.validate()?;
        let sampler = Sampler::new(&config);
        Ok(Self { config, sampler })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Encodes a batch.
    ///
    /// Records that cannot be canonicalized are skipped and counted in
    /// [`EncodeStats::skipped`]. Dictionary and schema entries minted before
    /// a failure are kept.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if any record lacks a name, and
    /// `Error::StatePoisoned` if shared state is unusable.
    pub fn encode(&mut self, state: &CodecState, batch: &Batch) -> Result<EncodeOutput> {
        validate(batch)?;

        let mut stats = EncodeStats {
            records_in: batch.record_count(),
            ..EncodeStats::default()
        };

        let mut staged: Vec<Vec<StagedScope<'_>>> = batch
            .resource_spans
            .iter()
            .map(|resource| {
                resource
                    .scope_spans
                    .iter()
                    .map(|scope| stage_scope(scope, &mut stats))
                    .collect()
            })
            .collect();

        let (updates, schemas) = assign_codes(state, &mut staged)?;
        let tally = tally_names(&staged);

        let mut payload = EncodedBatch::default();
        for (resource, scopes) in batch.resource_spans.iter().zip(staged) {
            let mut encoded = EncodedResource {
                schema_url: resource.schema_url.clone(),
                resource: resource.resource.clone(),
                scope_spans: Vec::with_capacity(scopes.len()),
            };
            for scope in scopes {
                encoded
                    .scope_spans
                    .push(self.encode_scope(state, scope, &schemas, &tally, &mut stats)?);
            }
            payload.resource_spans.push(encoded);
        }

        info!(
            "Encoded {} records: {} retained, {} abnormal, {} sampled out, {} skipped, {} new dictionary entries",
            stats.records_in,
            stats.retained,
            stats.abnormal,
            stats.sampled_out,
            stats.skipped,
            updates.len()
        );

        Ok(EncodeOutput {
            payload,
            updates,
            stats,
        })
    }

    fn encode_scope(
        &mut self,
        state: &CodecState,
        scope: StagedScope<'_>,
        schemas: &HashMap<&str, Vec<String>>,
        tally: &NameTally<'_>,
        stats: &mut EncodeStats,
    ) -> Result<EncodedScope> {
        let StagedScope {
            source,
            offset,
            records,
            leaves,
        } = scope;

        let mut name_values: HashMap<&str, (Value, String)> = HashMap::new();
        for record in &records {
            if !name_values.contains_key(record.name) {
                let value = Value::from(record.name);
                let canonical = value.canonical()?;
                name_values.insert(record.name, (value, canonical));
            }
        }

        let no_keys: Vec<String> = Vec::new();
        let paths: Vec<Vec<PathStep<'_>>> = records
            .iter()
            .map(|record| {
                let (name_value, name_canonical) = &name_values[record.name];
                let keys = schemas.get(record.name).unwrap_or(&no_keys);
                path_steps(record, name_value, name_canonical, keys)
            })
            .collect();

        let rare_branches = self.classify_branches(state, &paths)?;

        let factor = self.config.rarity_factor;
        let distinct = tally.counts.len() as u64;
        let mut trie: PathTrie<LeafRecord> = PathTrie::new(false);

        for (((record, steps), rare_branch), leaf) in
            records.iter().zip(&paths).zip(rare_branches).zip(leaves)
        {
            let node_path = trie.insert_path(steps);
            let Some(&node) = node_path.last() else {
                continue;
            };

            let count = tally.counts.get(record.name).copied().unwrap_or(0);
            // `rare_branch` is always false with anomaly detection off.
            let reason = if self.config.anomaly_detection
                && name_is_rare(tally.total, distinct, count, factor)
            {
                Some(AbnormalReason::RareName)
            } else if rare_branch {
                Some(AbnormalReason::RareBranch)
            } else {
                None
            };

            if reason.is_some() {
                stats.abnormal += 1;
                debug!(
                    "Abnormal record '{}' ({:?}) at stun={}",
                    record.name, reason, leaf.stun
                );
            }

            if self.sampler.keep(reason.is_some()) {
                trie.attach(node, leaf);
                stats.retained += 1;
            } else {
                stats.sampled_out += 1;
            }
        }

        let spans = trie.into_forest(self.config.prune_empty_branches);
        debug!(
            "Encoded scope block: {} records, {} roots, tOffset={}",
            records.len(),
            spans.len(),
            offset
        );

        Ok(EncodedScope {
            schema_url: source.schema_url.clone(),
            scope: source.scope.clone(),
            t_offset: offset,
            spans,
        })
    }

    /// Folds all paths into the oracle, then reports for each whether it
    /// crosses a rare branch. The oracle stays locked for the whole block.
    fn classify_branches(&self, state: &CodecState, paths: &[Vec<PathStep<'_>>]) -> Result<Vec<bool>> {
        let mut oracle = state.oracle()?;
        let visited: Vec<Vec<NodeId>> = paths.iter().map(|steps| oracle.observe(steps)).collect();
        if !self.config.anomaly_detection {
            return Ok(vec![false; visited.len()]);
        }
        let factor = self.config.rarity_factor;
        Ok(visited
            .iter()
            .map(|path| oracle.has_rare_branch(path, factor))
            .collect())
    }
}

/// Encodes a batch with a throwaway encoder.
///
/// # Errors
///
/// See [`Encoder::encode`].
pub fn encode(state: &CodecState, batch: &Batch, config: CodecConfig) -> Result<EncodeOutput> {
    Encoder::new(config)?.encode(state, batch)
}

/// Rejects batches containing records without a name.
fn validate(batch: &Batch) -> Result<()> {
    for (r, resource) in batch.resource_spans.iter().enumerate() {
        for (s, scope) in resource.scope_spans.iter().enumerate() {
            if let Some(i) = scope.records.iter().position(|rec| rec.name.is_none()) {
                return Err(Error::validation((r, s, i), "record has no name"));
            }
        }
    }
    Ok(())
}

fn stage_scope<'a>(scope: &'a ScopeBlock, stats: &mut EncodeStats) -> StagedScope<'a> {
    let offset = scope.time_offset().unwrap_or(0);
    let mut records = Vec::with_capacity(scope.records.len());
    let mut leaves = Vec::with_capacity(scope.records.len());

    for record in &scope.records {
        match stage_record(record, offset) {
            Ok((staged, leaf)) => {
                records.push(staged);
                leaves.push(leaf);
            }
            Err(e) => {
                warn!(
                    "Skipping record '{}': {}",
                    record.name.as_deref().unwrap_or_default(),
                    e
                );
                stats.skipped += 1;
            }
        }
    }

    StagedScope {
        source: scope,
        offset,
        records,
        leaves,
    }
}

fn stage_record(record: &Record, offset: u64) -> Result<(Staged<'_>, LeafRecord)> {
    let name = record
        .name
        .as_deref()
        .ok_or_else(|| Error::Encoding("record has no name".to_string()))?;

    let attrs = record
        .unique_attributes()
        .into_iter()
        .map(|(key, value)| Ok((key, value, value.canonical()?)))
        .collect::<Result<Vec<_>>>()?;

    for (key, value) in &record.remainder {
        if RESERVED_FIELDS.contains(&key.as_str()) {
            return Err(Error::Encoding(format!("field '{key}' is reserved")));
        }
        value.canonical()?;
    }

    let delta = |time: u64| {
        time.checked_sub(offset).ok_or_else(|| {
            Error::Encoding(format!("time {time} precedes scope offset {offset}"))
        })
    };
    let stun = delta(record.start_time)?;
    let etun = delta(record.end_time)?;

    let staged = Staged {
        name,
        coded: Vec::with_capacity(attrs.len()),
        attrs,
    };
    let leaf = LeafRecord {
        stun,
        etun,
        fields: record.remainder.clone(),
    };
    Ok((staged, leaf))
}

/// Resolves dictionary codes for every staged attribute and extends the
/// schemas. Returns the new dictionary entries and each name's key order.
fn assign_codes<'a>(
    state: &CodecState,
    staged: &mut [Vec<StagedScope<'a>>],
) -> Result<(Vec<DictionaryUpdate>, HashMap<&'a str, Vec<String>>)> {
    let mut dictionary = state.dictionary()?;
    let mut schema = state.schema()?;
    let mut updates = Vec::new();
    let mut schemas: HashMap<&'a str, Vec<String>> = HashMap::new();

    for scope in staged.iter_mut().flatten() {
        for record in &mut scope.records {
            for (raw, _, _) in &record.attrs {
                let (code, update) = dictionary.resolve_or_assign(raw)?;
                updates.extend(update);
                let key = coded_key(code);
                schema.record_schema(record.name, &key);
                record.coded.push(key);
            }
            schemas.entry(record.name).or_default();
        }
    }

    for (name, keys) in &mut schemas {
        *keys = schema.keys(name).to_vec();
    }
    Ok((updates, schemas))
}

fn tally_names<'a>(staged: &[Vec<StagedScope<'a>>]) -> NameTally<'a> {
    let mut counts: HashMap<&'a str, u64> = HashMap::new();
    let mut total = 0;
    for record in staged.iter().flatten().flat_map(|s| s.records.iter()) {
        *counts.entry(record.name).or_default() += 1;
        total += 1;
    }
    NameTally { counts, total }
}

fn path_steps<'a>(
    record: &'a Staged<'a>,
    name_value: &'a Value,
    name_canonical: &'a str,
    keys: &'a [String],
) -> Vec<PathStep<'a>> {
    let mut steps = Vec::with_capacity(keys.len() + 1);
    steps.push(PathStep {
        key: NAME_KEY,
        value: Some(name_value),
        canonical: name_canonical,
    });
    for key in keys {
        let step = match record.coded.iter().position(|c| c == key) {
            Some(i) => {
                let (_, value, canonical) = &record.attrs[i];
                PathStep {
                    key: key.as_str(),
                    value: Some(*value),
                    canonical: canonical.as_str(),
                }
            }
            None => PathStep {
                key: key.as_str(),
                value: None,
                canonical: "",
            },
        };
        steps.push(step);
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ResourceBlock, ScopeBlock};
    use crate::trie::TrieNode;

    /// Lists each leaf's path as `key=canonical` edges, `NONE` for absent.
    fn leaf_paths(nodes: &[TrieNode]) -> Vec<Vec<String>> {
        fn walk(node: &TrieNode, prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
            match node {
                TrieNode::Leaf(_) => out.push(prefix.clone()),
                TrieNode::Internal {
                    key,
                    value,
                    children,
                } => {
                    let shown = value
                        .as_value()
                        .map_or_else(|| "NONE".to_string(), |v| v.canonical().unwrap_or_default());
                    prefix.push(format!("{key}={shown}"));
                    for child in children {
                        walk(child, prefix, out);
                    }
                    prefix.pop();
                }
            }
        }
        let mut out = Vec::new();
        for node in nodes {
            walk(node, &mut Vec::new(), &mut out);
        }
        out
    }

    fn lossless() -> Encoder {
        Encoder::new(CodecConfig::lossless().with_seed(7)).unwrap()
    }

    fn scope_of(output: &EncodeOutput) -> &EncodedScope {
        &output.payload.resource_spans[0].scope_spans[0]
    }

    #[test]
    fn rejects_record_without_name() {
        let state = CodecState::new();
        let mut nameless = Record::new("x");
        nameless.name = None;
        let batch = Batch::single_scope(vec![Record::new("ok"), nameless]);

        let err = lossless().encode(&state, &batch).unwrap_err();
        assert!(matches!(err, Error::Validation { span: 1, .. }));
    }

    #[test]
    fn delta_encodes_timestamps() {
        let state = CodecState::new();
        let batch = Batch::single_scope(vec![
            Record::new("a").with_times(100, 110),
            Record::new("a").with_times(250, 260),
            Record::new("a").with_times(400, 410),
        ]);

        let output = lossless().encode(&state, &batch).unwrap();
        let scope = scope_of(&output);
        assert_eq!(scope.t_offset, 100);

        let TrieNode::Internal { children, .. } = &scope.spans[0] else {
            panic!("expected root node");
        };
        let stuns: Vec<u64> = children
            .iter()
            .filter_map(|c| match c {
                TrieNode::Leaf(leaf) => Some(leaf.stun),
                TrieNode::Internal { .. } => None,
            })
            .collect();
        assert_eq!(stuns, vec![0, 150, 300]);
    }

    #[test]
    fn shares_identical_prefixes() {
        let state = CodecState::new();
        let batch = Batch::single_scope(vec![
            Record::new("GET /users")
                .with_attribute("http.method", "GET")
                .with_attribute("http.status_code", 200i64)
                .with_field("spanId", "01"),
            Record::new("GET /users")
                .with_attribute("http.method", "GET")
                .with_attribute("http.status_code", 200i64)
                .with_field("spanId", "02"),
        ]);

        let output = lossless().encode(&state, &batch).unwrap();
        let scope = scope_of(&output);

        assert_eq!(scope.spans.len(), 1);
        assert_eq!(scope.spans[0].internal_count(), 3);
        assert_eq!(scope.spans[0].leaf_count(), 2);

        let paths = leaf_paths(&scope.spans);
        assert_eq!(paths[0], paths[1]);
        assert_eq!(
            paths[0],
            vec![
                r#"name="GET /users""#.to_string(),
                "attr_0=\"GET\"".to_string(),
                "attr_1=200".to_string(),
            ]
        );
    }

    #[test]
    fn one_root_per_name_in_first_seen_order() {
        let state = CodecState::new();
        let batch = Batch::single_scope(vec![
            Record::new("b"),
            Record::new("a"),
            Record::new("b"),
        ]);

        let output = lossless().encode(&state, &batch).unwrap();
        let names: Vec<String> = leaf_paths(&scope_of(&output).spans)
            .into_iter()
            .map(|p| p[0].clone())
            .collect();
        assert_eq!(names, vec!["name=\"b\"", "name=\"b\"", "name=\"a\""]);
        assert_eq!(scope_of(&output).spans.len(), 2);
    }

    #[test]
    fn missing_attribute_uses_absent_edge() {
        let state = CodecState::new();
        let batch = Batch::single_scope(vec![
            Record::new("op").with_attribute("a", 1i64),
            Record::new("op").with_attribute("b", 2i64),
        ]);

        let output = lossless().encode(&state, &batch).unwrap();
        let mut paths = leaf_paths(&scope_of(&output).spans);
        paths.sort();
        assert_eq!(
            paths,
            vec![
                vec!["name=\"op\"", "attr_0=1", "attr_1=NONE"],
                vec!["name=\"op\"", "attr_0=NONE", "attr_1=2"],
            ]
        );
    }

    #[test]
    fn structurally_equal_values_share_an_edge() {
        let state = CodecState::new();
        let left = Value::Map(vec![
            ("x".to_string(), Value::from(1i64)),
            ("y".to_string(), Value::from(2i64)),
        ]);
        let right = Value::Map(vec![
            ("y".to_string(), Value::from(2i64)),
            ("x".to_string(), Value::from(1i64)),
        ]);
        let batch = Batch::single_scope(vec![
            Record::new("op").with_attribute("obj", left),
            Record::new("op").with_attribute("obj", right),
        ]);

        let output = lossless().encode(&state, &batch).unwrap();
        assert_eq!(scope_of(&output).spans[0].internal_count(), 2);
    }

    #[test]
    fn updates_only_report_new_keys() {
        let state = CodecState::new();
        let mut encoder = lossless();
        let batch = Batch::single_scope(vec![Record::new("op")
            .with_attribute("service.name", "api")
            .with_attribute("http.method", "GET")]);

        let first = encoder.encode(&state, &batch).unwrap();
        assert_eq!(
            first.updates,
            vec![
                DictionaryUpdate::new("service.name", 0),
                DictionaryUpdate::new("http.method", 1),
            ]
        );

        let second = encoder.encode(&state, &batch).unwrap();
        assert!(second.updates.is_empty());
        assert_eq!(
            leaf_paths(&scope_of(&first).spans),
            leaf_paths(&scope_of(&second).spans)
        );
    }

    #[test]
    fn skips_unencodable_records() {
        let state = CodecState::new();
        let batch = Batch::single_scope(vec![
            Record::new("op").with_attribute("ratio", f64::NAN),
            Record::new("op").with_attribute("ok", 1i64),
            Record::new("op").with_field("stun", 5i64),
        ]);

        let output = lossless().encode(&state, &batch).unwrap();
        assert_eq!(output.stats.skipped, 2);
        assert_eq!(output.stats.retained, 1);
        // The skipped record never minted a code.
        assert_eq!(output.updates, vec![DictionaryUpdate::new("ok", 0)]);
    }

    #[test]
    fn skips_end_before_offset() {
        let state = CodecState::new();
        let batch = Batch::single_scope(vec![
            Record::new("op").with_times(100, 50),
            Record::new("op").with_times(200, 300),
        ]);

        let output = lossless().encode(&state, &batch).unwrap();
        assert_eq!(output.stats.skipped, 1);
        assert_eq!(scope_of(&output).t_offset, 100);
    }

    #[test]
    fn keeps_hierarchy_and_passthrough_fields() {
        let state = CodecState::new();
        let batch = Batch::new(vec![
            ResourceBlock::new(vec![
                ScopeBlock::new(vec![Record::new("a").with_times(5, 6)]).with_scope("lib-a"),
                ScopeBlock::new(vec![Record::new("b").with_times(9, 9)]),
            ])
            .with_resource("svc"),
            ResourceBlock::new(vec![]),
        ]);

        let output = lossless().encode(&state, &batch).unwrap();
        let payload = &output.payload;
        assert_eq!(payload.resource_spans.len(), 2);
        assert_eq!(payload.resource_spans[0].resource, Some(Value::from("svc")));
        assert_eq!(payload.resource_spans[0].scope_spans[0].scope, Some(Value::from("lib-a")));
        assert_eq!(payload.resource_spans[0].scope_spans[1].t_offset, 9);
        assert!(payload.resource_spans[1].scope_spans.is_empty());
    }

    #[test]
    fn canary_branch_always_retained() {
        for seed in 0..25u64 {
            let state = CodecState::new();
            let mut records: Vec<Record> = (0..99)
                .map(|i| Record::new("deploy").with_times(i, i + 1).with_attribute("env", "prod"))
                .collect();
            records.insert(
                usize::try_from(seed * 4).unwrap(),
                Record::new("deploy").with_times(500, 501).with_attribute("env", "canary"),
            );
            let batch = Batch::single_scope(records);

            let mut encoder = Encoder::new(CodecConfig::default().with_seed(seed)).unwrap();
            let output = encoder.encode(&state, &batch).unwrap();

            let canary_leaves = leaf_paths(&scope_of(&output).spans)
                .into_iter()
                .filter(|p| p.iter().any(|e| e.contains("canary")))
                .count();
            assert_eq!(canary_leaves, 1, "seed {seed}");
            assert!(output.stats.abnormal >= 1);
        }
    }

    #[test]
    fn rare_name_always_retained() {
        let state = CodecState::new();
        let mut records: Vec<Record> = (0..200).map(|i| Record::new("common").with_times(i, i)).collect();
        records.push(Record::new("rare").with_times(1000, 1000));
        let batch = Batch::single_scope(records);

        let mut encoder = Encoder::new(CodecConfig::default().with_retention(0.0).with_seed(3)).unwrap();
        let output = encoder.encode(&state, &batch).unwrap();

        let scope = scope_of(&output);
        assert_eq!(output.stats.retained, 1);
        assert_eq!(scope.spans.len(), 1);
        assert_eq!(leaf_paths(&scope.spans), vec![vec!["name=\"rare\"".to_string()]]);
    }

    #[test]
    fn sampling_keeps_about_half() {
        let mut total = 0usize;
        for seed in 0..20u64 {
            let state = CodecState::new();
            let records: Vec<Record> = (0..1000).map(|i| Record::new("op").with_times(i, i + 1)).collect();
            let batch = Batch::single_scope(records);

            let config = CodecConfig::default()
                .with_anomaly_detection(false)
                .with_seed(seed);
            let output = encode(&state, &batch, config).unwrap();
            assert_eq!(output.stats.retained + output.stats.sampled_out, 1000);
            total += output.stats.retained;
        }
        let mean = total / 20;
        assert!((450..=550).contains(&mean), "mean retained {mean}");
    }

    #[test]
    fn fully_sampled_branch_is_pruned() {
        let state = CodecState::new();
        let batch = Batch::single_scope(vec![Record::new("op").with_attribute("a", 1i64)]);

        let config = CodecConfig::default()
            .with_retention(0.0)
            .with_anomaly_detection(false);
        let pruned = encode(&state, &batch, config.clone()).unwrap();
        assert!(scope_of(&pruned).spans.is_empty());

        let kept = encode(&state, &batch, config.with_prune_empty_branches(false)).unwrap();
        assert_eq!(scope_of(&kept).spans[0].internal_count(), 2);
        assert_eq!(scope_of(&kept).spans[0].leaf_count(), 0);
    }

    #[test]
    fn concurrent_encoders_agree_on_codes() {
        let state = CodecState::new();
        let keys: Vec<String> = (0..50).map(|i| format!("key.{i}")).collect();

        let updates: Vec<Vec<DictionaryUpdate>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let state = &state;
                    let keys = &keys;
                    scope.spawn(move || {
                        let mut record = Record::new("op");
                        for key in keys.iter().skip(t * 5) {
                            record = record.with_attribute(key.clone(), 1i64);
                        }
                        let batch = Batch::single_scope(vec![record]);
                        encode(state, &batch, CodecConfig::lossless()).unwrap().updates
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut all: Vec<DictionaryUpdate> = updates.into_iter().flatten().collect();
        all.sort_by_key(|u| u.value);
        assert_eq!(all.len(), 50);
        for (i, update) in all.iter().enumerate() {
            assert_eq!(update.value as usize, i);
        }
        let snapshot = state.snapshot().unwrap();
        assert_eq!(snapshot.dictionary, all);
    }
}
