//! Encoded trie forest.
//!
//! A node is either an internal edge (`key`, `value`, children) or a
//! terminal leaf holding the residual record payload. On the wire an
//! internal node is `{"AN": key, "AV": value, "Son": [...]}` and a leaf is a
//! plain object `{"stun": .., "etun": .., ...}` without `Son`. An attribute
//! the record did not carry is encoded by omitting `AV`, which keeps it
//! distinct from a present `null`.

use crate::value::Value;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Wire key of an internal node's attribute name.
pub const KEY_FIELD: &str = "AN";
/// Wire key of an internal node's attribute value.
pub const VALUE_FIELD: &str = "AV";
/// Wire key of an internal node's children.
pub const CHILDREN_FIELD: &str = "Son";
/// Leaf field holding the start time relative to the scope offset.
pub const START_FIELD: &str = "stun";
/// Leaf field holding the end time relative to the scope offset.
pub const END_FIELD: &str = "etun";
/// Discriminator key of root nodes.
pub const NAME_KEY: &str = "name";

/// Field names a record remainder may not use, since leaves and internal
/// nodes share one object namespace.
pub const RESERVED_FIELDS: [&str; 3] = [START_FIELD, END_FIELD, CHILDREN_FIELD];

/// The value carried by an edge.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeValue {
    /// The record did not carry this attribute.
    Absent,
    /// The attribute value.
    Present(Value),
}

impl EdgeValue {
    /// Returns the present value, if any.
    #[must_use]
    pub const fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Absent => None,
            Self::Present(v) => Some(v),
        }
    }
}

impl From<Option<&Value>> for EdgeValue {
    fn from(value: Option<&Value>) -> Self {
        value.map_or(Self::Absent, |v| Self::Present(v.clone()))
    }
}

/// The residual payload of one record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LeafRecord {
    /// Start time minus the scope's time offset.
    pub stun: u64,
    /// End time minus the scope's time offset.
    pub etun: u64,
    /// Remaining record fields.
    pub fields: BTreeMap<String, Value>,
}

/// One node of an encoded trie.
#[derive(Debug, Clone, PartialEq)]
pub enum TrieNode {
    /// An attribute edge.
    Internal {
        /// `name` for roots, `attr_<code>` below.
        key: String,
        /// The edge value.
        value: EdgeValue,
        /// Child nodes; leaves come before deeper edges.
        children: Vec<TrieNode>,
    },
    /// A terminal record payload.
    Leaf(LeafRecord),
}

impl TrieNode {
    /// Returns the number of leaves under (and including) this node.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Internal { children, .. } => children.iter().map(Self::leaf_count).sum(),
        }
    }

    /// Returns the number of internal nodes under (and including) this node.
    #[must_use]
    pub fn internal_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 0,
            Self::Internal { children, .. } => {
                1 + children.iter().map(Self::internal_count).sum::<usize>()
            }
        }
    }

    /// Renders an indented outline of the subtree, one node per line.
    ///
    /// Values are shown in canonical form; absent values as `NONE`.
    #[must_use]
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.write_outline(0, &mut out);
        out
    }

    fn write_outline(&self, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        match self {
            Self::Internal {
                key,
                value,
                children,
            } => {
                let shown = match value {
                    EdgeValue::Absent => "NONE".to_string(),
                    EdgeValue::Present(v) => v.canonical().unwrap_or_else(|_| "<invalid>".to_string()),
                };
                let _ = writeln!(out, "{indent}{key}={shown}");
                for child in children {
                    child.write_outline(depth + 1, out);
                }
            }
            Self::Leaf(leaf) => {
                let _ = write!(out, "{indent}leaf stun={} etun={}", leaf.stun, leaf.etun);
                for key in leaf.fields.keys() {
                    let _ = write!(out, " {key}");
                }
                out.push('\n');
            }
        }
    }

    fn from_value(value: Value) -> Result<Self, String> {
        let entries = match value {
            Value::Map(entries) => entries,
            other => return Err(format!("trie node must be an object, got {other:?}")),
        };

        if entries.iter().any(|(k, _)| k == CHILDREN_FIELD) {
            let mut key = None;
            let mut edge = EdgeValue::Absent;
            let mut children = Vec::new();
            for (k, v) in entries {
                match k.as_str() {
                    KEY_FIELD => match v {
                        Value::String(s) => key = Some(s),
                        other => return Err(format!("node key must be a string, got {other:?}")),
                    },
                    VALUE_FIELD => edge = EdgeValue::Present(v),
                    CHILDREN_FIELD => match v {
                        Value::List(items) => {
                            children = items
                                .into_iter()
                                .map(Self::from_value)
                                .collect::<Result<_, _>>()?;
                        }
                        other => return Err(format!("node children must be a list, got {other:?}")),
                    },
                    other => return Err(format!("unexpected field '{other}' on trie node")),
                }
            }
            let key = key.ok_or_else(|| "trie node without key".to_string())?;
            return Ok(Self::Internal {
                key,
                value: edge,
                children,
            });
        }

        let mut leaf = LeafRecord::default();
        let mut have_start = false;
        let mut have_end = false;
        for (k, v) in entries {
            match k.as_str() {
                START_FIELD => {
                    leaf.stun = v.as_u64().ok_or("leaf stun must be an unsigned integer")?;
                    have_start = true;
                }
                END_FIELD => {
                    leaf.etun = v.as_u64().ok_or("leaf etun must be an unsigned integer")?;
                    have_end = true;
                }
                _ => {
                    leaf.fields.insert(k, v);
                }
            }
        }
        if !(have_start && have_end) {
            return Err("leaf without stun/etun".to_string());
        }
        Ok(Self::Leaf(leaf))
    }
}

impl Serialize for TrieNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Internal {
                key,
                value,
                children,
            } => {
                let len = if value.as_value().is_some() { 3 } else { 2 };
                let mut map = serializer.serialize_map(Some(len))?;
                map.serialize_entry(KEY_FIELD, key)?;
                if let EdgeValue::Present(v) = value {
                    map.serialize_entry(VALUE_FIELD, v)?;
                }
                map.serialize_entry(CHILDREN_FIELD, children)?;
                map.end()
            }
            Self::Leaf(leaf) => {
                let mut map = serializer.serialize_map(Some(leaf.fields.len() + 2))?;
                map.serialize_entry(START_FIELD, &leaf.stun)?;
                map.serialize_entry(END_FIELD, &leaf.etun)?;
                for (k, v) in &leaf.fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for TrieNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TrieNode {
        let mut fields = BTreeMap::new();
        fields.insert("spanId".to_string(), Value::from("01"));
        TrieNode::Internal {
            key: NAME_KEY.to_string(),
            value: EdgeValue::Present(Value::from("GET /users")),
            children: vec![TrieNode::Internal {
                key: "attr_0".to_string(),
                value: EdgeValue::Absent,
                children: vec![TrieNode::Leaf(LeafRecord {
                    stun: 0,
                    etun: 50,
                    fields,
                })],
            }],
        }
    }

    #[test]
    fn wire_format() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert_eq!(
            json,
            r#"{"AN":"name","AV":"GET /users","Son":[{"AN":"attr_0","Son":[{"stun":0,"etun":50,"spanId":"01"}]}]}"#
        );
    }

    #[test]
    fn wire_roundtrip() {
        let node = sample();
        let json = serde_json::to_string(&node).unwrap();
        let parsed: TrieNode = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, node);
    }

    #[test]
    fn present_null_differs_from_absent() {
        let json = r#"{"AN":"attr_1","AV":null,"Son":[]}"#;
        let node: TrieNode = serde_json::from_str(json).unwrap();
        match node {
            TrieNode::Internal { value, .. } => assert_eq!(value, EdgeValue::Present(Value::Null)),
            TrieNode::Leaf(_) => panic!("expected internal node"),
        }
    }

    #[test]
    fn string_none_is_an_ordinary_value() {
        let json = r#"{"AN":"attr_1","AV":"NONE","Son":[]}"#;
        let node: TrieNode = serde_json::from_str(json).unwrap();
        match node {
            TrieNode::Internal { value, .. } => {
                assert_eq!(value, EdgeValue::Present(Value::from("NONE")));
            }
            TrieNode::Leaf(_) => panic!("expected internal node"),
        }
    }

    #[test]
    fn rejects_leaf_without_times() {
        let result = serde_json::from_str::<TrieNode>(r#"{"spanId":"01"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn counts() {
        let node = sample();
        assert_eq!(node.leaf_count(), 1);
        assert_eq!(node.internal_count(), 2);
    }

    #[test]
    fn outline_snapshot() {
        insta::assert_snapshot!(sample().outline().trim_end(), @r###"
        name="GET /users"
          attr_0=NONE
            leaf stun=0 etun=50 spanId
        "###);
    }
}
