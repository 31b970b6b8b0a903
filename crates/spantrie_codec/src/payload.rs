//! Encoded payload document.
//!
//! Mirrors the resource/scope hierarchy of a [`Batch`], with each scope's
//! flat record list replaced by a trie forest and a delta-encoding base
//! time (`tOffset`).

use crate::error::Result;
use crate::record::Batch;
use crate::trie::TrieNode;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// An encoded scope block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedScope {
    /// Schema URL of the scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_url: Option<String>,
    /// Instrumentation scope, passed through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Value>,
    /// Minimum start time over the scope's records.
    #[serde(default)]
    pub t_offset: u64,
    /// One trie root per distinct record name.
    #[serde(default)]
    pub spans: Vec<TrieNode>,
}

/// An encoded resource block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedResource {
    /// Schema URL of the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_url: Option<String>,
    /// Resource description, passed through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
    /// Encoded scope blocks.
    #[serde(default)]
    pub scope_spans: Vec<EncodedScope>,
}

/// The encoder's output document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedBatch {
    /// Encoded resource blocks.
    #[serde(default)]
    pub resource_spans: Vec<EncodedResource>,
}

impl EncodedBatch {
    /// Returns an iterator over all trie roots.
    pub fn roots(&self) -> impl Iterator<Item = &TrieNode> {
        self.resource_spans
            .iter()
            .flat_map(|r| r.scope_spans.iter())
            .flat_map(|s| s.spans.iter())
    }

    /// Returns the number of leaf payloads (retained records).
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.roots().map(TrieNode::leaf_count).sum()
    }

    /// Returns the number of internal trie nodes.
    #[must_use]
    pub fn internal_count(&self) -> usize {
        self.roots().map(TrieNode::internal_count).sum()
    }

    /// Parses a payload from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is not a valid payload.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the payload to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Returns encoded size divided by original size, both as compact JSON.
///
/// # Errors
///
/// Returns an error if either document fails to serialize.
#[allow(clippy::cast_precision_loss)]
pub fn compression_ratio(original: &Batch, encoded: &EncodedBatch) -> Result<f64> {
    let original_len = original.to_json()?.len();
    let encoded_len = encoded.to_json()?.len();
    if original_len == 0 {
        return Ok(1.0);
    }
    Ok(encoded_len as f64 / original_len as f64)
}
