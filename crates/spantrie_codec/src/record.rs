//! Span record data model.
//!
//! Records are generic span-like entities grouped into scope and resource
//! blocks, mirroring the shape of OTLP/JSON trace exports. Everything the
//! codec does not interpret (identifiers, status, events, links) lives in
//! the record's opaque remainder and is passed through untouched.

use crate::error::Result;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single key/value attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Raw attribute key.
    pub key: String,
    /// Attribute value.
    pub value: Value,
}

impl Attribute {
    /// Creates a new attribute.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One span-like record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    /// The record name. Required; a record without one is rejected by the
    /// encoder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Start time in nanoseconds since Unix epoch.
    #[serde(rename = "startTimeUnixNano", default, with = "nanos")]
    pub start_time: u64,
    /// End time in nanoseconds since Unix epoch.
    #[serde(rename = "endTimeUnixNano", default, with = "nanos")]
    pub end_time: u64,
    /// Attributes in the order they were recorded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
    /// All other fields, passed through untouched.
    #[serde(flatten)]
    pub remainder: BTreeMap<String, Value>,
}

impl Record {
    /// Creates a new record with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Sets start and end time.
    #[must_use]
    pub const fn with_times(mut self, start_time: u64, end_time: u64) -> Self {
        self.start_time = start_time;
        self.end_time = end_time;
        self
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.push(Attribute::new(key, value));
        self
    }

    /// Adds an opaque remainder field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.remainder.insert(key.into(), value.into());
        self
    }

    /// Gets an attribute value by key. The last occurrence wins.
    #[must_use]
    pub fn get_attribute(&self, key: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .rev()
            .find(|a| a.key == key)
            .map(|a| &a.value)
    }

    /// Returns attributes with duplicate keys collapsed.
    ///
    /// Keys keep the position of their first occurrence and take the value
    /// of their last occurrence.
    #[must_use]
    pub fn unique_attributes(&self) -> Vec<(&str, &Value)> {
        let mut out: Vec<(&str, &Value)> = Vec::with_capacity(self.attributes.len());
        for attr in &self.attributes {
            match out.iter_mut().find(|(k, _)| *k == attr.key) {
                Some(slot) => slot.1 = &attr.value,
                None => out.push((&attr.key, &attr.value)),
            }
        }
        out
    }
}

/// A collection of records sharing an instrumentation scope.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeBlock {
    /// Schema URL of the scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_url: Option<String>,
    /// Instrumentation scope, passed through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Value>,
    /// The records.
    #[serde(rename = "spans", default)]
    pub records: Vec<Record>,
}

impl ScopeBlock {
    /// Creates a scope block holding the given records.
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    /// Sets the instrumentation scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<Value>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Returns the minimum start time over all records, if any.
    #[must_use]
    pub fn time_offset(&self) -> Option<u64> {
        self.records.iter().map(|r| r.start_time).min()
    }
}

/// A collection of scope blocks sharing resource attributes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceBlock {
    /// Schema URL of the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_url: Option<String>,
    /// Resource description, passed through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
    /// The scope blocks.
    #[serde(default)]
    pub scope_spans: Vec<ScopeBlock>,
}

impl ResourceBlock {
    /// Creates a resource block holding the given scope blocks.
    #[must_use]
    pub fn new(scope_spans: Vec<ScopeBlock>) -> Self {
        Self {
            scope_spans,
            ..Self::default()
        }
    }

    /// Sets the resource description.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<Value>) -> Self {
        self.resource = Some(resource.into());
        self
    }
}

/// A batch of resource blocks, the unit of one encode call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    /// The resource blocks.
    #[serde(default)]
    pub resource_spans: Vec<ResourceBlock>,
}

impl Batch {
    /// Creates a batch from resource blocks.
    #[must_use]
    pub const fn new(resource_spans: Vec<ResourceBlock>) -> Self {
        Self { resource_spans }
    }

    /// Creates a batch with a single resource and scope holding `records`.
    #[must_use]
    pub fn single_scope(records: Vec<Record>) -> Self {
        Self::new(vec![ResourceBlock::new(vec![ScopeBlock::new(records)])])
    }

    /// Returns an iterator over all records in the batch.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.resource_spans
            .iter()
            .flat_map(|r| r.scope_spans.iter())
            .flat_map(|s| s.records.iter())
    }

    /// Returns the total number of records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records().count()
    }

    /// Parses a batch from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the batch to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Nanosecond timestamps, written as decimal strings and read from either
/// strings or numbers (the OTLP/JSON convention).
mod nanos {
    use crate::value::Value;
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let value = Value::deserialize(deserializer)?;
        value
            .as_u64()
            .ok_or_else(|| de::Error::custom(format!("invalid nanosecond timestamp: {value:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_builder() {
        let record = Record::new("GET /users")
            .with_times(100, 150)
            .with_attribute("http.method", "GET")
            .with_field("spanId", "abc");

        assert_eq!(record.name.as_deref(), Some("GET /users"));
        assert_eq!(record.start_time, 100);
        assert_eq!(record.get_attribute("http.method"), Some(&Value::from("GET")));
        assert_eq!(record.remainder.get("spanId"), Some(&Value::from("abc")));
    }

    #[test]
    fn duplicate_attributes_last_seen_wins() {
        let record = Record::new("op")
            .with_attribute("a", 1i64)
            .with_attribute("b", 2i64)
            .with_attribute("a", 3i64);

        let unique = record.unique_attributes();
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0], ("a", &Value::from(3i64)));
        assert_eq!(unique[1], ("b", &Value::from(2i64)));
        assert_eq!(record.get_attribute("a"), Some(&Value::from(3i64)));
    }

    #[test]
    fn parses_otlp_style_json() {
        let json = r#"{
            "resourceSpans": [{
                "resource": {"attributes": []},
                "scopeSpans": [{
                    "scope": {"name": "lib"},
                    "spans": [{
                        "traceId": "5b8efff798038103d269b633813fc60c",
                        "name": "GET /users",
                        "startTimeUnixNano": "1544712660000000000",
                        "endTimeUnixNano": 1544712661000000000,
                        "attributes": [{"key": "http.method", "value": {"stringValue": "GET"}}]
                    }]
                }]
            }]
        }"#;

        let batch = Batch::from_json(json).unwrap();
        assert_eq!(batch.record_count(), 1);

        let record = batch.records().next().unwrap();
        assert_eq!(record.start_time, 1_544_712_660_000_000_000);
        assert_eq!(record.end_time, 1_544_712_661_000_000_000);
        assert_eq!(record.attributes[0].key, "http.method");
        assert!(record.remainder.contains_key("traceId"));
        assert!(!record.remainder.contains_key("name"));
    }

    #[test]
    fn record_without_name_parses() {
        let record: Record = serde_json::from_str(r#"{"startTimeUnixNano": 5}"#).unwrap();
        assert!(record.name.is_none());
        assert_eq!(record.start_time, 5);
    }

    #[test]
    fn json_roundtrip() {
        let batch = Batch::single_scope(vec![Record::new("op")
            .with_times(1, 2)
            .with_attribute("k", Value::List(vec![Value::from(1i64)]))
            .with_field("kind", 2i64)]);

        let json = batch.to_json().unwrap();
        assert!(json.contains(r#""startTimeUnixNano":"1""#));
        assert_eq!(Batch::from_json(&json).unwrap(), batch);
    }

    #[test]
    fn time_offset_is_minimum_start() {
        let scope = ScopeBlock::new(vec![
            Record::new("a").with_times(250, 300),
            Record::new("b").with_times(100, 120),
            Record::new("c").with_times(400, 401),
        ]);
        assert_eq!(scope.time_offset(), Some(100));
        assert_eq!(ScopeBlock::default().time_offset(), None);
    }
}
