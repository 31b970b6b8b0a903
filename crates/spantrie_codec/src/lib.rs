//! Prefix-trie compaction for span batches.
//!
//! This crate provides:
//! - An append-only attribute dictionary mapping raw keys to short codes
//! - Per-name schema tracking that fixes the trie level order
//! - A trie encoder with delta-encoded timestamps and rarity-aware sampling
//! - A decoder that rebuilds flat records and reports desyncs per record
//!
//! # Example
//!
//! ```rust,ignore
//! use spantrie_codec::{Batch, CodecConfig, CodecState, Decoder, Encoder};
//!
//! let state = CodecState::new();
//! let mut encoder = Encoder::new(CodecConfig::default())?;
//! let output = encoder.encode(&state, &batch)?;
//!
//! let mut decoder = Decoder::new();
//! let outcome = decoder.decode(&output.payload, &output.updates)?;
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]

pub mod builder;
pub mod config;
pub mod decoder;
pub mod dictionary;
pub mod encoder;
pub mod error;
pub mod fixtures;
pub mod oracle;
pub mod payload;
pub mod record;
pub mod sampling;
pub mod schema;
pub mod state;
pub mod trie;
pub mod value;

pub use config::CodecConfig;
pub use decoder::{DecodeOutcome, Decoder, RecordFailure};
pub use dictionary::{AttributeDictionary, DictionaryUpdate, MirroredDictionary};
pub use encoder::{encode, EncodeOutput, EncodeStats, Encoder};
pub use error::{Error, Result};
pub use payload::{compression_ratio, EncodedBatch, EncodedResource, EncodedScope};
pub use record::{Attribute, Batch, Record, ResourceBlock, ScopeBlock};
pub use schema::SchemaTracker;
pub use state::{CodecState, StateSnapshot};
pub use trie::{EdgeValue, LeafRecord, TrieNode};
pub use value::Value;
