//! Error types for codec operations.

use thiserror::Error;

/// Errors that can occur while encoding or decoding span batches.
#[derive(Debug, Error)]
pub enum Error {
    /// A record in the input batch is malformed (e.g. it has no name).
    ///
    /// Fatal to the whole encode call.
    #[error("invalid record at resource {resource}, scope {scope}, span {span}: {reason}")]
    Validation {
        /// Index of the resource block.
        resource: usize,
        /// Index of the scope block within the resource.
        scope: usize,
        /// Index of the span within the scope.
        span: usize,
        /// Why the record was rejected.
        reason: String,
    },

    /// A value could not be canonicalized (e.g. a non-finite float).
    ///
    /// The encoder skips the affected record and keeps going.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A payload references an attribute code the mirrored dictionary does
    /// not know about. Scoped to the affected record.
    #[error("dictionary desync: no entry for attr_{code}")]
    DictionaryDesync {
        /// The unresolvable code.
        code: u32,
    },

    /// A dictionary update tries to rebind an existing key or code.
    #[error("dictionary conflict for '{key}': code {existing} already bound, update says {incoming}")]
    DictionaryConflict {
        /// The raw attribute key.
        key: String,
        /// Code currently held by the mirrored dictionary.
        existing: u32,
        /// Code carried by the offending update.
        incoming: u32,
    },

    /// A decoded record could not be rebuilt from its trie path.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// The codec configuration is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A persisted state snapshot does not match its own fingerprint.
    #[error("snapshot fingerprint mismatch: stored {stored}, computed {computed}")]
    SnapshotMismatch {
        /// Fingerprint recorded in the snapshot.
        stored: String,
        /// Fingerprint recomputed from the snapshot contents.
        computed: String,
    },

    /// A shared state lock was poisoned by a panicking holder.
    #[error("codec state poisoned: {0}")]
    StatePoisoned(&'static str),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Creates a validation error for the record at the given position.
    pub fn validation(position: (usize, usize, usize), reason: impl Into<String>) -> Self {
        Self::Validation {
            resource: position.0,
            scope: position.1,
            span: position.2,
            reason: reason.into(),
        }
    }

    /// Returns true if this error only affects a single record.
    #[must_use]
    pub const fn is_record_scoped(&self) -> bool {
        matches!(
            self,
            Self::Encoding(_) | Self::DictionaryDesync { .. } | Self::MalformedRecord(_)
        )
    }
}

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, Error>;
