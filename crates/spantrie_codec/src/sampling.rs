//! Lossy thinning with anomaly exemption.
//!
//! Common record shapes compress through prefix sharing whether or not
//! their payloads are kept, so non-abnormal records keep their leaf with
//! probability `retention`. Records whose name or attribute branch is rare
//! are always kept.

use crate::config::CodecConfig;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Why a record was classified abnormal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbnormalReason {
    /// The record name is rare within the call.
    RareName,
    /// An attribute value along the record's path is rare.
    RareBranch,
}

/// Returns true if a name seen `count` times is rare among `total` records
/// spread over `distinct` names.
#[must_use]
pub const fn name_is_rare(total: u64, distinct: u64, count: u64, factor: u64) -> bool {
    if distinct == 0 || factor == 0 {
        return false;
    }
    total / distinct / factor >= count
}

/// Per-record keep/drop decisions.
#[derive(Debug, Clone)]
pub struct Sampler {
    retention: f64,
    rng: ChaCha8Rng,
}

impl Sampler {
    /// Creates a sampler from the configuration.
    #[must_use]
    pub fn new(config: &CodecConfig) -> Self {
        let rng = config
            .seed
            .map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64);
        Self {
            retention: config.retention.clamp(0.0, 1.0),
            rng,
        }
    }

    /// Decides whether a record keeps its leaf payload.
    pub fn keep(&mut self, abnormal: bool) -> bool {
        if abnormal || self.retention >= 1.0 {
            return true;
        }
        if self.retention <= 0.0 {
            return false;
        }
        self.rng.gen_bool(self.retention)
    }
}
