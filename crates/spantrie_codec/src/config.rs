//! Encoder configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Configuration for trie encoding and sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Probability that a non-abnormal record keeps its leaf payload.
    pub retention: f64,
    /// Whether rare names and branches are exempt from sampling.
    pub anomaly_detection: bool,
    /// Divisor in the rarity tests (`total / k / factor >= count`).
    pub rarity_factor: u64,
    /// Random seed for deterministic sampling. Seeded from entropy if unset.
    pub seed: Option<u64>,
    /// Whether internal nodes left without leaves are dropped from output.
    pub prune_empty_branches: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            retention: 0.5,
            anomaly_detection: true,
            rarity_factor: 10,
            seed: None,
            prune_empty_branches: true,
        }
    }
}

impl CodecConfig {
    /// Creates a configuration that keeps every record.
    #[must_use]
    pub fn lossless() -> Self {
        Self::default().with_retention(1.0)
    }

    /// Sets the retention probability for non-abnormal records.
    #[must_use]
    pub const fn with_retention(mut self, retention: f64) -> Self {
        self.retention = retention;
        self
    }

    /// Enables or disables anomaly detection.
    #[must_use]
    pub const fn with_anomaly_detection(mut self, enabled: bool) -> Self {
        self.anomaly_detection = enabled;
        self
    }

    /// Sets the rarity factor.
    #[must_use]
    pub const fn with_rarity_factor(mut self, factor: u64) -> Self {
        self.rarity_factor = factor;
        self
    }

    /// Sets the random seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enables or disables pruning of leafless branches.
    #[must_use]
    pub const fn with_prune_empty_branches(mut self, prune: bool) -> Self {
        self.prune_empty_branches = prune;
        self
    }

    /// Returns true if every record is kept regardless of rarity.
    #[must_use]
    pub fn is_lossless(&self) -> bool {
        self.retention >= 1.0
    }

    /// Checks that all settings are in range.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if retention is outside `[0, 1]` or the
    /// rarity factor is zero.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.retention) {
            return Err(Error::InvalidConfig(format!(
                "retention must be within [0, 1], got {}",
                self.retention
            )));
        }
        if self.rarity_factor == 0 {
            return Err(Error::InvalidConfig(
                "rarity_factor must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
