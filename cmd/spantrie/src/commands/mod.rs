//! Command implementations.

pub mod decode;
pub mod encode;
pub mod generate;
pub mod stats;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use spantrie_codec::CodecConfig;
use std::fs;
use tracing::debug;

/// Loads the codec configuration, falling back to defaults.
pub fn load_config(path: Option<&str>) -> Result<CodecConfig> {
    let Some(path) = path else {
        return Ok(CodecConfig::default());
    };
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read config file: {path}"))?;
    let config: CodecConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {path}"))?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {path}"))?;
    debug!("Loaded codec configuration from {}", path);
    Ok(config)
}

/// Applies command-line overrides to a configuration.
pub fn override_config(mut config: CodecConfig, seed: Option<u64>, retention: Option<f64>) -> CodecConfig {
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    if let Some(retention) = retention {
        config = config.with_retention(retention);
    }
    config
}

/// Reads a JSON document.
pub fn read_json<T: DeserializeOwned>(path: &str, what: &str) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {what}: {path}"))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {what}: {path}"))
}

/// Writes a JSON document, compact or pretty.
pub fn write_json<T: Serialize>(path: &str, value: &T, what: &str, pretty: bool) -> Result<()> {
    let content = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .with_context(|| format!("Failed to serialize {what}"))?;
    fs::write(path, content).with_context(|| format!("Failed to write {what}: {path}"))
}
