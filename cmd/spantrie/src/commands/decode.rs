//! Decode command implementation.

use anyhow::{Context, Result};
use spantrie_codec::{Decoder, DictionaryUpdate, EncodedBatch, StateSnapshot};
use std::path::Path;
use tracing::{info, warn};

/// Runs the decode command.
pub fn run(
    input_path: &str,
    updates_path: &str,
    output_path: &str,
    dictionary_path: Option<&str>,
    strict: bool,
) -> Result<()> {
    info!("Decoding payload: {}", input_path);

    let payload: EncodedBatch = super::read_json(input_path, "payload")?;
    let updates: Vec<DictionaryUpdate> = if Path::new(updates_path).exists() {
        super::read_json(updates_path, "dictionary updates")?
    } else {
        warn!("No dictionary updates at {}, decoding with known entries only", updates_path);
        Vec::new()
    };

    let mut decoder = match dictionary_path {
        Some(path) if Path::new(path).exists() => {
            let snapshot = StateSnapshot::load(path)
                .with_context(|| format!("Failed to read dictionary snapshot: {path}"))?;
            Decoder::from_snapshot(&snapshot)
                .with_context(|| format!("Dictionary snapshot is not usable: {path}"))?
        }
        _ => Decoder::new(),
    };

    let outcome = decoder
        .decode(&payload, &updates)
        .with_context(|| format!("Failed to decode {input_path}"))?;

    for failure in &outcome.failures {
        warn!(
            "Record '{}' (resource {}, scope {}) not decoded: {}",
            failure.name.as_deref().unwrap_or("?"),
            failure.resource,
            failure.scope,
            failure.error
        );
    }

    super::write_json(output_path, &outcome.batch, "batch", true)?;
    info!(
        "Decoded {} records to {}",
        outcome.batch.record_count(),
        output_path
    );

    if let Some(path) = dictionary_path {
        decoder
            .snapshot()
            .with_timestamp()
            .save(path)
            .with_context(|| format!("Failed to write dictionary snapshot: {path}"))?;
        info!("Dictionary snapshot written to: {}", path);
    }

    if strict && outcome.is_partial() {
        anyhow::bail!(
            "{} records could not be decoded",
            outcome.failures.len()
        );
    }

    Ok(())
}
