//! Encode command implementation.

use anyhow::{Context, Result};
use spantrie_codec::{Batch, CodecConfig, CodecState, Encoder, StateSnapshot};
use std::path::Path;
use tracing::info;

/// Runs the encode command.
pub fn run(
    input_path: &str,
    output_path: &str,
    updates_path: &str,
    state_path: Option<&str>,
    config: CodecConfig,
) -> Result<()> {
    info!("Encoding batch: {}", input_path);

    let batch: Batch = super::read_json(input_path, "batch")?;
    let state = load_state(state_path)?;

    let mut encoder = Encoder::new(config).context("Invalid codec configuration")?;
    let output = encoder
        .encode(&state, &batch)
        .with_context(|| format!("Failed to encode {input_path}"))?;

    super::write_json(output_path, &output.payload, "payload", false)?;
    super::write_json(updates_path, &output.updates, "dictionary updates", true)?;

    info!(
        "Wrote {} retained records ({} abnormal, {} sampled out, {} skipped) to {}",
        output.stats.retained,
        output.stats.abnormal,
        output.stats.sampled_out,
        output.stats.skipped,
        output_path
    );
    info!("Wrote {} dictionary updates to {}", output.updates.len(), updates_path);

    if let Some(path) = state_path {
        let snapshot = state
            .snapshot()
            .context("Failed to capture encoder state")?
            .with_timestamp();
        snapshot
            .save(path)
            .with_context(|| format!("Failed to write state snapshot: {path}"))?;
        info!("State snapshot written to: {}", path);
    }

    Ok(())
}

fn load_state(path: Option<&str>) -> Result<CodecState> {
    match path {
        Some(path) if Path::new(path).exists() => {
            let snapshot = StateSnapshot::load(path)
                .with_context(|| format!("Failed to read state snapshot: {path}"))?;
            CodecState::restore(&snapshot)
                .with_context(|| format!("State snapshot is not usable: {path}"))
        }
        _ => Ok(CodecState::new()),
    }
}
