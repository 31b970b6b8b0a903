//! Generate command implementation.

use anyhow::Result;
use spantrie_codec::fixtures::{FixtureConfig, FixtureGenerator};
use tracing::info;

/// Runs the generate command.
pub fn run(output_path: &str, seed: u64, layout: (usize, usize, usize), rare_rate: f64) -> Result<()> {
    let (resources, scopes, records) = layout;
    if !(0.0..=1.0).contains(&rare_rate) {
        anyhow::bail!("--rare-rate must be within [0, 1], got {rare_rate}");
    }

    let config = FixtureConfig::default()
        .with_seed(seed)
        .with_layout(resources, scopes)
        .with_records_per_scope(records)
        .with_rare_rate(rare_rate);
    let batch = FixtureGenerator::new(config).generate();

    super::write_json(output_path, &batch, "batch", true)?;
    info!(
        "Generated {} records in {} resource blocks: {}",
        batch.record_count(),
        batch.resource_spans.len(),
        output_path
    );
    Ok(())
}
