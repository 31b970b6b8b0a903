//! Stats command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use spantrie_codec::{compression_ratio, Batch, CodecConfig, CodecState, EncodeStats, Encoder};
use tracing::info;

#[derive(Serialize)]
struct Report {
    #[serde(flatten)]
    stats: EncodeStats,
    dictionary_entries: usize,
    trie_nodes: usize,
    leaves: usize,
    compression_ratio: f64,
}

/// Runs the stats command.
pub fn run(input_path: &str, config: CodecConfig, json: bool) -> Result<()> {
    info!("Encoding batch for statistics: {}", input_path);

    let batch: Batch = super::read_json(input_path, "batch")?;
    let state = CodecState::new();
    let mut encoder = Encoder::new(config).context("Invalid codec configuration")?;
    let output = encoder
        .encode(&state, &batch)
        .with_context(|| format!("Failed to encode {input_path}"))?;

    let report = Report {
        stats: output.stats,
        dictionary_entries: output.updates.len(),
        trie_nodes: output.payload.internal_count(),
        leaves: output.payload.leaf_count(),
        compression_ratio: compression_ratio(&batch, &output.payload)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("records in:          {}", report.stats.records_in);
    println!("retained:            {}", report.stats.retained);
    println!("abnormal:            {}", report.stats.abnormal);
    println!("sampled out:         {}", report.stats.sampled_out);
    println!("skipped:             {}", report.stats.skipped);
    println!("dictionary entries:  {}", report.dictionary_entries);
    println!("trie nodes:          {}", report.trie_nodes);
    println!("leaves:              {}", report.leaves);
    println!("compression ratio:   {:.3}", report.compression_ratio);
    Ok(())
}
