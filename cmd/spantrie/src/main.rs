//! Spantrie CLI - prefix-trie compaction for span batches.
//!
//! Commands:
//! - `spantrie generate` - Write a synthetic span batch
//! - `spantrie encode` - Encode a batch into a trie payload and dictionary updates
//! - `spantrie decode` - Rebuild a batch from a payload and dictionary updates
//! - `spantrie stats` - Report compression and sampling figures for a batch

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "spantrie")]
#[command(about = "Prefix-trie compaction codec for span batches")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Codec configuration file (YAML)
    #[arg(short, long, global = true, env = "SPANTRIE_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a synthetic span batch
    Generate {
        /// Output path for the batch
        #[arg(short, long, default_value = "batch.json")]
        output: String,

        /// Random seed
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Number of resource blocks
        #[arg(long, default_value_t = 2)]
        resources: usize,

        /// Scope blocks per resource
        #[arg(long, default_value_t = 2)]
        scopes: usize,

        /// Records per scope block
        #[arg(long, default_value_t = 100)]
        records: usize,

        /// Share of records carrying unusual values
        #[arg(long, default_value_t = 0.02)]
        rare_rate: f64,
    },

    /// Encode a span batch
    Encode {
        /// Path to the batch
        #[arg(short, long, default_value = "batch.json")]
        input: String,

        /// Output path for the encoded payload
        #[arg(short, long, default_value = "payload.json")]
        output: String,

        /// Output path for the dictionary updates
        #[arg(short, long, default_value = "updates.json")]
        updates: String,

        /// Encoder state snapshot, loaded if present and saved afterwards
        #[arg(short, long)]
        state: Option<String>,

        /// Override the sampling seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override the retention probability
        #[arg(long)]
        retention: Option<f64>,
    },

    /// Decode an encoded payload
    Decode {
        /// Path to the encoded payload
        #[arg(short, long, default_value = "payload.json")]
        input: String,

        /// Path to the dictionary updates
        #[arg(short, long, default_value = "updates.json")]
        updates: String,

        /// Output path for the rebuilt batch
        #[arg(short, long, default_value = "decoded.json")]
        output: String,

        /// Decoder dictionary snapshot, loaded if present and saved afterwards
        #[arg(short, long)]
        dictionary: Option<String>,

        /// Exit with an error if any record failed to decode
        #[arg(long)]
        strict: bool,
    },

    /// Report compression and sampling statistics
    Stats {
        /// Path to the batch
        #[arg(short, long, default_value = "batch.json")]
        input: String,

        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate {
            output,
            seed,
            resources,
            scopes,
            records,
            rare_rate,
        } => commands::generate::run(&output, seed, (resources, scopes, records), rare_rate),
        Commands::Encode {
            input,
            output,
            updates,
            state,
            seed,
            retention,
        } => {
            let config = commands::override_config(config, seed, retention);
            commands::encode::run(&input, &output, &updates, state.as_deref(), config)
        }
        Commands::Decode {
            input,
            updates,
            output,
            dictionary,
            strict,
        } => commands::decode::run(&input, &updates, &output, dictionary.as_deref(), strict),
        Commands::Stats { input, json } => commands::stats::run(&input, config, json),
    }
}
