//! CLI entry point for the telemetry pipeline.
//!
//! Runs the decode → correct → merge → format chain over a JSON file of raw
//! packets and prints the rendered records, for inspecting device data
//! without the surrounding retrieval service.
//!
//! # Usage
//!
//! ```bash
//! telemetry-pipeline packets.json --topic acc --format dict_array --correction
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;
use telemetry_pipeline::{pipeline, OutputFormat, PipelineOptions, Topic};

#[derive(Parser)]
#[command(name = "telemetry-pipeline")]
#[command(about = "Decode, correct, merge, and format raw telemetry packets", long_about = None)]
struct Cli {
    /// Path to a JSON array of raw packet objects
    input: PathBuf,

    /// Packet topic: acc, gyr, ain, fft, or data
    #[arg(long)]
    topic: Topic,

    /// Output shape: map, tuple_array, dict_array, combined_tuple, combined_dict
    #[arg(long, default_value = "map")]
    format: OutputFormat,

    /// Emit one record per packet instead of hour buckets
    #[arg(long)]
    no_merge: bool,

    /// Repair late-timestamp glitches (high-frequency topics only)
    #[arg(long)]
    correction: bool,

    /// Recalibrate sample spacing to observed packet deltas
    #[arg(long)]
    auto_rate: bool,

    /// Pretty-print the output
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let raw = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let packets: Vec<Value> =
        serde_json::from_str(&raw).context("input must be a JSON array of packet objects")?;

    let options = PipelineOptions {
        format: cli.format,
        merge: !cli.no_merge,
        enable_correction: cli.correction,
        auto_rate: cli.auto_rate,
    };
    let records = pipeline::run(cli.topic, &packets, &options)?;

    let output = if cli.pretty {
        serde_json::to_string_pretty(&records)?
    } else {
        serde_json::to_string(&records)?
    };
    println!("{output}");
    Ok(())
}
