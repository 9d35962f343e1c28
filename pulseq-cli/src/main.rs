use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use pulseq_rs::{variable::VariableValue, Sequence};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Print a description of a sequence saved as JSON
    Describe { sequence: PathBuf },
    /// Build a sequence saved as JSON, with variable values read from another JSON file
    Build {
        sequence: PathBuf,
        /// A JSON object mapping each variable name to a number or an array of numbers
        #[arg(short, long)]
        values: PathBuf,
        /// Print the built sequence as JSON rather than as a description
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Describe { sequence } => handle_describe(&sequence)?,
        Command::Build {
            sequence,
            values,
            json,
        } => handle_build(&sequence, &values, json)?,
    };

    Ok(())
}

fn read_sequence(path: &Path) -> anyhow::Result<Sequence> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read sequence from {}.", path.display()))?;
    Sequence::from_json(&json)
        .with_context(|| format!("Failed to load sequence from {}.", path.display()))
}

fn handle_describe(path: &Path) -> anyhow::Result<()> {
    let sequence = read_sequence(path)?;
    print!("{sequence}");
    Ok(())
}

fn handle_build(path: &Path, values_path: &Path, json: bool) -> anyhow::Result<()> {
    let sequence = read_sequence(path)?;
    let values = fs::read_to_string(values_path)
        .with_context(|| format!("Failed to read values from {}.", values_path.display()))?;
    let values: HashMap<String, VariableValue> = serde_json::from_str(&values)
        .with_context(|| format!("Failed to parse values from {}.", values_path.display()))?;
    tracing::debug!(count = values.len(), "read variable values");

    let built = sequence
        .build(&values)
        .context("Failed to build sequence.")?;

    if json {
        println!(
            "{}",
            built
                .to_json()
                .context("Failed to serialize the built sequence.")?
        );
    } else {
        print!("{built}");
    }

    Ok(())
}
