//! sdslite CLI -- generate and replay dataset workloads.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "sdslite",
    about = "Transactional scientific datasets with shared-dimension constraints"
)]
pub struct App {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate random dataset workloads
    Generate(GenerateArgs),
    /// Replay workloads against in-memory datasets and check the committed state
    Run(RunArgs),
    /// Print the JSON Schema for the workload script format to stdout
    Schema,
}

#[derive(Debug, Parser)]
pub struct GenerateArgs {
    /// Number of workloads to generate
    #[arg(long)]
    pub n_workload: u64,
    /// Number of datasets per workload
    #[arg(long)]
    pub n_dataset: usize,
    /// Number of variables per dataset
    #[arg(long)]
    pub n_var: usize,
    /// Number of random steps after setup
    #[arg(long)]
    pub n_step: usize,
    /// Largest extent written by one put or append
    #[arg(long, default_value_t = 4)]
    pub max_extent: usize,
    /// Output directory for generated workload files
    #[arg(long)]
    pub output_dir: PathBuf,
}

#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Input directory containing workload JSON files
    #[arg(long)]
    pub input_dir: PathBuf,
    /// Print the outcome of every step
    #[arg(long)]
    pub verbose: bool,
    /// Output results as JSON (one object per file)
    #[arg(long)]
    pub json: bool,
}
