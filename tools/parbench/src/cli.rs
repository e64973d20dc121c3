//! Command-line interface definitions for parbench.

use std::fmt;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Speedup, efficiency and utilization reports for parallel benchmarks.
#[derive(Parser)]
#[command(name = "parbench", version, about)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (default: ./parbench.toml if present).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Show only errors and the final tables.
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable debug logging with per-source details and timings.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Runtime and speedup vs block size from a result table.
    Runtime(RuntimeArgs),
    /// Device operation breakdown from trace exports.
    Trace(TraceArgs),
    /// Runtime, speedup, efficiency and CPU usage vs threads from job logs.
    Log(LogArgs),
    /// Summarize heat-diffusion grid snapshots.
    Grid(GridArgs),
}

/// Experiment directory under the performance root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum Experiment {
    /// Plain thread pool.
    Basic,
    /// Channel-based thread pool.
    ChannelThread,
    /// Halo-exchange variant.
    Halo,
}

impl Experiment {
    /// Directory name on disk.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::ChannelThread => "channel_thread",
            Self::Halo => "halo",
        }
    }
}

impl fmt::Display for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Arguments for the `runtime` subcommand.
#[derive(Parser)]
pub struct RuntimeArgs {
    /// Experiment to load; omitted reads tables at the performance root.
    #[arg(long, short = 'e', value_enum)]
    pub experiment: Option<Experiment>,

    /// Read the repeated-trial table (`stats_results.csv`).
    #[arg(long)]
    pub stats: bool,

    /// Explicit result table, overriding experiment lookup.
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,

    /// Only keep rows for this algorithm.
    #[arg(long, short = 'a')]
    pub algorithm: Option<String>,

    /// Write the report as JSON to this path.
    #[arg(long)]
    pub json: Option<PathBuf>,
}

/// Arguments for the `trace` subcommand.
#[derive(Parser)]
pub struct TraceArgs {
    /// Experiment whose profiler exports to load.
    #[arg(long, short = 'e', value_enum)]
    pub experiment: Experiment,

    /// Kernel name marker (overrides the configuration file).
    #[arg(long)]
    pub kernel: Option<String>,

    /// Write the report as JSON to this path.
    #[arg(long)]
    pub json: Option<PathBuf>,
}

/// Arguments for the `log` subcommand.
#[derive(Parser)]
pub struct LogArgs {
    /// Job output files to scan.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Only keep runs of this solver mode and the timing reports after them.
    #[arg(long, short = 'm')]
    pub mode: Option<u32>,

    /// Write the report as JSON to this path.
    #[arg(long)]
    pub json: Option<PathBuf>,
}

/// Arguments for the `grid` subcommand.
#[derive(Parser)]
pub struct GridArgs {
    /// Snapshot file, or directory holding `heatmap_iter_<n>.bin` files.
    pub path: PathBuf,
}
