//! Parallel benchmark analysis tool.
//!
//! Reads raw measurements produced by the blur and heat-diffusion benchmark
//! runs and prints runtime, speedup, efficiency, device-trace and CPU usage
//! tables. `--json` exports the same data for chart rendering.
//!
//! Pipeline: load config → parse sources → aggregate → derive → print.

mod cli;
mod config;
mod logging;
mod output;
mod report;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use parbench_core::aggregate::aggregate;
use parbench_core::derive::{cpu_utilization, derive_speedups};
use parbench_core::grid::{GridSnapshot, discover_snapshots, snapshot_iteration};
use parbench_core::parse::{AnnotatedLogParser, LogEvent, TabularParser, drain, retain_mode};
use parbench_core::trace::{discover_trace_pairs, largest_block_transfers};
use parbench_core::Diagnostics;

use config::Config;
use logging::Timer;
use report::Report;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    logging::init(cli.quiet, cli.verbose);

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        cli::Command::Runtime(ref args) => cmd_runtime(&config, args),
        cli::Command::Trace(ref args) => cmd_trace(&config, args),
        cli::Command::Log(ref args) => cmd_log(args),
        cli::Command::Grid(ref args) => cmd_grid(args),
    }
}

// ===========================================================================
// Commands
// ===========================================================================

/// Result table to read for `runtime`.
fn runtime_input(config: &Config, args: &cli::RuntimeArgs) -> PathBuf {
    if let Some(input) = &args.input {
        return input.clone();
    }
    let file = if args.stats {
        "stats_results.csv"
    } else {
        "results.csv"
    };
    match args.experiment {
        Some(experiment) => config.performance_root.join(experiment.dir_name()).join(file),
        None => config.performance_root.join(file),
    }
}

/// Aggregate a result table and derive speedup against the smallest block.
fn cmd_runtime(config: &Config, args: &cli::RuntimeArgs) -> Result<()> {
    let path = runtime_input(config, args);
    let origin = path.display().to_string();
    let mut diags = Diagnostics::new();

    let mut runs = {
        let _t = Timer::start("parsing");
        drain(TabularParser::open(&path)?, &mut diags)?
    };
    tracing::info!("{} runs read from {origin}", runs.len());

    if let Some(algorithm) = &args.algorithm {
        runs.retain(|r| &r.algorithm == algorithm);
        if runs.is_empty() {
            bail!("no runs for algorithm '{algorithm}' in {origin}");
        }
    }

    let aggregated = {
        let _t = Timer::start("aggregation");
        aggregate(runs)
    };
    let derived = derive_speedups(&aggregated, &origin, &mut diags);

    println!("\nRuntime vs block size ({origin}):\n");
    print!("{}", output::render_runtime_table(&aggregated));
    println!("\nSpeedup vs block size (T1/Tp):\n");
    print!("{}", output::render_speedup_table(&derived));
    print_diagnostics(&diags);

    if let Some(json) = &args.json {
        let report = Report {
            sources: vec![origin],
            aggregated,
            derived,
            diagnostics: diags,
            ..Report::default()
        };
        save_report(&report, json)?;
    }
    Ok(())
}

/// Reduce every trace pair of an experiment.
fn cmd_trace(config: &Config, args: &cli::TraceArgs) -> Result<()> {
    let dir = config.trace_dir(args.experiment.dir_name());
    let kernel_marker = args.kernel.as_deref().unwrap_or(&config.kernel_marker);
    let mut diags = Diagnostics::new();

    let pairs = discover_trace_pairs(&dir, &mut diags)
        .with_context(|| format!("loading traces for experiment '{}'", args.experiment))?;
    let pairs: Vec<_> = pairs
        .into_iter()
        .filter(|p| config.keeps_resolution(p.key.resolution))
        .collect();
    if pairs.is_empty() {
        bail!("no trace exports found in {}", dir.display());
    }
    tracing::info!("{} trace pairs in {}", pairs.len(), dir.display());

    let mut traces = Vec::with_capacity(pairs.len());
    for pair in &pairs {
        if let Some(record) = pair.reduce(kernel_marker, &mut diags)? {
            traces.push(record);
        }
    }

    println!("\nDevice operation durations ({}):\n", args.experiment);
    print!("{}", output::render_trace_table(&traces));
    println!("\nTransfer size per resolution (largest block):\n");
    print!("{}", output::render_transfer_table(&largest_block_transfers(&traces)));
    print_diagnostics(&diags);

    if let Some(json) = &args.json {
        let report = Report {
            sources: vec![dir.display().to_string()],
            traces,
            diagnostics: diags,
            ..Report::default()
        };
        save_report(&report, json)?;
    }
    Ok(())
}

/// Runtime, speedup, efficiency and CPU usage vs threads from job logs.
fn cmd_log(args: &cli::LogArgs) -> Result<()> {
    let mut diags = Diagnostics::new();
    let mut runs = Vec::new();
    let mut utilization = Vec::new();
    let mut sources = Vec::with_capacity(args.files.len());

    for file in &args.files {
        let origin = file.display().to_string();
        let mut events = drain(AnnotatedLogParser::open(file)?, &mut diags)?;
        if let Some(mode) = args.mode {
            events = retain_mode(events, mode);
        }

        let mut triplets = Vec::new();
        for event in events {
            match event {
                LogEvent::Run(run) => runs.push(run),
                LogEvent::Timing(t) => triplets.push(t),
            }
        }
        tracing::info!("{origin}: {} timing reports", triplets.len());
        utilization.extend(cpu_utilization(&triplets, &origin, &mut diags));
        sources.push(origin);
    }

    if runs.is_empty() && utilization.is_empty() {
        bail!("no solver summary or timing lines found in {}", sources.join(", "));
    }

    let aggregated = aggregate(runs);
    let derived = derive_speedups(&aggregated, &sources.join(", "), &mut diags);

    println!("\nExecution time vs threads:\n");
    print!("{}", output::render_runtime_table(&aggregated));
    println!("\nSpeedup and efficiency vs threads:\n");
    print!("{}", output::render_speedup_table(&derived));
    println!("\nCPU usage factor vs threads:\n");
    print!("{}", output::render_utilization_table(&utilization));
    print_diagnostics(&diags);

    if let Some(json) = &args.json {
        let report = Report {
            sources,
            aggregated,
            derived,
            utilization,
            diagnostics: diags,
            ..Report::default()
        };
        save_report(&report, json)?;
    }
    Ok(())
}

/// Summarize one snapshot or a directory of snapshots.
fn cmd_grid(args: &cli::GridArgs) -> Result<()> {
    let snapshots = if args.path.is_file() {
        let iteration = snapshot_iteration(&args.path).unwrap_or(0);
        vec![(iteration, args.path.clone())]
    } else {
        discover_snapshots(&args.path)?
    };
    if snapshots.is_empty() {
        bail!("no heatmap_iter_<n>.bin files in {}", args.path.display());
    }

    let mut rows = Vec::with_capacity(snapshots.len());
    for (iteration, path) in snapshots {
        let grid = GridSnapshot::read(&path)?;
        let summary = grid.summary();
        rows.push((iteration, path, grid.rows, grid.cols, summary));
    }

    println!("\nGrid snapshots ({}):\n", args.path.display());
    print!("{}", output::render_grid_table(&rows));
    Ok(())
}

// ===========================================================================
// Helpers
// ===========================================================================

fn print_diagnostics(diags: &Diagnostics) {
    if let Some(summary) = output::render_diagnostics_summary(diags) {
        println!();
        print!("{summary}");
    }
    println!();
}

fn save_report(report: &Report, path: &Path) -> Result<()> {
    report.save(path)?;
    println!("  Report saved to {}", path.display());
    Ok(())
}
