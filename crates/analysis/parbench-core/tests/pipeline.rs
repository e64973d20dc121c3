//! End-to-end tests over files on disk: parse → aggregate → derive.

use std::fs;
use std::path::Path;

use parbench_core::aggregate::aggregate;
use parbench_core::derive::{cpu_utilization, derive_speedups};
use parbench_core::grid::{GridSnapshot, discover_snapshots};
use parbench_core::parse::{AnnotatedLogParser, LogEvent, TabularParser, drain};
use parbench_core::trace::{discover_trace_pairs, largest_block_transfers};
use parbench_core::{DiagnosticKind, Diagnostics, ParseError};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).expect("write fixture");
}

#[test]
fn stats_results_to_speedup() {
    let dir = TempDir::new().expect("temp dir");
    write(
        dir.path(),
        "stats_results.csv",
        "\
CHANNEL_THREAD,4K.jpg,4,100.0
CHANNEL_THREAD,4K.jpg,4,110.0
CHANNEL_THREAD,4K.jpg,4,90.0
CHANNEL_THREAD,4K.jpg,16,40.0
CHANNEL_THREAD,4K.jpg,16,60.0
CHANNEL_THREAD,broken.jpg,16,60.0
CHANNEL_THREAD,8K.jpg,8,300.0
",
    );

    let mut diags = Diagnostics::new();
    let path = dir.path().join("stats_results.csv");
    let runs = drain(TabularParser::open(&path).expect("open"), &mut diags).expect("parse");
    assert_eq!(runs.len(), 6);
    assert_eq!(diags.count(DiagnosticKind::MalformedRow), 1);

    let aggregated = aggregate(runs);
    assert_eq!(aggregated.len(), 3);
    let base = &aggregated[0];
    assert_eq!(base.key.block_size, 4);
    assert!((base.mean_ms - 100.0).abs() < 1e-12);
    assert!((base.stddev_ms - 10.0).abs() < 1e-12);

    let derived = derive_speedups(&aggregated, "stats_results.csv", &mut diags);
    assert_eq!(derived.len(), 3);
    let b16 = derived
        .iter()
        .find(|m| m.key.resolution == 4 && m.key.block_size == 16)
        .expect("block 16");
    assert!((b16.speedup - 2.0).abs() < 1e-12);
    assert_eq!(b16.ideal_speedup, 4.0);
    // |100 / 50^2| * stddev(40, 60)
    let expected = 100.0 / 2500.0 * 200.0_f64.sqrt();
    assert!((b16.speedup_stddev - expected).abs() < 1e-12);
}

#[test]
fn missing_results_file_is_fatal() {
    let dir = TempDir::new().expect("temp dir");
    let err = TabularParser::open(&dir.path().join("results.csv"))
        .err()
        .expect("missing file must fail");
    assert!(matches!(err, ParseError::SourceNotFound { .. }));
}

#[test]
fn annotated_log_to_efficiency_and_utilization() {
    let dir = TempDir::new().expect("temp dir");
    write(
        dir.path(),
        "slurm_output.txt",
        "\
Iteration 100 max dT = 0.001
Mode 0  N=1024  threads=1  iters=100  800.000 ms
real\t0m0.900s
user\t0m0.850s
sys\t0m0.050s
Mode 0  N=1024  threads=1  iters=100  820.000 ms
Mode 0  N=1024  threads=4  iters=100  250.000 ms
real\t0m0.300s
user\t0m1.000s
sys\t0m0.050s
Mode 1  N=1024  threads=4  iters=100  200.000 ms
",
    );

    let mut diags = Diagnostics::new();
    let events = drain(
        AnnotatedLogParser::open(&dir.path().join("slurm_output.txt")).expect("open"),
        &mut diags,
    )
    .expect("parse");

    let (mut runs, mut triplets) = (Vec::new(), Vec::new());
    for event in events {
        match event {
            LogEvent::Run(run) => runs.push(run),
            LogEvent::Timing(t) => triplets.push(t),
        }
    }
    assert_eq!(runs.len(), 4);
    assert_eq!(triplets.len(), 2);

    let aggregated = aggregate(runs);
    let derived = derive_speedups(&aggregated, "slurm_output.txt", &mut diags);

    assert_eq!(diags.count(DiagnosticKind::MissingBaseline), 0);
    assert_eq!(derived.len(), 3);
    // mode1 ran at 4 threads only and is its own baseline.
    let mode1 = derived.iter().find(|m| m.key.algorithm == "mode1").expect("mode1");
    assert_eq!(mode1.speedup, 1.0);
    assert_eq!(mode1.efficiency, Some(0.25));
    let four = derived
        .iter()
        .find(|m| m.key.algorithm == "mode0" && m.key.threads == Some(4))
        .expect("4 threads");
    assert!((four.speedup - 3.24).abs() < 1e-12);
    assert!((four.efficiency.expect("efficiency") - 0.81).abs() < 1e-12);

    let util = cpu_utilization(&triplets, "slurm_output.txt", &mut diags);
    assert_eq!(util[0].threads, Some(1));
    assert!((util[0].factor - 1.0).abs() < 1e-12);
    assert!((util[1].factor - 3.5).abs() < 1e-12);
}

#[test]
fn undecodable_log_line_keeps_the_rest() {
    let dir = TempDir::new().expect("temp dir");
    let mut log = b"Mode 0  N=512  threads=2  iters=50  400.000 ms\n".to_vec();
    log.extend_from_slice(b"progress \xff\xfe\n");
    log.extend_from_slice(b"Mode 0  N=512  threads=4  iters=50  200.000 ms\n");
    log.extend_from_slice(b"Mode 0  N=512  threads=8  iters=50  125.000 ms\n");
    let path = dir.path().join("slurm_output.txt");
    fs::write(&path, log).expect("write fixture");

    let mut diags = Diagnostics::new();
    let events = drain(AnnotatedLogParser::open(&path).expect("open"), &mut diags).expect("parse");
    assert_eq!(events.len(), 3);
    assert_eq!(diags.count(DiagnosticKind::MalformedRow), 1);
    assert_eq!(diags.iter().next().expect("diagnostic").line, Some(2));

    let runs: Vec<_> = events
        .into_iter()
        .filter_map(|e| match e {
            LogEvent::Run(run) => Some(run),
            LogEvent::Timing(_) => None,
        })
        .collect();
    // The sweep starts at 2 threads; that run is the baseline.
    let derived = derive_speedups(&aggregate(runs), "slurm_output.txt", &mut diags);
    assert_eq!(diags.count(DiagnosticKind::MissingBaseline), 0);
    assert_eq!(derived.len(), 3);
    assert_eq!(derived[0].key.threads, Some(2));
    assert_eq!(derived[0].speedup, 1.0);
    assert_eq!(derived[2].ideal_speedup, 4.0);
    assert!((derived[2].speedup - 3.2).abs() < 1e-12);
}

#[test]
fn trace_directory_reduction() {
    let dir = TempDir::new().expect("temp dir");
    let trace = "\
Start (ns),Duration (ns),Name
0,3000000,[CUDA memcpy HtoD]
1,9000000,applyGaussianBlur(unsigned char*)
2,n/a,cudaDeviceSynchronize
3,2000000,[CUDA memcpy DtoH]
";
    write(dir.path(), "4K_block_size8_gputrace.csv", trace);
    write(
        dir.path(),
        "4K_block_size8_gpumemsizesum.csv",
        "Total (MB),Count,Operation\n\"47,186\",1,[CUDA memcpy HtoD]\n\"47,186\",1,[CUDA memcpy DtoH]\n",
    );
    write(dir.path(), "4K_block_size16_gputrace.csv", trace);
    write(
        dir.path(),
        "4K_block_size16_gpumemsizesum.csv",
        "Name,Size (MB)\n[CUDA memcpy HtoD],\"12,5\"\n[CUDA memcpy DtoH],\"12,5\"\n",
    );
    write(dir.path(), "8K_block_size4_gputrace.csv", trace);
    write(dir.path(), "notes.txt", "ignored");

    let mut diags = Diagnostics::new();
    let pairs = discover_trace_pairs(dir.path(), &mut diags).expect("discover");
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[0].key.block_size, 8);
    assert_eq!(pairs[1].key.block_size, 16);
    assert_eq!(diags.count(DiagnosticKind::IncompleteTrace), 1);

    let records: Vec<_> = pairs
        .iter()
        .filter_map(|p| p.reduce("applyGaussianBlur", &mut diags).expect("reduce"))
        .collect();
    assert_eq!(records.len(), 2);
    // One unreadable duration per trace, each tied to its configuration.
    assert_eq!(diags.count(DiagnosticKind::MalformedRow), 2);
    let configs: Vec<_> = diags
        .iter()
        .filter(|d| d.kind == DiagnosticKind::MalformedRow)
        .map(|d| (d.line, d.config.clone()))
        .collect();
    assert_eq!(
        configs,
        vec![
            (Some(4), Some("4K block=8".to_string())),
            (Some(4), Some("4K block=16".to_string())),
        ]
    );
    assert!((records[0].htod_mem - 47.186).abs() < 1e-9);
    assert!((records[1].dtoh_mem - 12.5).abs() < 1e-9);
    assert!((records[0].total_ms() - 14.0).abs() < 1e-12);

    let largest = largest_block_transfers(&records);
    assert_eq!(largest[&4].block_size, 16);
}

#[test]
fn grid_snapshots_in_iteration_order() {
    let dir = TempDir::new().expect("temp dir");
    for iteration in [200_u32, 0, 50] {
        let mut data = Vec::new();
        data.extend_from_slice(&2_i32.to_le_bytes());
        data.extend_from_slice(&2_i32.to_le_bytes());
        for v in [0.0_f64, 1.0, 2.0, f64::from(iteration)] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        fs::write(dir.path().join(format!("heatmap_iter_{iteration}.bin")), data).expect("write");
    }

    let found = discover_snapshots(dir.path()).expect("discover");
    let iterations: Vec<_> = found.iter().map(|(i, _)| *i).collect();
    assert_eq!(iterations, vec![0, 50, 200]);

    let last = GridSnapshot::read(&found[2].1).expect("read");
    assert_eq!(last.summary().expect("summary").max, 200.0);
}
