//! Terminal output formatting for analysis results.
//!
//! Each `render_*` function returns a complete table, header and dash rule
//! included, sized to the widest entry.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::PathBuf;

use parbench_core::grid::GridSummary;
use parbench_core::{AggregatedRecord, CpuUtilization, DerivedMetric, Diagnostics, TraceRecord};

fn threads_cell(threads: Option<u32>) -> String {
    threads.map_or_else(|| "-".to_string(), |t| t.to_string())
}

/// Mean ± stddev runtime per configuration.
pub fn render_runtime_table(records: &[AggregatedRecord]) -> String {
    if records.is_empty() {
        return "  No runtime results to display.\n".into();
    }

    let width = records
        .iter()
        .map(|r| r.key.algorithm.len())
        .max()
        .unwrap_or(9)
        .max(9);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "  {:<width$}  {:>6}  {:>6}  {:>7}  {:>12}  {:>12}  {:>12}  {:>12}  {:>7}",
        "Algorithm", "Res", "Block", "Threads", "Mean (ms)", "Stddev (ms)", "Min (ms)", "Max (ms)", "Samples",
    );
    let _ = writeln!(
        out,
        "  {:-<width$}  {:->6}  {:->6}  {:->7}  {:->12}  {:->12}  {:->12}  {:->12}  {:->7}",
        "", "", "", "", "", "", "", "", "",
    );
    for r in records {
        let _ = writeln!(
            out,
            "  {:<width$}  {:>6}  {:>6}  {:>7}  {:>12.3}  {:>12.3}  {:>12.3}  {:>12.3}  {:>7}",
            r.key.algorithm,
            r.key.resolution,
            r.key.block_size,
            threads_cell(r.key.threads),
            r.mean_ms,
            r.stddev_ms,
            r.min_ms,
            r.max_ms,
            r.count,
        );
    }
    out
}

/// Speedup, ideal speedup and efficiency per configuration.
pub fn render_speedup_table(metrics: &[DerivedMetric]) -> String {
    if metrics.is_empty() {
        return "  No speedup results to display.\n".into();
    }

    let width = metrics
        .iter()
        .map(|m| m.key.algorithm.len())
        .max()
        .unwrap_or(9)
        .max(9);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "  {:<width$}  {:>6}  {:>6}  {:>7}  {:>16}  {:>8}  {:>10}",
        "Algorithm", "Res", "Block", "Threads", "Speedup", "Ideal", "Efficiency",
    );
    let _ = writeln!(
        out,
        "  {:-<width$}  {:->6}  {:->6}  {:->7}  {:->16}  {:->8}  {:->10}",
        "", "", "", "", "", "", "",
    );
    for m in metrics {
        let speedup = format!("{:.2} ± {:.2}", m.speedup, m.speedup_stddev);
        let efficiency = m.efficiency.map_or_else(|| "-".to_string(), |e| format!("{e:.2}"));
        let _ = writeln!(
            out,
            "  {:<width$}  {:>6}  {:>6}  {:>7}  {:>16}  {:>8.2}  {:>10}",
            m.key.algorithm,
            m.key.resolution,
            m.key.block_size,
            threads_cell(m.key.threads),
            speedup,
            m.ideal_speedup,
            efficiency,
        );
    }
    out
}

/// HtoD / kernel / DtoH durations per configuration.
pub fn render_trace_table(records: &[TraceRecord]) -> String {
    if records.is_empty() {
        return "  No trace results to display.\n".into();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "  {:>6}  {:>6}  {:>10}  {:>12}  {:>10}  {:>10}",
        "Res", "Block", "HtoD (ms)", "Kernel (ms)", "DtoH (ms)", "Total (ms)",
    );
    let _ = writeln!(out, "  {:->6}  {:->6}  {:->10}  {:->12}  {:->10}  {:->10}", "", "", "", "", "", "");
    for r in records {
        let _ = writeln!(
            out,
            "  {:>5}K  {:>6}  {:>10.3}  {:>12.3}  {:>10.3}  {:>10.3}",
            r.resolution,
            r.block_size,
            r.htod_ms,
            r.kernel_ms,
            r.dtoh_ms,
            r.total_ms(),
        );
    }
    out
}

/// Transfer sizes per resolution.
pub fn render_transfer_table(by_resolution: &BTreeMap<u32, &TraceRecord>) -> String {
    if by_resolution.is_empty() {
        return "  No transfer sizes to display.\n".into();
    }

    let mut out = String::new();
    let _ = writeln!(out, "  {:>6}  {:>6}  {:>10}  {:>10}", "Res", "Block", "HtoD mem", "DtoH mem");
    let _ = writeln!(out, "  {:->6}  {:->6}  {:->10}  {:->10}", "", "", "", "");
    for (resolution, r) in by_resolution {
        let _ = writeln!(
            out,
            "  {:>5}K  {:>6}  {:>10.1}  {:>10.1}",
            resolution, r.block_size, r.htod_mem, r.dtoh_mem,
        );
    }
    out
}

/// CPU utilization factor per timed process.
pub fn render_utilization_table(entries: &[CpuUtilization]) -> String {
    if entries.is_empty() {
        return "  No timing reports to display.\n".into();
    }

    let mut out = String::new();
    let _ = writeln!(out, "  {:>7}  {:>12}", "Threads", "(user+sys)/real");
    let _ = writeln!(out, "  {:->7}  {:->15}", "", "");
    for e in entries {
        let _ = writeln!(out, "  {:>7}  {:>14.2}x", threads_cell(e.threads), e.factor);
    }
    out
}

/// One row per grid snapshot.
pub fn render_grid_table(snapshots: &[(u64, PathBuf, usize, usize, Option<GridSummary>)]) -> String {
    if snapshots.is_empty() {
        return "  No grid snapshots to display.\n".into();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "  {:>9}  {:>11}  {:>12}  {:>12}  {:>12}",
        "Iteration", "Size", "Min", "Max", "Mean",
    );
    let _ = writeln!(out, "  {:->9}  {:->11}  {:->12}  {:->12}  {:->12}", "", "", "", "", "");
    for (iteration, _, rows, cols, summary) in snapshots {
        let size = format!("{rows}x{cols}");
        match summary {
            Some(s) => {
                let _ = writeln!(
                    out,
                    "  {iteration:>9}  {size:>11}  {:>12.4}  {:>12.4}  {:>12.4}",
                    s.min, s.max, s.mean,
                );
            }
            None => {
                let _ = writeln!(out, "  {iteration:>9}  {size:>11}  {:>12}  {:>12}  {:>12}", "-", "-", "-");
            }
        }
    }
    out
}

/// Skip counts per source and kind, or `None` when nothing was skipped.
pub fn render_diagnostics_summary(diags: &Diagnostics) -> Option<String> {
    if diags.is_empty() {
        return None;
    }

    let mut out = String::new();
    let _ = writeln!(out, "  {} diagnostic(s):", diags.len());
    for ((source, kind), count) in diags.count_by_source() {
        let _ = writeln!(out, "    {source}: {count} {kind}");
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parbench_core::{ConfigKey, Diagnostic, DiagnosticKind};

    fn key(threads: Option<u32>) -> ConfigKey {
        ConfigKey {
            algorithm: "CHANNEL_THREAD".into(),
            resolution: 4,
            block_size: 8,
            threads,
        }
    }

    #[test]
    fn runtime_table_has_header_rule_and_rows() {
        let records = [AggregatedRecord {
            key: key(None),
            mean_ms: 123.4,
            stddev_ms: 1.5,
            min_ms: 120.0,
            max_ms: 125.0,
            count: 3,
        }];
        let table = render_runtime_table(&records);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("Mean (ms)"));
        assert!(lines[1].trim_start().starts_with("---"));
        assert!(lines[2].contains("CHANNEL_THREAD"));
        assert!(lines[2].contains("123.400"));
    }

    #[test]
    fn speedup_table_shows_efficiency_only_with_threads() {
        let metric = |threads, efficiency| DerivedMetric {
            key: key(threads),
            mean_ms: 10.0,
            speedup: 2.0,
            speedup_stddev: 0.1,
            ideal_speedup: 2.0,
            efficiency,
        };
        let table = render_speedup_table(&[metric(None, None), metric(Some(2), Some(1.0))]);
        let lines: Vec<_> = table.lines().collect();
        assert!(lines[2].contains("2.00 ± 0.10"));
        assert!(lines[2].trim_end().ends_with('-'));
        assert!(lines[3].trim_end().ends_with("1.00"));
    }

    #[test]
    fn empty_tables_say_so() {
        assert!(render_runtime_table(&[]).contains("No runtime results"));
        assert!(render_trace_table(&[]).contains("No trace results"));
        assert!(render_diagnostics_summary(&Diagnostics::new()).is_none());
    }

    #[test]
    fn diagnostics_summary_counts_per_source() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::new(DiagnosticKind::MalformedRow, "results.csv", "a"));
        diags.push(Diagnostic::new(DiagnosticKind::MalformedRow, "results.csv", "b"));
        let summary = render_diagnostics_summary(&diags).unwrap();
        assert!(summary.contains("results.csv: 2 malformed row"));
    }
}
