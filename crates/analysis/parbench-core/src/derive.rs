//! Baseline-relative speedup, efficiency and CPU utilization.
//!
//! Records are grouped by `(algorithm, resolution)`. The baseline of a group
//! is its least-parallel configuration: the smallest block size, or for
//! thread-modelled workloads the run with the fewest threads.

use std::collections::BTreeMap;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::record::{AggregatedRecord, CpuUtilization, DerivedMetric, TimingTriplet};

/// Derive speedup metrics for every group that has a usable baseline.
///
/// Groups without a baseline, or whose baseline mean is zero, are excluded
/// and reported as [`DiagnosticKind::MissingBaseline`] against `origin`.
pub fn derive_speedups(
    records: &[AggregatedRecord],
    origin: &str,
    diags: &mut Diagnostics,
) -> Vec<DerivedMetric> {
    let mut groups: BTreeMap<(&str, u32), Vec<&AggregatedRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry((record.key.algorithm.as_str(), record.key.resolution))
            .or_default()
            .push(record);
    }

    let mut derived = Vec::with_capacity(records.len());
    for ((algorithm, resolution), mut group) in groups {
        group.sort_by(|a, b| a.key.cmp(&b.key));
        let label = format!("{algorithm} res={resolution}");

        let baseline = match find_baseline(&group) {
            Ok(baseline) => baseline,
            Err(reason) => {
                diags.push(
                    Diagnostic::new(DiagnosticKind::MissingBaseline, origin, reason).for_config(label),
                );
                continue;
            }
        };

        for record in group {
            if record.mean_ms <= 0.0 {
                diags.push(
                    Diagnostic::new(
                        DiagnosticKind::MalformedRow,
                        origin,
                        "zero mean time, speedup undefined",
                    )
                    .for_config(record.key.to_string()),
                );
                continue;
            }
            derived.push(speedup_against(baseline, record));
        }
    }
    derived
}

/// Pick the least-parallel record of a non-empty group.
fn find_baseline<'a>(group: &[&'a AggregatedRecord]) -> Result<&'a AggregatedRecord, String> {
    let baseline = group
        .iter()
        .copied()
        .min_by(|a, b| {
            a.key
                .parallelism()
                .cmp(&b.key.parallelism())
                .then_with(|| a.key.cmp(&b.key))
        })
        .ok_or_else(|| "empty group".to_string())?;

    if baseline.mean_ms <= 0.0 {
        return Err(format!("baseline {} has zero mean time", baseline.key));
    }
    Ok(baseline)
}

/// Metrics for `record` against `baseline`.
///
/// Speedup uncertainty propagates only the record's standard deviation; the
/// baseline mean is treated as exact.
pub fn speedup_against(baseline: &AggregatedRecord, record: &AggregatedRecord) -> DerivedMetric {
    let speedup = baseline.mean_ms / record.mean_ms;
    let speedup_stddev = (baseline.mean_ms / (record.mean_ms * record.mean_ms)).abs() * record.stddev_ms;
    let ideal_speedup = f64::from(record.key.parallelism()) / f64::from(baseline.key.parallelism());
    let efficiency = record.key.threads.map(|threads| speedup / f64::from(threads));

    DerivedMetric {
        key: record.key.clone(),
        mean_ms: record.mean_ms,
        speedup,
        speedup_stddev,
        ideal_speedup,
        efficiency,
    }
}

/// CPU utilization factor for each complete timing triplet, ordered by
/// thread count then factor.
///
/// Triplets with no wall time are skipped and reported against `origin`.
pub fn cpu_utilization(
    triplets: &[TimingTriplet],
    origin: &str,
    diags: &mut Diagnostics,
) -> Vec<CpuUtilization> {
    let mut out: Vec<CpuUtilization> = triplets
        .iter()
        .filter_map(|t| match t.cpu_util_factor() {
            Some(factor) => Some(CpuUtilization {
                threads: t.threads,
                factor,
            }),
            None => {
                let mut d = Diagnostic::new(
                    DiagnosticKind::MalformedRow,
                    origin,
                    "timing report with zero real time",
                );
                if let Some(threads) = t.threads {
                    d = d.for_config(format!("threads={threads}"));
                }
                diags.push(d);
                None
            }
        })
        .collect();
    out.sort_by(|a, b| a.threads.cmp(&b.threads).then(a.factor.total_cmp(&b.factor)));
    out
}
