//! Collapse repeated runs into per-configuration statistics.

use std::collections::BTreeMap;

use crate::record::{AggregatedRecord, ConfigKey, RunRecord};

/// Group runs by [`ConfigKey`] and compute mean, sample standard deviation,
/// min and max per group.
///
/// Samples are sorted inside each group before summation, so any permutation
/// of the same input produces bit-identical output. Records come back in
/// `ConfigKey` order.
pub fn aggregate<I>(runs: I) -> Vec<AggregatedRecord>
where
    I: IntoIterator<Item = RunRecord>,
{
    group_samples(runs)
        .into_iter()
        .filter_map(|(key, mut samples)| summarize(key, &mut samples))
        .collect()
}

/// Pure grouping step: elapsed times per configuration.
pub fn group_samples<I>(runs: I) -> BTreeMap<ConfigKey, Vec<f64>>
where
    I: IntoIterator<Item = RunRecord>,
{
    let mut groups: BTreeMap<ConfigKey, Vec<f64>> = BTreeMap::new();
    for run in runs {
        groups.entry(run.key()).or_default().push(run.time_ms);
    }
    groups
}

/// Statistics for one group. Returns `None` for an empty slice.
#[allow(clippy::cast_precision_loss)]
pub fn summarize(key: ConfigKey, samples: &mut [f64]) -> Option<AggregatedRecord> {
    let n = samples.len();
    if n == 0 {
        return None;
    }

    samples.sort_unstable_by(f64::total_cmp);

    let min = samples[0];
    let max = samples[n - 1];
    let mean = samples.iter().sum::<f64>() / n as f64;
    let variance = if n > 1 {
        samples.iter().map(|&s| (s - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        0.0
    };

    Some(AggregatedRecord {
        key,
        mean_ms: mean,
        stddev_ms: variance.sqrt(),
        min_ms: min,
        max_ms: max,
        count: n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(algorithm: &str, block_size: u32, time_ms: f64) -> RunRecord {
        RunRecord {
            algorithm: algorithm.into(),
            workload: "4K.jpg".into(),
            resolution: 4,
            block_size,
            threads: None,
            time_ms,
        }
    }

    #[test]
    fn single_sample_has_zero_stddev() {
        let out = aggregate([run("BASIC", 4, 42.0)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].mean_ms, 42.0);
        assert_eq!(out[0].stddev_ms, 0.0);
        assert_eq!(out[0].count, 1);
    }

    #[test]
    fn mean_and_sample_stddev() {
        let out = aggregate([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].map(|t| run("BASIC", 8, t)));
        let rec = &out[0];
        assert_eq!(rec.count, 8);
        assert!((rec.mean_ms - 5.0).abs() < 1e-12);
        // Sum of squared deviations is 32, n - 1 = 7.
        assert!((rec.stddev_ms - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(rec.min_ms, 2.0);
        assert_eq!(rec.max_ms, 9.0);
    }

    #[test]
    fn groups_by_full_key() {
        let out = aggregate([
            run("BASIC", 4, 1.0),
            run("BASIC", 8, 2.0),
            run("CHANNEL_THREAD", 4, 3.0),
            run("BASIC", 4, 3.0),
        ]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].key.algorithm, "BASIC");
        assert_eq!(out[0].key.block_size, 4);
        assert_eq!(out[0].count, 2);
        assert_eq!(out[1].key.block_size, 8);
        assert_eq!(out[2].key.algorithm, "CHANNEL_THREAD");
    }

    #[test]
    fn order_independent() {
        let times = [0.1, 17.3, 1e6, 3.3, 0.7, 42.0, 1e-3];
        let forward: Vec<_> = times.iter().map(|&t| run("HALO", 16, t)).collect();
        let mut shuffled = forward.clone();
        shuffled.reverse();
        shuffled.swap(1, 4);
        shuffled.swap(0, 5);

        assert_eq!(aggregate(forward), aggregate(shuffled));
    }

    #[test]
    fn empty_input() {
        assert!(aggregate(Vec::new()).is_empty());
        assert!(summarize(run("X", 1, 0.0).key(), &mut []).is_none());
    }
}
