//! Normalized measurement records.

use std::fmt;

use serde::Serialize;

/// Identifies one measured configuration.
///
/// Ordering is lexicographic over the fields, which gives every report a
/// stable row order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ConfigKey {
    /// Algorithm variant (e.g. `CHANNEL_THREAD`, `mode1`).
    pub algorithm: String,
    /// Resolution class (`4` for a 4K image) or problem size `N`.
    pub resolution: u32,
    /// Block/tile size.
    pub block_size: u32,
    /// Worker thread count, when the workload models it.
    pub threads: Option<u32>,
}

impl ConfigKey {
    /// Degree of parallelism used as the speedup denominator.
    pub fn parallelism(&self) -> u32 {
        self.threads.unwrap_or(self.block_size)
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} res={} block={}", self.algorithm, self.resolution, self.block_size)?;
        if let Some(threads) = self.threads {
            write!(f, " threads={threads}")?;
        }
        Ok(())
    }
}

/// One timed run, as read from a raw source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    /// Algorithm variant.
    pub algorithm: String,
    /// Workload identifier (image file name, `N=<n>`).
    pub workload: String,
    /// Resolution class.
    pub resolution: u32,
    /// Block/tile size.
    pub block_size: u32,
    /// Worker thread count, if recorded.
    pub threads: Option<u32>,
    /// Elapsed wall time in milliseconds.
    pub time_ms: f64,
}

impl RunRecord {
    /// The configuration this run belongs to.
    pub fn key(&self) -> ConfigKey {
        ConfigKey {
            algorithm: self.algorithm.clone(),
            resolution: self.resolution,
            block_size: self.block_size,
            threads: self.threads,
        }
    }
}

/// Repeated runs of one configuration, reduced to summary statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedRecord {
    /// Configuration.
    pub key: ConfigKey,
    /// Mean elapsed time (ms).
    pub mean_ms: f64,
    /// Sample standard deviation (ms); zero for a single sample.
    pub stddev_ms: f64,
    /// Fastest run (ms).
    pub min_ms: f64,
    /// Slowest run (ms).
    pub max_ms: f64,
    /// Number of runs.
    pub count: usize,
}

/// Device-side breakdown of one accelerated configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceRecord {
    /// Resolution class.
    pub resolution: u32,
    /// Block size.
    pub block_size: u32,
    /// Host-to-device copy duration (ms).
    pub htod_ms: f64,
    /// Kernel duration (ms).
    pub kernel_ms: f64,
    /// Device-to-host copy duration (ms).
    pub dtoh_ms: f64,
    /// Host-to-device transfer size, in the summary table's unit.
    pub htod_mem: f64,
    /// Device-to-host transfer size, in the summary table's unit.
    pub dtoh_mem: f64,
}

impl TraceRecord {
    /// Sum of the three device operation durations (ms).
    pub fn total_ms(&self) -> f64 {
        self.htod_ms + self.kernel_ms + self.dtoh_ms
    }
}

/// `real`/`user`/`sys` times reported by `time(1)` for one process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimingTriplet {
    /// Thread count most recently announced before the triplet, if any.
    pub threads: Option<u32>,
    /// Wall-clock seconds.
    pub real_s: f64,
    /// User CPU seconds.
    pub user_s: f64,
    /// System CPU seconds.
    pub sys_s: f64,
}

impl TimingTriplet {
    /// `(user + sys) / real`, or `None` when no wall time was recorded.
    pub fn cpu_util_factor(&self) -> Option<f64> {
        (self.real_s > 0.0).then(|| (self.user_s + self.sys_s) / self.real_s)
    }
}

/// Baseline-relative metrics for one configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedMetric {
    /// Configuration.
    pub key: ConfigKey,
    /// Mean elapsed time this metric was derived from (ms).
    pub mean_ms: f64,
    /// `baseline.mean / mean`.
    pub speedup: f64,
    /// Speedup uncertainty, treating the baseline mean as exact.
    pub speedup_stddev: f64,
    /// Parallelism ratio against the baseline.
    pub ideal_speedup: f64,
    /// `speedup / threads`, only when the thread count is modelled.
    pub efficiency: Option<f64>,
}

/// CPU utilization for one timed process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CpuUtilization {
    /// Thread count, if announced.
    pub threads: Option<u32>,
    /// `(user + sys) / real`.
    pub factor: f64,
}
