//! JSON export of an analysis run, for chart rendering outside this tool.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use parbench_core::{AggregatedRecord, CpuUtilization, DerivedMetric, Diagnostics, TraceRecord};

/// Everything one invocation produced.
#[derive(Debug, Default, Serialize)]
pub struct Report {
    /// Sources that were read.
    pub sources: Vec<String>,
    /// Per-configuration runtime statistics.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aggregated: Vec<AggregatedRecord>,
    /// Baseline-relative metrics.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub derived: Vec<DerivedMetric>,
    /// Device operation breakdowns.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub traces: Vec<TraceRecord>,
    /// CPU utilization per timed process.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub utilization: Vec<CpuUtilization>,
    /// Non-fatal conditions met along the way.
    pub diagnostics: Diagnostics,
}

impl Report {
    /// Write the report as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("serializing report to JSON")?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(path, json).with_context(|| format!("writing report to {}", path.display()))?;
        Ok(())
    }
}
