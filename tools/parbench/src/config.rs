//! Analysis configuration.
//!
//! Deserialized from `parbench.toml`. Every field has a default, so a
//! missing file is equivalent to an empty one.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// File looked up in the working directory when `--config` is not given.
pub const CONFIG_FILE: &str = "parbench.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root holding `results.csv`, `stats_results.csv` and experiment
    /// directories.
    pub performance_root: PathBuf,
    /// Substring identifying the kernel row in device traces.
    pub kernel_marker: String,
    /// Resolutions to keep when reducing traces (all when absent).
    pub resolutions: Option<Vec<u32>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            performance_root: PathBuf::from("output/performance"),
            kernel_marker: "applyGaussianBlur".into(),
            resolutions: None,
        }
    }
}

impl Config {
    /// Load from `explicit`, or from `./parbench.toml` if it exists.
    ///
    /// An explicit path that does not exist is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(CONFIG_FILE);
                if !default.exists() {
                    tracing::debug!("no {CONFIG_FILE}, using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse configuration text.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Directory holding one experiment's profiler exports.
    pub fn trace_dir(&self, experiment: &str) -> PathBuf {
        self.performance_root
            .join(experiment)
            .join("nsys_profiles")
            .join("results")
    }

    /// Returns `true` if `resolution` passes the configured filter.
    pub fn keeps_resolution(&self, resolution: u32) -> bool {
        self.resolutions
            .as_ref()
            .is_none_or(|kept| kept.contains(&resolution))
    }
}
