//! Binary grid snapshots written by the heat-diffusion solver.
//!
//! Layout (native little-endian): `rows: i32`, `cols: i32`, then
//! `rows * cols` row-major `f64` values. The solver writes one snapshot per
//! checkpoint as `heatmap_iter_<n>.bin`.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{ParseError, Result};

/// Dimension header size: two `i32`.
const HEADER_LEN: usize = 8;

/// A decoded grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSnapshot {
    /// Row count.
    pub rows: usize,
    /// Column count.
    pub cols: usize,
    /// Row-major values, `rows * cols` long.
    pub values: Vec<f64>,
}

/// Value range and mean of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridSummary {
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
    /// Arithmetic mean.
    pub mean: f64,
}

impl GridSnapshot {
    /// Decode a snapshot from its raw bytes.
    ///
    /// Trailing bytes past `rows * cols` values are ignored.
    pub fn decode(data: &[u8], origin: &str) -> Result<Self> {
        let err = |reason: String| ParseError::Grid {
            origin: origin.to_string(),
            reason,
        };

        if data.len() < HEADER_LEN {
            return Err(err(format!("header truncated ({} bytes)", data.len())));
        }
        let mut pos = 0;
        let rows = read_i32(data, &mut pos);
        let cols = read_i32(data, &mut pos);

        let (Ok(rows), Ok(cols)) = (usize::try_from(rows), usize::try_from(cols)) else {
            return Err(err(format!("invalid dimensions {rows}x{cols}")));
        };
        let count = rows
            .checked_mul(cols)
            .ok_or_else(|| err(format!("dimensions overflow: {rows}x{cols}")))?;
        let needed = count
            .checked_mul(8)
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or_else(|| err(format!("dimensions overflow: {rows}x{cols}")))?;
        if data.len() < needed {
            return Err(err(format!(
                "payload truncated: {rows}x{cols} needs {needed} bytes, have {}",
                data.len()
            )));
        }

        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(read_f64(data, &mut pos));
        }

        Ok(Self { rows, cols, values })
    }

    /// Read and decode a snapshot file.
    pub fn read(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| ParseError::from_io(path, e))?;
        Self::decode(&data, &path.display().to_string())
    }

    /// Value at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.values.get(row * self.cols + col).copied()
    }

    /// Min, max and mean, or `None` for an empty grid.
    #[allow(clippy::cast_precision_loss)]
    pub fn summary(&self) -> Option<GridSummary> {
        if self.values.is_empty() {
            return None;
        }
        let (min, max) = self
            .values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let mean = self.values.iter().sum::<f64>() / self.values.len() as f64;
        Some(GridSummary { min, max, mean })
    }
}

fn snapshot_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^heatmap_iter_(\d+)\.bin$").expect("snapshot regex must compile"))
}

/// Iteration number of a `heatmap_iter_<n>.bin` path, `None` for any other
/// file name.
pub fn snapshot_iteration(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    snapshot_pattern().captures(name)?[1].parse().ok()
}

/// Find `heatmap_iter_<n>.bin` files in `dir`, ordered by iteration.
pub fn discover_snapshots(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
    if !dir.is_dir() {
        return Err(ParseError::SourceNotFound {
            path: dir.to_path_buf(),
        });
    }
    let mut found: Vec<(u64, PathBuf)> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter_map(|entry| {
            let iteration = snapshot_iteration(entry.path())?;
            Some((iteration, entry.path().to_path_buf()))
        })
        .collect();
    found.sort();
    Ok(found)
}

fn read_i32(data: &[u8], pos: &mut usize) -> i32 {
    let val = i32::from_le_bytes([data[*pos], data[*pos + 1], data[*pos + 2], data[*pos + 3]]);
    *pos += 4;
    val
}

fn read_f64(data: &[u8], pos: &mut usize) -> f64 {
    let val = f64::from_le_bytes([
        data[*pos],
        data[*pos + 1],
        data[*pos + 2],
        data[*pos + 3],
        data[*pos + 4],
        data[*pos + 5],
        data[*pos + 6],
        data[*pos + 7],
    ]);
    *pos += 8;
    val
}
