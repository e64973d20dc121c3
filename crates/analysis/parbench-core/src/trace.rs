//! Reduction of device trace exports into [`TraceRecord`]s.
//!
//! Each accelerated configuration is profiled into two tables: a trace with
//! per-operation durations and a memory summary with transfer sizes. The
//! memory summary's column names differ between profiler versions, so its
//! schema is probed with an ordered list of independent matchers.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use walkdir::WalkDir;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::error::{ParseError, Result};
use crate::parse::{open_source, parse_decimal, read_trace_table, tabular::csv_error};
use crate::record::TraceRecord;

const HTOD_MARKER: &str = "HtoD";
const DTOH_MARKER: &str = "DtoH";

/// Host-to-device and device-to-host transfer sizes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransferSizes {
    /// Host-to-device size.
    pub htod: f64,
    /// Device-to-host size.
    pub dtoh: f64,
}

/// A memory-summary table held as strings.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl MemoryTable {
    /// Read a header-bearing memory summary. Undecodable rows are skipped
    /// and recorded in `diags`; an unreadable header is a non-fatal error.
    pub fn read<R: Read>(reader: R, origin: &str, diags: &mut Diagnostics) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = rdr
            .headers()
            .map_err(|e| csv_error(origin, e))?
            .iter()
            .map(str::to_string)
            .collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            match record {
                Ok(record) => rows.push(record.iter().map(str::to_string).collect()),
                Err(err) => diags.absorb(csv_error(origin, err))?,
            }
        }
        Ok(Self { headers, rows })
    }

    /// Build a table from in-memory values.
    pub fn from_parts(headers: &[&str], rows: &[&[&str]]) -> Self {
        Self {
            headers: headers.iter().map(|h| (*h).to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| (*c).to_string()).collect())
                .collect(),
        }
    }

    fn column(&self, pred: impl Fn(&str) -> bool) -> Option<usize> {
        self.headers.iter().position(|h| pred(h))
    }

    /// `(label, value)` cell pairs for two columns, skipping short rows.
    fn pairs(&self, label: usize, value: usize) -> impl Iterator<Item = (&str, &str)> {
        self.rows
            .iter()
            .filter_map(move |r| Some((r.get(label)?.as_str(), r.get(value)?.as_str())))
    }
}

/// A memory-summary schema matcher. Returns sizes only when it finds both.
pub type SchemaMatcher = fn(&MemoryTable) -> Option<TransferSizes>;

/// Matchers in the order they are tried.
pub const MEMORY_MATCHERS: &[(&str, SchemaMatcher)] = &[
    ("operation_total", match_operation_total),
    ("name_size", match_name_size),
];

/// `Operation` + `Total` columns. The last row per direction wins and an
/// unreadable size counts as zero.
pub fn match_operation_total(table: &MemoryTable) -> Option<TransferSizes> {
    let op = table.column(|h| h.contains("Operation"))?;
    let total = table.column(|h| h.contains("Total"))?;

    let mut htod = None;
    let mut dtoh = None;
    for (name, raw) in table.pairs(op, total) {
        let size = parse_decimal(raw).unwrap_or(0.0);
        if name.contains(HTOD_MARKER) {
            htod = Some(size);
        } else if name.contains(DTOH_MARKER) {
            dtoh = Some(size);
        }
    }
    Some(TransferSizes {
        htod: htod?,
        dtoh: dtoh?,
    })
}

/// `name` + any `*size*` column (case-insensitive). The first readable row
/// per direction wins.
pub fn match_name_size(table: &MemoryTable) -> Option<TransferSizes> {
    let name = table.column(|h| h.eq_ignore_ascii_case("name"))?;
    let size = table.column(|h| h.to_ascii_lowercase().contains("size"))?;

    let first = |marker: &str| {
        table
            .pairs(name, size)
            .find(|(label, _)| label.contains(marker))
            .and_then(|(_, raw)| parse_decimal(raw))
    };
    Some(TransferSizes {
        htod: first(HTOD_MARKER)?,
        dtoh: first(DTOH_MARKER)?,
    })
}

/// Try each matcher in order, returning the first success and its name.
pub fn probe_transfer_sizes(table: &MemoryTable) -> Option<(&'static str, TransferSizes)> {
    MEMORY_MATCHERS
        .iter()
        .find_map(|(name, matcher)| matcher(table).map(|sizes| (*name, sizes)))
}

/// Resolution and block size identifying one accelerated configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TraceKey {
    /// Resolution class.
    pub resolution: u32,
    /// Block size.
    pub block_size: u32,
}

impl std::fmt::Display for TraceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}K block={}", self.resolution, self.block_size)
    }
}

/// Combine a trace table and a memory summary into a [`TraceRecord`].
///
/// Returns `Ok(None)` when the trace is incomplete; the reason is recorded
/// in `diags`. Unknown or unreadable memory summaries default the sizes to
/// zero and record an [`DiagnosticKind::AmbiguousSchema`] diagnostic.
/// Skipped rows of either table are recorded against `key`. Only fatal I/O
/// errors are returned.
pub fn reduce<T: Read, M: Read>(
    key: TraceKey,
    trace: (T, &str),
    memory: (M, &str),
    kernel_marker: &str,
    diags: &mut Diagnostics,
) -> Result<Option<TraceRecord>> {
    let (trace_reader, trace_origin) = trace;
    let (memory_reader, memory_origin) = memory;
    let label = key.to_string();
    let mut skipped = Diagnostics::new();

    let durations = match read_trace_table(trace_reader, trace_origin, kernel_marker, &mut skipped) {
        Ok(durations) => durations,
        Err(err) => {
            skipped.push(err.into_diagnostic()?);
            diags.merge_for_config(skipped, &label);
            return Ok(None);
        }
    };

    let table = match MemoryTable::read(memory_reader, memory_origin, &mut skipped) {
        Ok(table) => table,
        Err(err) => {
            skipped.push(err.into_diagnostic()?);
            MemoryTable::default()
        }
    };
    diags.merge_for_config(skipped, &label);

    let sizes = match probe_transfer_sizes(&table) {
        Some((strategy, sizes)) => {
            tracing::debug!("{memory_origin}: transfer sizes via {strategy}");
            sizes
        }
        None => {
            diags.push(
                Diagnostic::new(
                    DiagnosticKind::AmbiguousSchema,
                    memory_origin,
                    "no memory-summary schema matched, transfer sizes set to 0",
                )
                .for_config(label),
            );
            TransferSizes::default()
        }
    };

    Ok(Some(TraceRecord {
        resolution: key.resolution,
        block_size: key.block_size,
        htod_ms: durations.htod_ms,
        kernel_ms: durations.kernel_ms,
        dtoh_ms: durations.dtoh_ms,
        htod_mem: sizes.htod,
        dtoh_mem: sizes.dtoh,
    }))
}

/// A trace export and its memory summary on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracePair {
    /// Configuration parsed from the file name.
    pub key: TraceKey,
    /// `<R>K_block_size<B>_gputrace.csv`.
    pub trace: PathBuf,
    /// `<R>K_block_size<B>_gpumemsizesum.csv`.
    pub memory: PathBuf,
}

impl TracePair {
    /// Reduce this pair from disk.
    pub fn reduce(&self, kernel_marker: &str, diags: &mut Diagnostics) -> Result<Option<TraceRecord>> {
        let trace = open_source(&self.trace)?;
        let memory = open_source(&self.memory)?;
        reduce(
            self.key,
            (trace, &self.trace.display().to_string()),
            (memory, &self.memory.display().to_string()),
            kernel_marker,
            diags,
        )
    }
}

fn trace_file_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d+)K_block_size(\d+)_gputrace\.csv$").expect("trace file regex must compile")
    })
}

/// Find every trace export in `dir` and pair it with its memory summary.
///
/// Traces without a memory summary are skipped with a diagnostic. The result
/// is ordered by resolution, then block size.
pub fn discover_trace_pairs(dir: &Path, diags: &mut Diagnostics) -> Result<Vec<TracePair>> {
    if !dir.is_dir() {
        return Err(ParseError::SourceNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut pairs = BTreeMap::new();
    for entry in WalkDir::new(dir).max_depth(1).into_iter().filter_map(|e| e.ok()) {
        let file_name = entry.file_name().to_string_lossy();
        let Some(caps) = trace_file_pattern().captures(&file_name) else {
            continue;
        };
        let (Ok(resolution), Ok(block_size)) = (caps[1].parse(), caps[2].parse()) else {
            continue;
        };
        let key = TraceKey {
            resolution,
            block_size,
        };
        let memory = dir.join(format!("{resolution}K_block_size{block_size}_gpumemsizesum.csv"));
        if !memory.exists() {
            diags.push(
                Diagnostic::new(
                    DiagnosticKind::IncompleteTrace,
                    entry.path().display().to_string(),
                    format!("no memory summary at {}", memory.display()),
                )
                .for_config(key.to_string()),
            );
            continue;
        }
        pairs.insert(
            key,
            TracePair {
                key,
                trace: entry.path().to_path_buf(),
                memory,
            },
        );
    }

    Ok(pairs.into_values().collect())
}

/// For each resolution, the record with the largest block size.
pub fn largest_block_transfers(records: &[TraceRecord]) -> BTreeMap<u32, &TraceRecord> {
    let mut by_resolution: BTreeMap<u32, &TraceRecord> = BTreeMap::new();
    for record in records {
        by_resolution
            .entry(record.resolution)
            .and_modify(|current| {
                if record.block_size > current.block_size {
                    *current = record;
                }
            })
            .or_insert(record);
    }
    by_resolution
}
