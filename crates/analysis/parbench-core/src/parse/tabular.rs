//! Header-less `algorithm,image,block_size,time_ms` result tables.
//!
//! Both the single-run `results.csv` and the repeated-trial
//! `stats_results.csv` use this layout.

use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use csv::StringRecord;
use regex::Regex;

use crate::error::{ParseError, Result};
use crate::record::RunRecord;

const FIELDS: usize = 4;

/// Digits immediately followed by `K`, e.g. the `4` in `4K.jpg`.
fn resolution_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)K").expect("resolution regex must compile"))
}

/// Extract the resolution class from an image name.
pub fn extract_resolution(image: &str) -> Option<u32> {
    resolution_pattern()
        .captures(image)
        .and_then(|c| c[1].parse().ok())
}

/// Iterator over the rows of a result table.
pub struct TabularParser<R> {
    origin: String,
    records: csv::StringRecordsIntoIter<R>,
}

impl<R: Read> TabularParser<R> {
    /// Parse rows from `reader`, labelling diagnostics with `origin`.
    pub fn from_reader(reader: R, origin: impl Into<String>) -> Self {
        let records = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader)
            .into_records();
        Self {
            origin: origin.into(),
            records,
        }
    }
}

impl TabularParser<std::io::BufReader<std::fs::File>> {
    /// Open a result table on disk.
    pub fn open(path: &Path) -> Result<Self> {
        let file = super::open_source(path)?;
        Ok(Self::from_reader(file, path.display().to_string()))
    }
}

impl<R: Read> Iterator for TabularParser<R> {
    type Item = Result<RunRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(err) => return Some(Err(csv_error(&self.origin, err))),
            };
            if record.iter().all(str::is_empty) {
                continue;
            }
            let line = record.position().map_or(0, csv::Position::line);
            return Some(parse_row(&record).map_err(|reason| ParseError::MalformedRow {
                origin: self.origin.clone(),
                line,
                reason,
            }));
        }
    }
}

fn parse_row(record: &StringRecord) -> Result<RunRecord, String> {
    if record.len() != FIELDS {
        return Err(format!("expected {FIELDS} fields, found {}", record.len()));
    }
    let algorithm = &record[0];
    let image = &record[1];
    if algorithm.is_empty() {
        return Err("empty algorithm field".into());
    }
    let resolution = extract_resolution(image)
        .ok_or_else(|| format!("no resolution (<digits>K) in image '{image}'"))?;
    let block_size: u32 = record[2]
        .parse()
        .map_err(|_| format!("invalid block size '{}'", &record[2]))?;
    let time_ms: f64 = record[3]
        .parse()
        .map_err(|_| format!("invalid time '{}'", &record[3]))?;
    if !time_ms.is_finite() || time_ms < 0.0 {
        return Err(format!("time out of range: {time_ms}"));
    }

    Ok(RunRecord {
        algorithm: algorithm.to_string(),
        workload: image.to_string(),
        resolution,
        block_size,
        threads: None,
        time_ms,
    })
}

pub(crate) fn csv_error(origin: &str, err: csv::Error) -> ParseError {
    let line = err.position().map_or(0, csv::Position::line);
    match err.into_kind() {
        csv::ErrorKind::Io(err) => ParseError::Io {
            origin: origin.to_string(),
            err,
        },
        other => ParseError::MalformedRow {
            origin: origin.to_string(),
            line,
            reason: format!("{other:?}"),
        },
    }
}
