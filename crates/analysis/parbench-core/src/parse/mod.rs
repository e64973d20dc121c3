//! Raw measurement parsers.
//!
//! Each parser is an iterator over a line-oriented source. Items are
//! `Result`s: non-fatal errors (see [`ParseError::is_fatal`]) describe a
//! skipped row and the iterator keeps going after them. [`drain`] collects
//! the records and routes the skips into a [`Diagnostics`] sink.
//!
//! Parsers are restartable by construction: opening the same path again
//! yields the same sequence.

pub mod annotated;
pub mod tabular;
pub mod trace_table;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::diagnostics::Diagnostics;
use crate::error::{ParseError, Result};

pub use annotated::{AnnotatedLogParser, LogEvent, retain_mode};
pub use tabular::TabularParser;
pub use trace_table::{TraceDurations, read_trace_table};

/// Open a source file, mapping a missing file to [`ParseError::SourceNotFound`].
pub fn open_source(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| ParseError::from_io(path, e))
}

/// Collect every record from `items`, recording skipped rows in `diags`.
///
/// Stops at the first fatal error.
pub fn drain<T, I>(items: I, diags: &mut Diagnostics) -> Result<Vec<T>>
where
    I: IntoIterator<Item = Result<T>>,
{
    let mut records = Vec::new();
    for item in items {
        match item {
            Ok(record) => records.push(record),
            Err(err) => diags.absorb(err)?,
        }
    }
    Ok(records)
}

/// Parse a decimal number written by a locale-dependent producer.
///
/// Strips surrounding whitespace and double quotes, and treats a comma as
/// the decimal separator.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    normalize_decimal(raw).parse().ok()
}

fn normalize_decimal(raw: &str) -> String {
    raw.trim().replace('"', "").replace(',', ".")
}
