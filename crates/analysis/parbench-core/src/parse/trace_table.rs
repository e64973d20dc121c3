//! Device trace exports (`*_gputrace.csv`).
//!
//! A trace has a header row with at least `Name` and `Duration (ns)`. One
//! configuration contributes three operations: the host-to-device copy, the
//! blur kernel and the device-to-host copy.

use std::io::Read;

use serde::Serialize;

use super::parse_decimal;
use super::tabular::csv_error;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::error::{ParseError, Result};

const NAME_COLUMN: &str = "Name";
const DURATION_COLUMN: &str = "Duration (ns)";
const HTOD_MARKER: &str = "HtoD";
const DTOH_MARKER: &str = "DtoH";
const NANOS_PER_MILLI: f64 = 1e6;

/// Durations of the three device operations of one configuration (ms).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TraceDurations {
    /// Host-to-device copy.
    pub htod_ms: f64,
    /// Kernel execution.
    pub kernel_ms: f64,
    /// Device-to-host copy.
    pub dtoh_ms: f64,
}

/// Read the first `HtoD`, kernel and `DtoH` rows from a trace table.
///
/// Returns [`ParseError::IncompleteTrace`] (non-fatal) when a required
/// column or operation is missing. Undecodable rows, short rows and
/// unreadable durations are skipped and recorded in `diags`.
pub fn read_trace_table<R: Read>(
    reader: R,
    origin: &str,
    kernel_marker: &str,
    diags: &mut Diagnostics,
) -> Result<TraceDurations> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().map_err(|e| csv_error(origin, e))?.clone();
    let column = |wanted: &str| {
        headers.iter().position(|h| h == wanted).ok_or_else(|| ParseError::IncompleteTrace {
            origin: origin.to_string(),
            reason: format!("no '{wanted}' column"),
        })
    };
    let name_idx = column(NAME_COLUMN)?;
    let duration_idx = column(DURATION_COLUMN)?;

    let mut htod = None;
    let mut kernel = None;
    let mut dtoh = None;

    for record in rdr.records() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                diags.absorb(csv_error(origin, err))?;
                continue;
            }
        };
        let line = record.position().map_or(0, csv::Position::line);
        let skip = |message: String| {
            Diagnostic::new(DiagnosticKind::MalformedRow, origin, message).at_line(line)
        };

        let (Some(name), Some(raw)) = (record.get(name_idx), record.get(duration_idx)) else {
            let wanted = name_idx.max(duration_idx) + 1;
            diags.push(skip(format!("expected {wanted} fields, got {}", record.len())));
            continue;
        };
        let Some(nanos) = parse_decimal(raw) else {
            diags.push(skip(format!("unreadable duration '{raw}' for '{name}'")));
            continue;
        };
        let millis = nanos / NANOS_PER_MILLI;

        for (marker, slot) in [
            (HTOD_MARKER, &mut htod),
            (kernel_marker, &mut kernel),
            (DTOH_MARKER, &mut dtoh),
        ] {
            if slot.is_none() && name.contains(marker) {
                *slot = Some(millis);
            }
        }

        if htod.is_some() && kernel.is_some() && dtoh.is_some() {
            break;
        }
    }

    let missing: Vec<&str> = [
        (HTOD_MARKER, htod.is_none()),
        (kernel_marker, kernel.is_none()),
        (DTOH_MARKER, dtoh.is_none()),
    ]
    .into_iter()
    .filter_map(|(marker, absent)| absent.then_some(marker))
    .collect();

    match (htod, kernel, dtoh) {
        (Some(htod_ms), Some(kernel_ms), Some(dtoh_ms)) => Ok(TraceDurations {
            htod_ms,
            kernel_ms,
            dtoh_ms,
        }),
        _ => Err(ParseError::IncompleteTrace {
            origin: origin.to_string(),
            reason: format!("no row matching {}", missing.join(", ")),
        }),
    }
}
