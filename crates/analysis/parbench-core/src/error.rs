//! Error types for measurement ingestion.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostics::{Diagnostic, DiagnosticKind};

/// Errors raised while reading raw measurement sources.
///
/// Only [`ParseError::SourceNotFound`], [`ParseError::Io`] and
/// [`ParseError::Grid`] abort a source. Row-level and trace-level variants are
/// non-fatal: callers turn them into [`Diagnostic`]s and keep going.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The source file does not exist.
    #[error("source not found: {}", path.display())]
    SourceNotFound {
        /// Path that was requested.
        path: PathBuf,
    },
    /// The source exists but could not be read.
    #[error("reading {origin}: {err}")]
    Io {
        /// Source label (usually the file path).
        origin: String,
        /// Underlying I/O error.
        #[source]
        err: io::Error,
    },
    /// A single row could not be interpreted.
    #[error("{origin}:{line}: {reason}")]
    MalformedRow {
        /// Source label.
        origin: String,
        /// 1-based line number of the row.
        line: u64,
        /// What was wrong with it.
        reason: String,
    },
    /// A device trace is missing a required column or operation.
    #[error("{origin}: incomplete trace: {reason}")]
    IncompleteTrace {
        /// Source label.
        origin: String,
        /// What was missing.
        reason: String,
    },
    /// A binary grid snapshot is truncated or has invalid dimensions.
    #[error("grid snapshot {origin}: {reason}")]
    Grid {
        /// Source label.
        origin: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl ParseError {
    /// Map an I/O error on `path`, distinguishing a missing file.
    pub fn from_io(path: &std::path::Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            Self::SourceNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Self::Io {
                origin: path.display().to_string(),
                err,
            }
        }
    }

    /// Returns `true` if the whole source must be abandoned.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::MalformedRow { .. } | Self::IncompleteTrace { .. })
    }

    /// Convert a non-fatal error into a diagnostic. Fatal errors are returned
    /// unchanged in `Err`.
    pub fn into_diagnostic(self) -> Result<Diagnostic, Self> {
        match self {
            Self::MalformedRow {
                origin,
                line,
                reason,
            } => Ok(Diagnostic::new(DiagnosticKind::MalformedRow, origin, reason).at_line(line)),
            Self::IncompleteTrace { origin, reason } => {
                Ok(Diagnostic::new(DiagnosticKind::IncompleteTrace, origin, reason))
            }
            fatal => Err(fatal),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = ParseError> = std::result::Result<T, E>;
