//! Non-fatal conditions collected during an analysis run.
//!
//! Every skipped row, excluded group or defaulted value is recorded here with
//! the source it came from, so nothing is dropped silently. Each entry is also
//! emitted as a `tracing` warning when pushed.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::{ParseError, Result};

/// Category of a non-fatal condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A row was skipped.
    MalformedRow,
    /// A group had no usable baseline and was excluded from derived output.
    MissingBaseline,
    /// No memory-summary schema matched; transfer sizes defaulted to zero.
    AmbiguousSchema,
    /// A trace configuration was skipped (missing marker, column or file).
    IncompleteTrace,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MalformedRow => "malformed row",
            Self::MissingBaseline => "missing baseline",
            Self::AmbiguousSchema => "ambiguous schema",
            Self::IncompleteTrace => "incomplete trace",
        };
        f.write_str(name)
    }
}

/// A single non-fatal condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// Category.
    pub kind: DiagnosticKind,
    /// Source the condition was found in (file path or label).
    pub source: String,
    /// 1-based line number, when the condition is tied to a row.
    pub line: Option<u64>,
    /// Configuration the condition affects, when known.
    pub config: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl Diagnostic {
    /// Create a diagnostic with no line or configuration attached.
    pub fn new(kind: DiagnosticKind, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            line: None,
            config: None,
            message: message.into(),
        }
    }

    /// Attach a line number.
    #[must_use]
    pub fn at_line(mut self, line: u64) -> Self {
        self.line = Some(line);
        self
    }

    /// Attach a configuration label.
    #[must_use]
    pub fn for_config(mut self, config: impl Into<String>) -> Self {
        self.config = Some(config.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
        }
        if let Some(config) = &self.config {
            write!(f, " [{config}]")?;
        }
        write!(f, ": {}: {}", self.kind, self.message)
    }
}

/// Collected diagnostics for one analysis invocation.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and log it.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::warn!("{diagnostic}");
        self.entries.push(diagnostic);
    }

    /// Record a non-fatal parse error, or hand a fatal one back.
    pub fn absorb(&mut self, err: ParseError) -> Result<()> {
        let diagnostic = err.into_diagnostic()?;
        self.push(diagnostic);
        Ok(())
    }

    /// Move every entry of `other` into this sink, labelling the ones that
    /// carry no configuration with `config`. Entries are not logged again.
    pub fn merge_for_config(&mut self, other: Diagnostics, config: &str) {
        self.entries.extend(other.entries.into_iter().map(|mut d| {
            d.config.get_or_insert_with(|| config.to_string());
            d
        }));
    }

    /// All diagnostics in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Number of recorded diagnostics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of diagnostics of the given kind.
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    /// Per-source, per-kind counts, ordered by source then kind.
    pub fn count_by_source(&self) -> BTreeMap<(&str, DiagnosticKind), usize> {
        let mut counts = BTreeMap::new();
        for d in &self.entries {
            *counts.entry((d.source.as_str(), d.kind)).or_insert(0) += 1;
        }
        counts
    }
}
