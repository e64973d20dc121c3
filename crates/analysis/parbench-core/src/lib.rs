//! Analysis of parallel benchmark measurements.
//!
//! Reads the raw outputs of the blur and heat-diffusion benchmark runs
//! (result tables, device traces, annotated job logs, grid snapshots),
//! reduces repeated trials to per-configuration statistics, and derives
//! baseline-relative speedup, efficiency and CPU utilization.
//!
//! Pipeline: [`parse`] / [`trace`] → [`aggregate`] → [`derive`].
//! Non-fatal conditions are collected in a [`Diagnostics`] sink.

pub mod aggregate;
pub mod derive;
pub mod diagnostics;
pub mod error;
pub mod grid;
pub mod parse;
pub mod record;
pub mod trace;

pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use error::{ParseError, Result};
pub use record::{
    AggregatedRecord, ConfigKey, CpuUtilization, DerivedMetric, RunRecord, TimingTriplet, TraceRecord,
};
