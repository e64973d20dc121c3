//! Free-form execution logs from the diffusion solver job scripts.
//!
//! Two kinds of lines are recognized, anything else is ignored:
//!
//! - the solver's summary line,
//!   `Mode <d>  N=<n>  threads=<t>  iters=<i>  <f> ms`
//! - the three lines printed by `time(1)`: `real 0m1.234s`, `user ...`,
//!   `sys ...`
//!
//! Timing lines are fed into a three-slot accumulator that commits one
//! [`TimingTriplet`] once `real`, `user` and `sys` have been seen in that
//! order since the previous commit. `real` always opens a new report, and a
//! `user` or `sys` line arriving out of turn is dropped. Interleaved output
//! from concurrent jobs is not untangled.
//!
//! A line that is not valid UTF-8 is reported as a malformed row and
//! skipped; only read failures end the scan.

use std::collections::VecDeque;
use std::io::BufRead;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ParseError, Result};
use crate::record::{RunRecord, TimingTriplet};

/// One recognized log entry.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    /// A solver summary line.
    Run(RunRecord),
    /// A complete `time(1)` report.
    Timing(TimingTriplet),
}

struct Patterns {
    mode: Regex,
    threads: Regex,
    real: Regex,
    user: Regex,
    sys: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        mode: Regex::new(r"Mode (\d+)\s+N=(\d+)\s+threads=(\d+)\s+iters=(\d+)\s+([\d.]+) ms")
            .expect("mode regex must compile"),
        threads: Regex::new(r"threads=(\d+)").expect("threads regex must compile"),
        real: Regex::new(r"\breal\s+(\d+)m([\d.]+)s").expect("real regex must compile"),
        user: Regex::new(r"\buser\s+(\d+)m([\d.]+)s").expect("user regex must compile"),
        sys: Regex::new(r"\bsys\s+(\d+)m([\d.]+)s").expect("sys regex must compile"),
    })
}

/// Which `time(1)` line a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Real,
    User,
    Sys,
}

/// Accumulates one `time(1)` report, in `real`, `user`, `sys` order.
#[derive(Debug, Default)]
struct TimingSlots {
    real: Option<f64>,
    user: Option<f64>,
}

impl TimingSlots {
    /// Feed one timing line. Returns `(real, user, sys)` when `sys` closes a
    /// report, leaving the slots empty.
    fn fill(&mut self, slot: Slot, seconds: f64) -> Option<(f64, f64, f64)> {
        match slot {
            Slot::Real => {
                if self.real.is_some() {
                    tracing::debug!("real seen again before sys, restarting report");
                }
                *self = Self {
                    real: Some(seconds),
                    user: None,
                };
                None
            }
            Slot::User if self.real.is_some() && self.user.is_none() => {
                self.user = Some(seconds);
                None
            }
            Slot::Sys => match (self.real, self.user) {
                (Some(real), Some(user)) => {
                    *self = Self::default();
                    Some((real, user, seconds))
                }
                _ => {
                    tracing::debug!("sys without real and user, ignored");
                    None
                }
            },
            Slot::User => {
                tracing::debug!("user out of order, ignored");
                None
            }
        }
    }
}

/// Iterator over the recognized entries of an annotated log.
pub struct AnnotatedLogParser<R> {
    origin: String,
    reader: R,
    buf: Vec<u8>,
    line_no: u64,
    slots: TimingSlots,
    current_threads: Option<u32>,
    pending: VecDeque<Result<LogEvent>>,
}

impl<R: BufRead> AnnotatedLogParser<R> {
    /// Parse entries from `reader`, labelling diagnostics with `origin`.
    pub fn from_reader(reader: R, origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            reader,
            buf: Vec::new(),
            line_no: 0,
            slots: TimingSlots::default(),
            current_threads: None,
            pending: VecDeque::new(),
        }
    }

    fn malformed(&self, reason: String) -> ParseError {
        ParseError::MalformedRow {
            origin: self.origin.clone(),
            line: self.line_no,
            reason,
        }
    }

    fn scan_line(&mut self, line: &str) {
        let p = patterns();

        if let Some(caps) = p.mode.captures(line) {
            let event = match parse_mode_line(&caps) {
                Ok(run) => Ok(LogEvent::Run(run)),
                Err(reason) => Err(self.malformed(reason)),
            };
            self.pending.push_back(event);
        }

        if let Some(caps) = p.threads.captures(line) {
            if let Ok(threads) = caps[1].parse() {
                self.current_threads = Some(threads);
            }
        }

        for (slot, pattern) in [(Slot::Real, &p.real), (Slot::User, &p.user), (Slot::Sys, &p.sys)] {
            let Some(caps) = pattern.captures(line) else {
                continue;
            };
            let Some(seconds) = minutes_seconds(&caps[1], &caps[2]) else {
                let err = self.malformed(format!("unreadable {slot:?} time '{}'", &caps[0]));
                self.pending.push_back(Err(err));
                continue;
            };
            if let Some((real_s, user_s, sys_s)) = self.slots.fill(slot, seconds) {
                self.pending.push_back(Ok(LogEvent::Timing(TimingTriplet {
                    threads: self.current_threads,
                    real_s,
                    user_s,
                    sys_s,
                })));
            }
        }
    }

    /// Read the next raw line into `buf`. Returns `false` at end of input.
    fn read_line(&mut self) -> Result<bool> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => Ok(false),
            Ok(_) => {
                self.line_no += 1;
                Ok(true)
            }
            Err(err) => Err(ParseError::Io {
                origin: self.origin.clone(),
                err,
            }),
        }
    }
}

impl AnnotatedLogParser<std::io::BufReader<std::fs::File>> {
    /// Open a log file on disk.
    pub fn open(path: &Path) -> Result<Self> {
        let file = super::open_source(path)?;
        Ok(Self::from_reader(file, path.display().to_string()))
    }
}

impl<R: BufRead> Iterator for AnnotatedLogParser<R> {
    type Item = Result<LogEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            match self.read_line() {
                Ok(true) => {}
                Ok(false) => return None,
                Err(err) => return Some(Err(err)),
            }
            let raw = std::mem::take(&mut self.buf);
            match std::str::from_utf8(&raw) {
                Ok(line) => self.scan_line(line.trim_end_matches(['\n', '\r'])),
                Err(err) => {
                    let err = self.malformed(format!("line is not valid UTF-8 ({err})"));
                    self.pending.push_back(Err(err));
                }
            }
            self.buf = raw;
        }
    }
}

/// Algorithm name given to runs of solver mode `mode`.
pub fn mode_algorithm(mode: u32) -> String {
    format!("mode{mode}")
}

/// Keep the runs of one solver mode and the timing reports that follow them.
///
/// `time(1)` wraps a whole solver invocation, so a report belongs to the
/// latest summary line before it. Reports preceding any summary are dropped.
pub fn retain_mode(events: Vec<LogEvent>, mode: u32) -> Vec<LogEvent> {
    let wanted = mode_algorithm(mode);
    let mut in_mode = false;
    events
        .into_iter()
        .filter(|event| match event {
            LogEvent::Run(run) => {
                in_mode = run.algorithm == wanted;
                in_mode
            }
            LogEvent::Timing(_) => in_mode,
        })
        .collect()
}

fn parse_mode_line(caps: &regex::Captures<'_>) -> Result<RunRecord, String> {
    let mode: u32 = caps[1].parse().map_err(|_| format!("invalid mode '{}'", &caps[1]))?;
    let n: u32 = caps[2].parse().map_err(|_| format!("invalid N '{}'", &caps[2]))?;
    let threads: u32 = caps[3]
        .parse()
        .map_err(|_| format!("invalid thread count '{}'", &caps[3]))?;
    let time_ms: f64 = caps[5].parse().map_err(|_| format!("invalid time '{}'", &caps[5]))?;

    Ok(RunRecord {
        algorithm: mode_algorithm(mode),
        workload: format!("N={n}"),
        resolution: n,
        block_size: threads,
        threads: Some(threads),
        time_ms,
    })
}

/// Convert the `<m>m<s>s` notation used by `time(1)` to seconds.
fn minutes_seconds(minutes: &str, seconds: &str) -> Option<f64> {
    let minutes: u32 = minutes.parse().ok()?;
    let seconds: f64 = seconds.parse().ok()?;
    Some(f64::from(minutes) * 60.0 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DiagnosticKind, Diagnostics};
    use crate::parse::drain;

    fn events(src: &str) -> (Vec<LogEvent>, Diagnostics) {
        let mut diags = Diagnostics::new();
        let events = drain(AnnotatedLogParser::from_reader(src.as_bytes(), "log"), &mut diags)
            .unwrap();
        (events, diags)
    }

    #[test]
    fn parses_mode_line() {
        let (events, diags) = events("Mode 1  N=1024  threads=8  iters=100  45.2 ms\n");
        assert!(diags.is_empty());
        let [LogEvent::Run(run)] = events.as_slice() else {
            panic!("expected one run, got {events:?}");
        };
        assert_eq!(run.algorithm, "mode1");
        assert_eq!(run.resolution, 1024);
        assert_eq!(run.threads, Some(8));
        assert_eq!(run.block_size, 8);
        assert!((run.time_ms - 45.2).abs() < 1e-12);
    }

    #[test]
    fn commits_triplet_after_all_three() {
        let src = "\
Iteration 10 max dT = 0.000100
Mode 0  N=1024  threads=4  iters=100  812.000 ms

real\t1m0.0s
user\t0m30s
sys\t0m10s
";
        let (events, _) = events(src);
        assert_eq!(events.len(), 2);
        let LogEvent::Timing(t) = &events[1] else {
            panic!("expected timing, got {:?}", events[1]);
        };
        assert_eq!(t.threads, Some(4));
        assert!((t.real_s - 60.0).abs() < 1e-12);
        assert!((t.user_s - 30.0).abs() < 1e-12);
        assert!((t.sys_s - 10.0).abs() < 1e-12);
        assert!((t.cpu_util_factor().unwrap() - 0.6667).abs() < 1e-4);
    }

    #[test]
    fn partial_triplet_is_not_committed() {
        let (events, _) = events("real 0m1.0s\nuser 0m0.5s\n");
        assert!(events.is_empty());
    }

    #[test]
    fn slots_reset_after_commit() {
        let src = "real 0m2s\nuser 0m1s\nsys 0m1s\nreal 0m4s\nsys 0m1s\n";
        let (events, _) = events(src);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn out_of_order_report_is_not_committed() {
        let (events, _) = events("user 0m1s\nreal 0m2s\nsys 0m1s\n");
        assert!(events.is_empty());
    }

    #[test]
    fn repeated_real_restarts_report() {
        let (events, _) = events("real 0m9s\nuser 0m9s\nreal 0m2s\nuser 0m1s\nsys 0m1s\n");
        let [LogEvent::Timing(t)] = events.as_slice() else {
            panic!("expected one timing, got {events:?}");
        };
        assert!((t.real_s - 2.0).abs() < 1e-12);
        assert!((t.user_s - 1.0).abs() < 1e-12);
    }

    #[test]
    fn undecodable_line_is_skipped() {
        let mut src = b"Mode 0  N=64  threads=1  iters=10  5.0 ms\n".to_vec();
        src.extend_from_slice(b"progress \xff\xfe\n");
        src.extend_from_slice(b"Mode 0  N=64  threads=2  iters=10  3.0 ms\n");

        let mut diags = Diagnostics::new();
        let events = drain(AnnotatedLogParser::from_reader(src.as_slice(), "log"), &mut diags)
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(diags.count(DiagnosticKind::MalformedRow), 1);
        assert_eq!(diags.iter().next().unwrap().line, Some(2));
    }

    #[test]
    fn crlf_line_endings() {
        let (events, diags) = events("Mode 2  N=32  threads=4  iters=1  7.5 ms\r\nreal 0m1s\r\nuser 0m1s\r\nsys 0m0s\r\n");
        assert!(diags.is_empty());
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn mode_filter_keeps_following_timings() {
        let src = "\
real 0m1s
user 0m1s
sys 0m0s
Mode 0  N=64  threads=2  iters=10  5.0 ms
real 0m2s
user 0m2s
sys 0m0s
Mode 1  N=64  threads=2  iters=10  4.0 ms
real 0m3s
user 0m3s
sys 0m0s
";
        let (all, _) = events(src);
        assert_eq!(all.len(), 5);

        let kept = retain_mode(all, 1);
        assert_eq!(kept.len(), 2);
        assert!(matches!(&kept[0], LogEvent::Run(run) if run.algorithm == "mode1"));
        let LogEvent::Timing(t) = &kept[1] else {
            panic!("expected timing, got {:?}", kept[1]);
        };
        assert!((t.real_s - 3.0).abs() < 1e-12);
    }

    #[test]
    fn ignores_unrelated_lines() {
        let (events, diags) = events("hello\nMode x N=1\nthreads=\n");
        assert!(events.is_empty());
        assert!(diags.is_empty());
    }

    #[test]
    fn malformed_mode_time_is_skipped() {
        let (events, diags) = events("Mode 0  N=64  threads=2  iters=10  1.2.3 ms\n");
        assert!(events.is_empty());
        assert_eq!(diags.count(DiagnosticKind::MalformedRow), 1);
        assert_eq!(diags.iter().next().unwrap().line, Some(1));
    }

    #[test]
    fn thread_annotation_follows_latest_line() {
        let src = "\
Mode 0  N=64  threads=2  iters=10  5.0 ms
real 0m1s
user 0m1s
sys 0m0s
Mode 0  N=64  threads=8  iters=10  2.0 ms
real 0m1s
user 0m6s
sys 0m1s
";
        let (events, _) = events(src);
        let threads: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                LogEvent::Timing(t) => Some(t.threads),
                LogEvent::Run(_) => None,
            })
            .collect();
        assert_eq!(threads, vec![Some(2), Some(8)]);
    }
}
