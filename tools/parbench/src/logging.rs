//! Log output setup.
//!
//! Three levels controlled by CLI flags, all on stderr so report tables on
//! stdout stay clean:
//! - **Quiet** (`-q`): errors only
//! - **Default** (no flag): warnings, including every skipped row
//! - **Verbose** (`-v`): debug output with per-source details and timings
//!
//! `RUST_LOG` overrides the flags.

use std::time::Instant;

use tracing_subscriber::EnvFilter;

/// Install the global subscriber for the current process.
pub fn init(quiet: bool, verbose: bool) {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// RAII timer that logs elapsed duration at debug level on drop.
///
/// ```ignore
/// let _t = Timer::start("aggregation");
/// // ... work ...
/// // logs "aggregation: 42ms" on drop
/// ```
pub struct Timer {
    label: &'static str,
    start: Instant,
}

impl Timer {
    /// Begin timing a labeled operation.
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        tracing::debug!("{}: {:.1?}", self.label, self.start.elapsed());
    }
}
