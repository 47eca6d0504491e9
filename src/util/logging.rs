//! Diagnostic logging setup
//!
//! Diagnostics go to stderr through `tracing`; the report itself is printed
//! to stdout. Filter precedence: `PROXPULSE_LOG`, then `RUST_LOG`, then the
//! level implied by `--verbose`/`--debug`.
//!
//! Log field contract:
//! - `worker_id` on every event emitted by or about one worker
//! - `worker_count` on group-level events
//! - `phase` on worker phase transitions

use tracing_subscriber::EnvFilter;

/// Environment variable checked before `RUST_LOG`
pub const LOG_ENV: &str = "PROXPULSE_LOG";

/// Install the global subscriber
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Default level for the given CLI flags
pub fn default_level(verbose: bool, debug: bool) -> &'static str {
    if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level() {
        assert_eq!(default_level(false, false), "warn");
        assert_eq!(default_level(true, false), "info");
        assert_eq!(default_level(true, true), "debug");
    }

    #[test]
    fn test_init_twice() {
        init_tracing("warn");
        init_tracing("debug");
        tracing::debug!(worker_id = 0, "subscriber installed");
    }
}
