//! Configuration for ChessTTY runtime.
//!
//! Every value has a compile-time default and can be overridden at runtime
//! via a dedicated environment variable. Command-line flags take precedence
//! over both.

use std::path::PathBuf;
use std::time::Duration;

/// Default directory for the daily log files.
const DEFAULT_LOG_DIR: &str = "logs";

/// Default extra time granted to the engine beyond its search budget (in seconds).
const DEFAULT_ENGINE_READ_GRACE_SECS: u64 = 5;

/// Get an explicitly configured engine binary.
///
/// Priority:
/// 1. `CHESSTTY_ENGINE_PATH` env variable if set
/// 2. `None`, leaving the engine crate to search well-known locations
pub fn get_engine_path() -> Option<PathBuf> {
    std::env::var_os("CHESSTTY_ENGINE_PATH")
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

/// Get the directory the log files are written to.
///
/// Priority:
/// 1. `CHESSTTY_LOG_DIR` env variable if set
/// 2. `logs` relative to the working directory as fallback
pub fn get_log_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHESSTTY_LOG_DIR") {
        return PathBuf::from(dir);
    }

    PathBuf::from(DEFAULT_LOG_DIR)
}

/// Get the engine read grace period.
///
/// Priority:
/// 1. `CHESSTTY_ENGINE_READ_GRACE_SECS` env variable if set (falls back to
///    the default if the value cannot be parsed as a `u64`)
/// 2. `5` seconds as fallback
pub fn get_engine_read_grace() -> Duration {
    let secs = std::env::var("CHESSTTY_ENGINE_READ_GRACE_SECS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_ENGINE_READ_GRACE_SECS);
    Duration::from_secs(secs)
}
