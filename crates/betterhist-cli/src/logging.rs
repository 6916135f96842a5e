//! Log setup.
//!
//! Logs go to a file under `<data_dir>/logs/`. The terminal is never used: in
//! session mode it is in raw mode and belongs to the child shell.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use betterhist_runtime::config::logs_dir;
use tracing_subscriber::EnvFilter;

use crate::types::LogLevel;

const LOG_FILE: &str = "betterhist.log";

/// Filter from `BETTERHIST_LOG`, then `RUST_LOG`, then `level`.
fn filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_env("BETTERHIST_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

/// Install the global subscriber. Failure leaves the process without logging.
pub fn init(data_dir: &Path, level: LogLevel) {
    let dir = logs_dir(data_dir);
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }

    let Ok(file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))
    else {
        return;
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init();
}
