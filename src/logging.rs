/// Diagnostic log setup.
///
/// The TUI owns the terminal, so interactive runs log to a file in the data
/// directory. Single-shot runs log to stderr.
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "EMBEDSEARCH_LOG";

pub enum LogTarget {
    File(PathBuf),
    Stderr,
}

pub fn log_file_path() -> PathBuf {
    crate::config::data_dir().join("embedsearch.log")
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose { "embedsearch=debug" } else { "embedsearch=info" }
}

pub fn init(target: LogTarget, verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    match target {
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log dir {}", parent.display()))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        LogTarget::Stderr => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
    }
    Ok(())
}
