//! Tracing subscriber setup.
//!
//! `RUST_LOG` takes precedence over `[logging] level`. Output always goes to
//! stdout and is mirrored into `[logging] file` when one is configured.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::Result;

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn filter(level: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(parse_level(level).into())
        .from_env_lossy()
}

/// Open `path` for appending, creating missing parent directories.
///
/// An empty path means no log file.
fn open_log_file(path: &str) -> Result<Option<Arc<File>>> {
    if path.is_empty() {
        return Ok(None);
    }
    if let Some(parent) = Path::new(path).parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Some(Arc::new(file)))
}

/// Install the global subscriber described by `config`.
///
/// Fails without installing anything if the log file cannot be opened.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let Some(file) = open_log_file(&config.file)? else {
        init_console(&config.level);
        return Ok(());
    };

    tracing_subscriber::registry()
        .with(filter(&config.level))
        .with(
            fmt::layer()
                .with_writer(std::io::stdout.and(file))
                .with_ansi(false),
        )
        .init();
    Ok(())
}

/// Install a stdout-only subscriber.
pub fn init_console(level: &str) {
    tracing_subscriber::registry()
        .with(filter(level))
        .with(fmt::layer().with_writer(std::io::stdout))
        .init();
}
