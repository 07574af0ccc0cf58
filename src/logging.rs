// Logging setup for the binaries
//
// Library code only emits `tracing` events. Binaries call `init` once.
// `RUST_LOG` overrides the configured level.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
    /// Drop everything (the terminal UI owns the screen)
    Discard,
}

impl LogTarget {
    /// Configured file, else stderr
    pub fn for_cli(config: &LoggingConfig) -> Self {
        config
            .file
            .clone()
            .map(LogTarget::File)
            .unwrap_or(LogTarget::Stderr)
    }

    /// Configured file, else nothing; never the terminal being drawn on
    pub fn for_terminal_ui(config: &LoggingConfig) -> Self {
        config
            .file
            .clone()
            .map(LogTarget::File)
            .unwrap_or(LogTarget::Discard)
    }
}

pub fn init(config: &LoggingConfig, target: LogTarget) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("Invalid log level: {}", config.level))?,
    };

    let ansi = target == LogTarget::Stderr;
    let writer = match target {
        LogTarget::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogTarget::Discard => BoxMakeWriter::new(std::io::sink),
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json {
        registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_ansi(ansi).with_writer(writer))
            .try_init()
    };

    result.context("Logging was already initialized")
}
