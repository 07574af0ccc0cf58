// Configuration
//
// Read from an optional TOML file; every key has a default so an empty or
// missing file is valid. Command-line flags are applied on top by the
// binaries.
//
//   [catalog]
//   dir = "assets"        # omit to use the bundled catalog
//   name = "badania"
//
//   [search]
//   debounce_ms = 300
//
//   [logging]
//   level = "info"
//   json = false
//   file = "exam-catalog.log"
//
//   [server]
//   bind = "0.0.0.0:3000"

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::parser::{BundledSource, CatalogSource, DirectorySource, DEFAULT_CATALOG};
use crate::search::{Debouncer, DEFAULT_DEBOUNCE};

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "EXAM_CATALOG_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// Directory holding `<name>.csv`; `None` selects the bundled catalog
    pub dir: Option<PathBuf>,
    pub name: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig {
            dir: None,
            name: DEFAULT_CATALOG.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    pub debounce_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` wins when set
    pub level: String,
    pub json: bool,
    /// Write logs here instead of stderr
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Config {
    /// Parse TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid configuration")
    }

    /// Read a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("In config file: {}", path.display()))
    }

    /// `explicit` if given, else the file named by `EXAM_CATALOG_CONFIG`,
    /// else defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::from_file(Path::new(&path)),
            _ => Ok(Config::default()),
        }
    }

    pub fn debouncer(&self) -> Debouncer {
        Debouncer::new(Duration::from_millis(self.search.debounce_ms))
    }

    /// The catalog source this configuration points at
    pub fn catalog_source(&self) -> Arc<dyn CatalogSource> {
        match &self.catalog.dir {
            Some(dir) => Arc::new(DirectorySource::new(dir.clone())),
            None => Arc::new(BundledSource::new()),
        }
    }
}
