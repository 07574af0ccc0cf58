// 🏗️ Catalog Loader
// Turns a `;`-delimited catalog source into sorted catalog entries
//
// Source format (UTF-8):
//   KOD;NAZWA BADANIA;KWOTA
//   B001;Morfologia;25,00
//
// The first line is always a header. Malformed rows are dropped, a missing
// or unreadable source fails the whole load.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::entities::{CatalogEntry, SharedEntry};

/// Logical name of the catalog shipped with the application
pub const DEFAULT_CATALOG: &str = "badania";

/// File extension appended to logical names by `DirectorySource`
pub const CATALOG_EXTENSION: &str = "csv";

const FIELD_DELIMITER: u8 = b';';
const MIN_FIELDS: usize = 3;

// ============================================================================
// ERRORS
// ============================================================================

/// A load either yields a (possibly empty) catalog or exactly one of these.
/// Row-level problems are never errors.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("catalog source '{name}' not found")]
    NotFound { name: String },

    #[error("catalog source '{name}' is not valid UTF-8: {source}")]
    Encoding {
        name: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("failed to read catalog source '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("loading catalog source '{name}' stopped before finishing")]
    Interrupted { name: String },
}

impl LoadError {
    /// Logical name of the source that failed
    pub fn source_name(&self) -> &str {
        match self {
            LoadError::NotFound { name }
            | LoadError::Encoding { name, .. }
            | LoadError::Io { name, .. }
            | LoadError::Interrupted { name } => name,
        }
    }
}

// ============================================================================
// SOURCES
// ============================================================================

/// Where catalog text comes from, addressed by logical name
///
/// Adding a new kind of source means implementing this trait; the loader
/// itself does not change.
pub trait CatalogSource: Send + Sync {
    /// Return the raw bytes of the named source
    fn read(&self, name: &str) -> Result<Vec<u8>, LoadError>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Reads `<dir>/<name>.csv` from disk
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectorySource { dir: dir.into() }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, CATALOG_EXTENSION))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl CatalogSource for DirectorySource {
    fn read(&self, name: &str) -> Result<Vec<u8>, LoadError> {
        let path = self.path_for(name);
        fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound {
                name: name.to_string(),
            },
            _ => LoadError::Io {
                name: name.to_string(),
                source,
            },
        })
    }

    fn describe(&self) -> String {
        format!("directory {}", self.dir.display())
    }
}

/// Catalogs compiled into the binary
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledSource;

const BUNDLED: &[(&str, &[u8])] = &[(DEFAULT_CATALOG, include_bytes!("../assets/badania.csv"))];

impl BundledSource {
    pub fn new() -> Self {
        BundledSource
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        BUNDLED.iter().map(|(name, _)| *name)
    }
}

impl CatalogSource for BundledSource {
    fn read(&self, name: &str) -> Result<Vec<u8>, LoadError> {
        BUNDLED
            .iter()
            .find(|(bundled, _)| *bundled == name)
            .map(|(_, bytes)| bytes.to_vec())
            .ok_or_else(|| LoadError::NotFound {
                name: name.to_string(),
            })
    }

    fn describe(&self) -> String {
        "bundled resources".to_string()
    }
}

/// Named in-memory sources
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        MemorySource::default()
    }

    /// Builder pattern: add a text source
    pub fn with_text(self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.with_bytes(name, text.into().into_bytes())
    }

    /// Builder pattern: add a raw byte source (may be invalid UTF-8)
    pub fn with_bytes(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.files.insert(name.into(), bytes);
        self
    }
}

impl CatalogSource for MemorySource {
    fn read(&self, name: &str) -> Result<Vec<u8>, LoadError> {
        self.files.get(name).cloned().ok_or_else(|| LoadError::NotFound {
            name: name.to_string(),
        })
    }

    fn describe(&self) -> String {
        format!("memory ({} sources)", self.files.len())
    }
}

// ============================================================================
// PARSING
// ============================================================================

/// Counters collected while parsing, reported in logs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Non-empty data rows seen after the header
    pub rows: usize,
    /// Rows dropped for having fewer than 3 fields or an empty name
    pub skipped: usize,
    /// Entries kept whose amount could not be parsed
    pub missing_amounts: usize,
}

/// Parse an amount written with a decimal comma ("150,00" -> 150.0)
///
/// Only the first comma is replaced, so thousands separators or extra
/// commas make the value unparseable. Blank input and anything that does
/// not parse to a finite number yields `None`. Negative values are kept.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized = trimmed.replacen(',', ".", 1);
    normalized
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Everything after the first line (CRLF, LF or lone CR terminated)
fn strip_header(text: &str) -> &str {
    match text.find(|c: char| c == '\n' || c == '\r') {
        Some(idx) => {
            let rest = &text[idx..];
            rest.strip_prefix("\r\n")
                .or_else(|| rest.strip_prefix('\n'))
                .or_else(|| rest.strip_prefix('\r'))
                .unwrap_or(rest)
        }
        None => "",
    }
}

/// Parse catalog text into entries sorted case-insensitively by name
pub fn parse_catalog(text: &str) -> (Vec<SharedEntry>, ParseStats) {
    let body = strip_header(text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(FIELD_DELIMITER)
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut stats = ParseStats::default();
    let mut entries = Vec::new();

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                stats.skipped += 1;
                tracing::debug!(error = %err, "skipping unreadable catalog row");
                continue;
            }
        };

        // The reader already drops blank lines; whitespace-only lines come
        // through as a single empty field.
        if record.len() == 1 && record.get(0).map_or(true, str::is_empty) {
            continue;
        }
        stats.rows += 1;

        if record.len() < MIN_FIELDS {
            stats.skipped += 1;
            continue;
        }

        let code = record.get(0).unwrap_or("");
        let name = record.get(1).unwrap_or("");
        let raw_amount = record.get(2).unwrap_or("");

        if name.is_empty() {
            stats.skipped += 1;
            continue;
        }

        let amount = parse_amount(raw_amount);
        if amount.is_none() {
            stats.missing_amounts += 1;
        }

        entries.push(CatalogEntry::new(code, name, amount).shared());
    }

    sort_by_name(&mut entries);
    (entries, stats)
}

/// Stable, case-insensitive sort by name
pub fn sort_by_name(entries: &mut [SharedEntry]) {
    entries.sort_by_cached_key(|entry| entry.name.to_lowercase());
}

/// Read, decode and parse the named catalog source
pub fn load(source: &dyn CatalogSource, name: &str) -> Result<Vec<SharedEntry>, LoadError> {
    tracing::debug!(source = %source.describe(), name, "loading catalog");

    let bytes = source.read(name)?;
    let text = String::from_utf8(bytes).map_err(|source| LoadError::Encoding {
        name: name.to_string(),
        source,
    })?;

    let (entries, stats) = parse_catalog(&text);
    tracing::info!(
        name,
        entries = entries.len(),
        skipped = stats.skipped,
        missing_amounts = stats.missing_amounts,
        "catalog loaded"
    );

    Ok(entries)
}

// ============================================================================
// TESTS
// ============================================================================
