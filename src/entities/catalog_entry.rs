// 🧪 Catalog Entry - One orderable lab test
//
// "Code and name are VALUES, the UUID is IDENTITY"
//
// Two rows with the same code and name are still two distinct entries.
// The selection store deduplicates by `id` only, never by content or by
// pointer identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::money;

// ============================================================================
// IDENTITY
// ============================================================================

/// Stable identity of a catalog entry within one loaded catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> Self {
        EntryId(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// CATALOG ENTRY
// ============================================================================

/// A lab test as listed in the catalog source
///
/// Entries are created in bulk by the loader and never mutated afterwards.
/// A reload replaces the whole catalog, so ids from an older catalog do not
/// match entries of a newer one even when the rows are identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: EntryId,

    /// Short display label (e.g. "B001"), not validated
    pub code: String,

    /// Display name, never empty
    pub name: String,

    /// Price in the local currency; `None` when the source field was blank
    /// or could not be parsed
    pub amount: Option<f64>,
}

/// Entries are shared read-only between the catalog and the selection lines
pub type SharedEntry = Arc<CatalogEntry>;

impl CatalogEntry {
    /// Create an entry with a fresh id
    pub fn new(code: impl Into<String>, name: impl Into<String>, amount: Option<f64>) -> Self {
        Self::with_id(EntryId::new(), code, name, amount)
    }

    /// Create an entry with a caller-supplied id
    pub fn with_id(
        id: EntryId,
        code: impl Into<String>,
        name: impl Into<String>,
        amount: Option<f64>,
    ) -> Self {
        CatalogEntry {
            id,
            code: code.into(),
            name: name.into(),
            amount,
        }
    }

    pub fn shared(self) -> SharedEntry {
        Arc::new(self)
    }

    /// Case-insensitive substring match on name or code.
    /// `needle` must already be lower-cased.
    pub fn matches_lowercase(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle) || self.code.to_lowercase().contains(needle)
    }

    /// Amount rendered for display ("25,00 zł", or "-" when absent)
    pub fn formatted_amount(&self) -> String {
        match self.amount {
            Some(amount) => money::format_amount(amount),
            None => money::MISSING_AMOUNT.to_string(),
        }
    }
}
