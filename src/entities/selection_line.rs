// 🛒 Selection Line - One catalog entry plus a quantity
//
// The line has its own identity, separate from the entry it points to.
// Quantity is always >= 1; the store removes a line instead of letting it
// reach zero.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::catalog_entry::SharedEntry;
use crate::money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(Uuid);

impl LineId {
    pub fn new() -> Self {
        LineId(Uuid::new_v4())
    }
}

impl Default for LineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionLine {
    pub id: LineId,
    pub entry: SharedEntry,
    pub quantity: u32,
}

impl SelectionLine {
    /// New line with quantity 1
    pub fn new(entry: SharedEntry) -> Self {
        SelectionLine {
            id: LineId::new(),
            entry,
            quantity: 1,
        }
    }

    /// amount * quantity, or 0 when the entry has no amount
    pub fn line_total(&self) -> f64 {
        self.entry
            .amount
            .map(|amount| amount * f64::from(self.quantity))
            .unwrap_or(0.0)
    }

    pub fn formatted_line_total(&self) -> String {
        money::format_amount(self.line_total())
    }
}
