// Entity Models
//
// Each entity has a stable identity (UUID) that is independent of its values:
// - CatalogEntry: one orderable lab test, immutable once loaded
// - SelectionLine: one entry plus a quantity in the working cart

pub mod catalog_entry;
pub mod selection_line;

pub use catalog_entry::{CatalogEntry, EntryId, SharedEntry};
pub use selection_line::{LineId, SelectionLine};
