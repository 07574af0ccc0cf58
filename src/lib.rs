// Exam Catalog - Core Library
// Catalog loading, search and the selection cart, shared by the CLI,
// the terminal UI and the API server

pub mod catalog;
pub mod config;
pub mod entities;
pub mod loader;
pub mod logging;
pub mod money;
pub mod parser;
pub mod search;
pub mod selection;

// Re-export commonly used types
pub use catalog::{CatalogView, LoadStatus};
pub use config::Config;
pub use entities::{CatalogEntry, EntryId, LineId, SelectionLine, SharedEntry};
pub use loader::{spawn_load, LoadHandle, LoadOutcome, LoadTicket};
pub use parser::{
    load, parse_amount, parse_catalog,
    BundledSource, CatalogSource, DirectorySource, MemorySource,
    LoadError, ParseStats, DEFAULT_CATALOG,
};
pub use search::{filter, Debouncer, TimerHandle};
pub use selection::{ObserverId, SelectionEvent, SelectionStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
