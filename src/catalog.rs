// 📚 Catalog View - load status, query and visible entries
//
// UI-free owner of everything the search screen shows:
//   load status -> full catalog -> query -> (debounced) visible subset
//
// All methods run on the owning thread. Loads are started elsewhere (see
// `loader`) and handed back through `finish_load`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

use crate::entities::SharedEntry;
use crate::loader::LoadTicket;
use crate::parser::LoadError;
use crate::search::{self, Debouncer};

/// Prefix of the message shown when a load fails
pub const LOAD_ERROR_PREFIX: &str = "Failed to load catalog";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadStatus {
    /// No load started yet
    Idle,
    Loading,
    Loaded {
        count: usize,
        loaded_at: DateTime<Utc>,
    },
    /// Terminal failure of the last load; the user may retry
    Failed { message: String },
}

impl LoadStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadStatus::Loading)
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            LoadStatus::Failed { message } => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct CatalogView {
    entries: Vec<SharedEntry>,
    visible: Vec<SharedEntry>,
    query: String,
    /// Query that `visible` was computed from
    applied_query: String,
    status: LoadStatus,
    debouncer: Debouncer,
    current_ticket: Option<LoadTicket>,
    next_ticket: u64,
}

impl CatalogView {
    pub fn new(debouncer: Debouncer) -> Self {
        CatalogView {
            entries: Vec::new(),
            visible: Vec::new(),
            query: String::new(),
            applied_query: String::new(),
            status: LoadStatus::Idle,
            debouncer,
            current_ticket: None,
            next_ticket: 0,
        }
    }

    // ========================================================================
    // LOADING
    // ========================================================================

    /// Mark a new load as in flight and return its ticket.
    /// Any older in-flight load is superseded.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.next_ticket += 1;
        let ticket = LoadTicket(self.next_ticket);
        self.current_ticket = Some(ticket);
        self.status = LoadStatus::Loading;
        ticket
    }

    /// Apply the result of a load. Returns false when the ticket is stale
    /// and the result was ignored.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<SharedEntry>, LoadError>,
    ) -> bool {
        if self.current_ticket != Some(ticket) {
            tracing::debug!(ticket = ticket.0, "ignoring superseded catalog load");
            return false;
        }
        self.current_ticket = None;

        match result {
            Ok(entries) => {
                self.status = LoadStatus::Loaded {
                    count: entries.len(),
                    loaded_at: Utc::now(),
                };
                self.entries = entries;
                self.apply_query();
            }
            Err(err) => {
                self.status = LoadStatus::Failed {
                    message: format!("{}: {}", LOAD_ERROR_PREFIX, err),
                };
            }
        }
        true
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    // ========================================================================
    // SEARCH
    // ========================================================================

    /// Record a new query and (re)start the quiet period
    pub fn set_query(&mut self, query: impl Into<String>, now: Instant) {
        let query = query.into();
        if query == self.query {
            return;
        }
        self.query = query;
        self.debouncer.schedule(now);
    }

    /// Apply the pending query if its quiet period is over.
    /// Returns true when `visible` changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.debouncer.poll(now) {
            self.apply_query();
            true
        } else {
            false
        }
    }

    /// Apply the pending query right away.
    /// Returns true when `visible` changed.
    pub fn flush(&mut self) -> bool {
        if !self.debouncer.is_pending() {
            return false;
        }
        self.debouncer.cancel();
        self.apply_query();
        true
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    fn apply_query(&mut self) {
        self.visible = search::filter(&self.entries, &self.query);
        self.applied_query = self.query.clone();
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn applied_query(&self) -> &str {
        &self.applied_query
    }

    pub fn entries(&self) -> &[SharedEntry] {
        &self.entries
    }

    pub fn visible(&self) -> &[SharedEntry] {
        &self.visible
    }

    /// Look up an entry of the current catalog by code, ignoring case
    /// (first match)
    pub fn find_by_code(&self, code: &str) -> Option<&SharedEntry> {
        let code = code.to_lowercase();
        self.entries
            .iter()
            .find(|entry| entry.code.to_lowercase() == code)
    }
}

impl Default for CatalogView {
    fn default() -> Self {
        CatalogView::new(Debouncer::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::CatalogEntry;
    use std::time::Duration;

    fn catalog() -> Vec<SharedEntry> {
        vec![
            CatalogEntry::new("B003", "Glukoza", Some(10.0)).shared(),
            CatalogEntry::new("B001", "Morfologia", Some(25.0)).shared(),
        ]
    }

    fn loaded_view() -> CatalogView {
        let mut view = CatalogView::default();
        let ticket = view.begin_load();
        assert!(view.finish_load(ticket, Ok(catalog())));
        view
    }

    #[test]
    fn test_load_success() {
        let view = loaded_view();

        assert!(matches!(view.status(), LoadStatus::Loaded { count: 2, .. }));
        assert_eq!(view.visible().len(), 2);
    }

    #[test]
    fn test_begin_load_marks_loading() {
        let mut view = CatalogView::default();
        assert_eq!(view.status(), &LoadStatus::Idle);

        view.begin_load();
        assert!(view.status().is_loading());
    }

    #[test]
    fn test_load_failure_keeps_previous_catalog() {
        let mut view = loaded_view();
        let ticket = view.begin_load();

        let err = LoadError::NotFound {
            name: "badania".to_string(),
        };
        assert!(view.finish_load(ticket, Err(err)));

        let message = view.status().error_message().unwrap();
        assert!(message.starts_with(LOAD_ERROR_PREFIX));
        assert!(message.contains("badania"));
        assert_eq!(view.entries().len(), 2);
    }

    #[test]
    fn test_retry_after_failure() {
        let mut view = CatalogView::default();
        let ticket = view.begin_load();
        view.finish_load(
            ticket,
            Err(LoadError::NotFound {
                name: "badania".to_string(),
            }),
        );

        let retry = view.begin_load();
        assert!(view.status().error_message().is_none());
        assert!(view.finish_load(retry, Ok(catalog())));
        assert_eq!(view.entries().len(), 2);
    }

    #[test]
    fn test_stale_ticket_is_ignored() {
        let mut view = CatalogView::default();
        let old = view.begin_load();
        let new = view.begin_load();

        assert!(!view.finish_load(old, Ok(catalog())));
        assert!(view.entries().is_empty());
        assert!(view.status().is_loading());

        assert!(view.finish_load(new, Ok(catalog())));
        assert!(!view.finish_load(new, Ok(Vec::new())));
        assert_eq!(view.entries().len(), 2);
    }

    #[test]
    fn test_query_applies_after_quiet_period() {
        let mut view = loaded_view();
        let start = Instant::now();

        view.set_query("m", start);
        view.set_query("mo", start + Duration::from_millis(100));
        view.set_query("morf", start + Duration::from_millis(200));

        assert!(!view.tick(start + Duration::from_millis(300)));
        assert_eq!(view.visible().len(), 2);

        assert!(view.tick(start + Duration::from_millis(500)));
        assert_eq!(view.visible().len(), 1);
        assert_eq!(view.visible()[0].name, "Morfologia");
        assert_eq!(view.applied_query(), "morf");
    }

    #[test]
    fn test_reload_applies_current_query_immediately() {
        let mut view = CatalogView::default();
        view.set_query("glu", Instant::now());

        let ticket = view.begin_load();
        view.finish_load(ticket, Ok(catalog()));

        assert_eq!(view.visible().len(), 1);
        assert_eq!(view.visible()[0].name, "Glukoza");
    }

    #[test]
    fn test_flush() {
        let mut view = loaded_view();
        view.set_query("glu", Instant::now());

        assert!(view.flush());
        assert_eq!(view.visible().len(), 1);
        assert!(!view.debouncer().is_pending());
        assert!(!view.flush());
    }

    #[test]
    fn test_clearing_query_restores_all() {
        let mut view = loaded_view();
        let start = Instant::now();

        view.set_query("glu", start);
        view.flush();
        view.set_query("", start);
        view.tick(start + Duration::from_secs(1));

        assert_eq!(view.visible().len(), 2);
    }

    #[test]
    fn test_find_by_code() {
        let view = loaded_view();

        assert_eq!(view.find_by_code("B001").map(|e| e.name.as_str()), Some("Morfologia"));
        assert_eq!(view.find_by_code("b003").map(|e| e.name.as_str()), Some("Glukoza"));
        assert!(view.find_by_code("nope").is_none());
    }
}
