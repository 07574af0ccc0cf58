// 🔎 Search - catalog filtering and input debouncing
//
// `filter` is pure. `Debouncer` decides WHEN to call it: callers schedule a
// refresh on every query change and poll the debouncer from their event
// loop. Only the latest schedule can fire.

use std::time::{Duration, Instant};

use crate::entities::SharedEntry;

/// Quiet period between the last keystroke and the filter refresh
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

// ============================================================================
// FILTER
// ============================================================================

/// Entries whose name or code contains `query`, ignoring case
///
/// The query is not trimmed: leading and trailing spaces take part in the
/// match. An empty query returns every entry. Order is preserved.
pub fn filter(entries: &[SharedEntry], query: &str) -> Vec<SharedEntry> {
    if query.is_empty() {
        return entries.to_vec();
    }

    let needle = query.to_lowercase();
    entries
        .iter()
        .filter(|entry| entry.matches_lowercase(&needle))
        .cloned()
        .collect()
}

// ============================================================================
// DEBOUNCER
// ============================================================================

/// Handle to one scheduled refresh
///
/// Rescheduling or cancelling the debouncer invalidates every earlier
/// handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    generation: u64,
}

/// Cancelable single-slot timer
///
/// At most one refresh is pending at a time. Time is passed in explicitly
/// so the debouncer works with any event loop and can be tested without
/// sleeping.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
    generation: u64,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            deadline: None,
            generation: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Start the quiet period at `now`, replacing any pending timer
    pub fn schedule(&mut self, now: Instant) -> TimerHandle {
        self.generation += 1;
        self.deadline = Some(now + self.delay);
        TimerHandle {
            generation: self.generation,
        }
    }

    /// Drop the pending timer, if any
    pub fn cancel(&mut self) {
        if self.deadline.take().is_some() {
            self.generation += 1;
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Whether `handle` belongs to the timer that is still pending
    pub fn is_current(&self, handle: TimerHandle) -> bool {
        self.deadline.is_some() && handle.generation == self.generation
    }

    /// Fire if the pending timer is due. Returns true at most once per
    /// schedule.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Time left before the pending timer fires; `None` when idle
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Debouncer::new(DEFAULT_DEBOUNCE)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::CatalogEntry;

    fn catalog() -> Vec<SharedEntry> {
        vec![
            CatalogEntry::new("B003", "Glukoza", Some(10.0)).shared(),
            CatalogEntry::new("B001", "Morfologia", Some(25.0)).shared(),
            CatalogEntry::new("TSH", "Hormon tyreotropowy", Some(30.0)).shared(),
        ]
    }

    fn names(entries: &[SharedEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_empty_query_returns_everything_in_order() {
        let entries = catalog();
        let result = filter(&entries, "");

        assert_eq!(result, entries);
    }

    #[test]
    fn test_filter_matches_name_case_insensitively() {
        let entries = catalog();

        assert_eq!(names(&filter(&entries, "morf")), vec!["Morfologia"]);
        assert_eq!(names(&filter(&entries, "MORF")), vec!["Morfologia"]);
    }

    #[test]
    fn test_filter_matches_code() {
        let entries = catalog();

        assert_eq!(names(&filter(&entries, "b00")), vec!["Glukoza", "Morfologia"]);
        assert_eq!(names(&filter(&entries, "tsh")), vec!["Hormon tyreotropowy"]);
    }

    #[test]
    fn test_filter_does_not_trim_query() {
        let entries = catalog();

        assert!(filter(&entries, " morf").is_empty());
        assert_eq!(names(&filter(&entries, "hormon ")), vec!["Hormon tyreotropowy"]);
    }

    #[test]
    fn test_filter_handles_polish_letters() {
        let entries = vec![CatalogEntry::new("B018", "Żelazo", Some(15.0)).shared()];

        assert_eq!(filter(&entries, "żel").len(), 1);
        assert_eq!(filter(&entries, "ŻEL").len(), 1);
    }

    #[test]
    fn test_filter_shares_entries() {
        let entries = catalog();
        let result = filter(&entries, "glu");

        assert!(std::sync::Arc::ptr_eq(&result[0], &entries[0]));
    }

    #[test]
    fn test_debouncer_fires_after_delay() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(300));

        debouncer.schedule(start);
        assert!(debouncer.is_pending());
        assert!(!debouncer.poll(start + Duration::from_millis(299)));
        assert!(debouncer.poll(start + Duration::from_millis(300)));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn test_debouncer_fires_once() {
        let start = Instant::now();
        let mut debouncer = Debouncer::default();

        debouncer.schedule(start);
        assert!(debouncer.poll(start + Duration::from_secs(1)));
        assert!(!debouncer.poll(start + Duration::from_secs(2)));
    }

    #[test]
    fn test_reschedule_postpones_and_invalidates() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(300));

        let first = debouncer.schedule(start);
        let second = debouncer.schedule(start + Duration::from_millis(200));

        assert!(!debouncer.is_current(first));
        assert!(debouncer.is_current(second));
        assert!(!debouncer.poll(start + Duration::from_millis(300)));
        assert!(debouncer.poll(start + Duration::from_millis(500)));
        assert!(!debouncer.is_current(second));
    }

    #[test]
    fn test_cancel() {
        let start = Instant::now();
        let mut debouncer = Debouncer::default();

        let handle = debouncer.schedule(start);
        debouncer.cancel();

        assert!(!debouncer.is_current(handle));
        assert!(!debouncer.poll(start + Duration::from_secs(1)));
        assert_eq!(debouncer.time_until_due(start), None);
    }

    #[test]
    fn test_time_until_due() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(300));
        debouncer.schedule(start);

        assert_eq!(
            debouncer.time_until_due(start + Duration::from_millis(100)),
            Some(Duration::from_millis(200))
        );
        assert_eq!(
            debouncer.time_until_due(start + Duration::from_millis(400)),
            Some(Duration::ZERO)
        );
    }
}
