// 🛒 Selection Store - the working cart
//
// An ordered list of (entry, quantity) lines plus observers.
//
// Rules:
// - `add` deduplicates by entry id: an existing line is incremented in
//   place, otherwise a new line is appended
// - a line never holds quantity 0; decrementing from 1 removes it
// - removing and re-adding an entry puts it at the end of the list
// - total and count are derived from the lines on every read
//
// The store has a single owner. Observers run synchronously after each
// change and cannot reach back into the store while they run.

use serde::Serialize;

use crate::entities::{EntryId, LineId, SelectionLine, SharedEntry};

/// What observers receive after every change
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SelectionEvent<'a> {
    pub lines: &'a [SelectionLine],
    pub total: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Box<dyn FnMut(&SelectionEvent<'_>) + Send>;

#[derive(Default)]
pub struct SelectionStore {
    lines: Vec<SelectionLine>,
    observers: Vec<(ObserverId, Observer)>,
    next_observer: u64,
}

impl std::fmt::Debug for SelectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionStore")
            .field("lines", &self.lines)
            .field("observers", &self.observers.len())
            .finish()
    }
}

fn sum_lines(lines: &[SelectionLine]) -> f64 {
    lines.iter().map(SelectionLine::line_total).sum()
}

impl SelectionStore {
    pub fn new() -> Self {
        SelectionStore::default()
    }

    // ========================================================================
    // OBSERVERS
    // ========================================================================

    /// Register an observer; it is called after every state change
    pub fn subscribe<F>(&mut self, observer: F) -> ObserverId
    where
        F: FnMut(&SelectionEvent<'_>) + Send + 'static,
    {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Returns false when the id was not registered
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    fn notify(&mut self) {
        let event = SelectionEvent {
            lines: &self.lines,
            total: sum_lines(&self.lines),
            count: self.lines.len(),
        };
        for (_, observer) in self.observers.iter_mut() {
            observer(&event);
        }
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Add one unit of `entry`. Returns the id of the line that holds it.
    pub fn add(&mut self, entry: SharedEntry) -> LineId {
        let line_id = match self.lines.iter_mut().find(|line| line.entry.id == entry.id) {
            Some(line) => {
                line.quantity = line.quantity.saturating_add(1);
                tracing::trace!(entry = %entry.id, quantity = line.quantity, "selection line incremented");
                line.id
            }
            None => {
                let line = SelectionLine::new(entry);
                let id = line.id;
                tracing::trace!(entry = %line.entry.id, line = %id, "selection line added");
                self.lines.push(line);
                id
            }
        };

        self.notify();
        line_id
    }

    /// Delete a line. Returns false (and changes nothing) when absent.
    pub fn remove(&mut self, line_id: LineId) -> bool {
        let Some(index) = self.position(line_id) else {
            return false;
        };

        self.lines.remove(index);
        tracing::trace!(line = %line_id, "selection line removed");
        self.notify();
        true
    }

    /// Remove every line
    pub fn clear(&mut self) {
        if self.lines.is_empty() {
            return;
        }

        self.lines.clear();
        tracing::trace!("selection cleared");
        self.notify();
    }

    /// Add one to a line's quantity. Returns false when absent.
    pub fn increment(&mut self, line_id: LineId) -> bool {
        let Some(index) = self.position(line_id) else {
            return false;
        };

        self.lines[index].quantity = self.lines[index].quantity.saturating_add(1);
        self.notify();
        true
    }

    /// Take one from a line's quantity, removing the line when it would
    /// reach zero. Returns false when absent.
    pub fn decrement(&mut self, line_id: LineId) -> bool {
        let Some(index) = self.position(line_id) else {
            return false;
        };

        if self.lines[index].quantity > 1 {
            self.lines[index].quantity -= 1;
        } else {
            self.lines.remove(index);
            tracing::trace!(line = %line_id, "selection line removed by decrement");
        }

        self.notify();
        true
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub fn lines(&self) -> &[SelectionLine] {
        &self.lines
    }

    pub fn get(&self, line_id: LineId) -> Option<&SelectionLine> {
        self.lines.iter().find(|line| line.id == line_id)
    }

    /// The line holding `entry_id`, if that entry is selected
    pub fn line_for_entry(&self, entry_id: EntryId) -> Option<&SelectionLine> {
        self.lines.iter().find(|line| line.entry.id == entry_id)
    }

    /// Sum of line totals; lines without an amount contribute 0
    pub fn total(&self) -> f64 {
        sum_lines(&self.lines)
    }

    /// Number of lines (not units)
    pub fn count(&self) -> usize {
        self.lines.len()
    }

    /// Number of units across all lines
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn position(&self, line_id: LineId) -> Option<usize> {
        self.lines.iter().position(|line| line.id == line_id)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::CatalogEntry;
    use std::sync::{Arc, Mutex};

    fn entry(code: &str, name: &str, amount: Option<f64>) -> SharedEntry {
        CatalogEntry::new(code, name, amount).shared()
    }

    #[test]
    fn test_add_new_entry_appends_line() {
        let mut store = SelectionStore::new();
        let a = entry("A1", "Test A", Some(5.0));
        let b = entry("A2", "Test B", Some(7.0));

        store.add(a.clone());
        store.add(b.clone());

        assert_eq!(store.count(), 2);
        assert_eq!(store.lines()[0].entry.id, a.id);
        assert_eq!(store.lines()[1].entry.id, b.id);
        assert!(store.lines().iter().all(|l| l.quantity == 1));
    }

    #[test]
    fn test_add_same_entry_twice_increments() {
        let mut store = SelectionStore::new();
        let a = entry("A1", "Test A", Some(5.0));

        let first = store.add(a.clone());
        let second = store.add(a.clone());

        assert_eq!(first, second);
        assert_eq!(store.count(), 1);
        assert_eq!(store.lines()[0].quantity, 2);
    }

    #[test]
    fn test_add_dedups_by_id_not_by_content() {
        let mut store = SelectionStore::new();
        let a = entry("A1", "Test A", Some(5.0));
        let twin = entry("A1", "Test A", Some(5.0));

        store.add(a);
        store.add(twin);

        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_add_dedups_across_distinct_allocations() {
        let mut store = SelectionStore::new();
        let a = CatalogEntry::new("A1", "Test A", Some(5.0));
        let copy = Arc::new(a.clone());

        store.add(Arc::new(a));
        store.add(copy);

        assert_eq!(store.count(), 1);
        assert_eq!(store.lines()[0].quantity, 2);
    }

    #[test]
    fn test_increment_keeps_position() {
        let mut store = SelectionStore::new();
        let a = store.add(entry("A1", "Test A", None));
        store.add(entry("A2", "Test B", None));

        assert!(store.increment(a));
        assert_eq!(store.lines()[0].id, a);
        assert_eq!(store.lines()[0].quantity, 2);
    }

    #[test]
    fn test_quantity_saturates_at_max() {
        let mut store = SelectionStore::new();
        let a = entry("A1", "Test A", Some(1.0));
        let line = store.add(a.clone());
        store.lines[0].quantity = u32::MAX;

        assert!(store.increment(line));
        store.add(a);

        assert_eq!(store.count(), 1);
        assert_eq!(store.lines()[0].quantity, u32::MAX);
    }

    #[test]
    fn test_decrement_reduces_then_removes() {
        let mut store = SelectionStore::new();
        let a = entry("A1", "Test A", Some(5.0));
        store.add(a.clone());
        let line = store.add(a);

        assert!(store.decrement(line));
        assert_eq!(store.get(line).map(|l| l.quantity), Some(1));

        assert!(store.decrement(line));
        assert!(store.get(line).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_unknown_line_ids_are_noops() {
        let mut store = SelectionStore::new();
        store.add(entry("A1", "Test A", Some(5.0)));
        let missing = LineId::new();

        assert!(!store.increment(missing));
        assert!(!store.decrement(missing));
        assert!(!store.remove(missing));
        assert_eq!(store.count(), 1);
        assert_eq!(store.lines()[0].quantity, 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut store = SelectionStore::new();
        let a = store.add(entry("A1", "Test A", Some(5.0)));
        store.add(entry("A2", "Test B", Some(6.0)));

        assert!(store.remove(a));
        assert_eq!(store.count(), 1);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.total(), 0.0);
    }

    #[test]
    fn test_readd_after_removal_moves_to_end() {
        let mut store = SelectionStore::new();
        let a = entry("A1", "Test A", Some(5.0));
        let b = entry("A2", "Test B", Some(6.0));

        let line_a = store.add(a.clone());
        store.add(b.clone());
        store.decrement(line_a);
        let new_line_a = store.add(a.clone());

        assert_ne!(line_a, new_line_a);
        assert_eq!(store.lines()[0].entry.id, b.id);
        assert_eq!(store.lines()[1].entry.id, a.id);
    }

    #[test]
    fn test_total_skips_missing_amounts() {
        let mut store = SelectionStore::new();
        let priced = entry("A1", "Priced", Some(10.0));
        let unpriced = entry("A2", "Unpriced", None);

        store.add(priced.clone());
        store.add(priced);
        for _ in 0..5 {
            store.add(unpriced.clone());
        }

        assert_eq!(store.total(), 20.0);
        assert_eq!(store.count(), 2);
        assert_eq!(store.total_quantity(), 7);
    }

    #[test]
    fn test_line_for_entry() {
        let mut store = SelectionStore::new();
        let a = entry("A1", "Test A", Some(5.0));
        let line = store.add(a.clone());

        assert_eq!(store.line_for_entry(a.id).map(|l| l.id), Some(line));
        assert!(store.line_for_entry(EntryId::new()).is_none());
    }

    #[test]
    fn test_observers_see_consistent_state() {
        let mut store = SelectionStore::new();
        let seen: Arc<Mutex<Vec<(usize, f64, usize)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        store.subscribe(move |event| {
            let recomputed: f64 = event.lines.iter().map(|l| l.line_total()).sum();
            assert_eq!(recomputed, event.total);
            sink.lock().unwrap().push((event.count, event.total, event.lines.len()));
        });

        let a = entry("A1", "Test A", Some(10.0));
        let line = store.add(a.clone());
        store.add(a);
        store.decrement(line);
        store.remove(line);

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![(1, 10.0, 1), (1, 20.0, 1), (1, 10.0, 1), (0, 0.0, 0)]
        );
    }

    #[test]
    fn test_noops_do_not_notify() {
        let mut store = SelectionStore::new();
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        store.subscribe(move |_| *counter.lock().unwrap() += 1);

        store.clear();
        store.remove(LineId::new());
        store.increment(LineId::new());
        store.decrement(LineId::new());

        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_unsubscribe() {
        let mut store = SelectionStore::new();
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let id = store.subscribe(move |_| *counter.lock().unwrap() += 1);

        store.add(entry("A1", "Test A", None));
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.add(entry("A2", "Test B", None));

        assert_eq!(*calls.lock().unwrap(), 1);
    }
}
