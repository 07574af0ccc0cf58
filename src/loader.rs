// Background catalog loading
//
// The read and parse run on a worker thread. The owner receives exactly one
// `LoadOutcome` per spawned load over a channel and applies it on its own
// thread. A worker that dies without sending still yields an outcome, carrying
// `LoadError::Interrupted`.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::entities::SharedEntry;
use crate::parser::{self, CatalogSource, LoadError};

/// Identifies one load request so that superseded results can be ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadTicket(pub u64);

#[derive(Debug)]
pub struct LoadOutcome {
    pub ticket: LoadTicket,
    pub result: Result<Vec<SharedEntry>, LoadError>,
}

/// Receiving end of one background load
#[derive(Debug)]
pub struct LoadHandle {
    ticket: LoadTicket,
    name: String,
    receiver: Receiver<LoadOutcome>,
    delivered: bool,
}

impl LoadHandle {
    /// Non-blocking check. Yields the outcome once, then `None` forever.
    pub fn try_take(&mut self) -> Option<LoadOutcome> {
        if self.delivered {
            return None;
        }

        match self.receiver.try_recv() {
            Ok(outcome) => Some(self.deliver(outcome)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.interrupted()),
        }
    }

    /// Block until the outcome arrives or `timeout` passes
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<LoadOutcome> {
        if self.delivered {
            return None;
        }

        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => Some(self.deliver(outcome)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(self.interrupted()),
        }
    }

    /// Block until the outcome arrives
    pub fn wait(mut self) -> Option<LoadOutcome> {
        if self.delivered {
            return None;
        }

        match self.receiver.recv() {
            Ok(outcome) => Some(self.deliver(outcome)),
            Err(_) => Some(self.interrupted()),
        }
    }

    fn deliver(&mut self, outcome: LoadOutcome) -> LoadOutcome {
        self.delivered = true;
        outcome
    }

    /// The worker went away without sending (it panicked)
    fn interrupted(&mut self) -> LoadOutcome {
        tracing::error!(ticket = self.ticket.0, name = %self.name, "catalog load worker died");
        self.deliver(LoadOutcome {
            ticket: self.ticket,
            result: Err(LoadError::Interrupted {
                name: self.name.clone(),
            }),
        })
    }
}

/// Run `parser::load` on a worker thread
pub fn spawn_load(
    source: Arc<dyn CatalogSource>,
    name: impl Into<String>,
    ticket: LoadTicket,
) -> LoadHandle {
    let name = name.into();
    let (sender, receiver) = mpsc::channel();

    let worker_name = name.clone();
    thread::spawn(move || {
        let result = parser::load(source.as_ref(), &worker_name);
        if let Err(err) = &result {
            tracing::warn!(error = %err, ticket = ticket.0, "catalog load failed");
        }
        // The owner may have dropped the handle; nothing to do then
        let _ = sender.send(LoadOutcome { ticket, result });
    });

    LoadHandle {
        ticket,
        name,
        receiver,
        delivered: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MemorySource;

    /// Source whose reads always panic
    struct PanickingSource;

    impl CatalogSource for PanickingSource {
        fn read(&self, name: &str) -> Result<Vec<u8>, LoadError> {
            panic!("reading {} blew up", name);
        }

        fn describe(&self) -> String {
            "panicking".to_string()
        }
    }

    #[test]
    fn test_spawn_load_delivers_success() {
        let source = Arc::new(MemorySource::new().with_text("badania", "h\nA1;Test A;5,00\n"));
        let handle = spawn_load(source, "badania", LoadTicket(1));

        let outcome = handle.wait().unwrap();
        assert_eq!(outcome.ticket, LoadTicket(1));
        assert_eq!(outcome.result.unwrap().len(), 1);
    }

    #[test]
    fn test_spawn_load_delivers_failure() {
        let source = Arc::new(MemorySource::new());
        let mut handle = spawn_load(source, "badania", LoadTicket(7));

        let outcome = handle.wait_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.ticket, LoadTicket(7));
        assert!(matches!(outcome.result, Err(LoadError::NotFound { .. })));
    }

    #[test]
    fn test_outcome_is_delivered_exactly_once() {
        let source = Arc::new(MemorySource::new().with_text("badania", "h\n"));
        let mut handle = spawn_load(source, "badania", LoadTicket(2));

        assert!(handle.wait_timeout(Duration::from_secs(5)).is_some());
        assert!(handle.try_take().is_none());
        assert!(handle.wait_timeout(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn test_panicking_worker_yields_interrupted() {
        let mut handle = spawn_load(Arc::new(PanickingSource), "badania", LoadTicket(3));

        let outcome = handle.wait_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.ticket, LoadTicket(3));
        match outcome.result {
            Err(err @ LoadError::Interrupted { .. }) => assert_eq!(err.source_name(), "badania"),
            other => panic!("expected an interrupted load, got {:?}", other),
        }
        assert!(handle.try_take().is_none());
    }
}
