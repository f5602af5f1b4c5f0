//! Post-commit history change notification.
//!
//! Subscribers get a channel receiver; the store publishes the committed,
//! windowed, newest-first snapshot after every merge cycle. Publication is
//! non-blocking for the appender (unbounded channel, no waiting on
//! subscriber completion) and happens strictly after the persist step, so a
//! subscriber only ever observes committed state.

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::model::event::HistoryEvent;

/// Committed, newest-first view of the history log, shared without copying.
pub type HistorySnapshot = Arc<Vec<HistoryEvent>>;

/// Fan-out registry for history-updated notifications.
#[derive(Debug, Default)]
pub struct HistoryUpdates {
    senders: Mutex<Vec<Sender<HistorySnapshot>>>,
}

impl HistoryUpdates {
    /// Register a new subscriber.
    ///
    /// The receiver sees every snapshot published after this call. Dropping
    /// the receiver unsubscribes on the next publish.
    pub fn subscribe(&self) -> Receiver<HistorySnapshot> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.senders.lock().push(tx);
        rx
    }

    /// Deliver `snapshot` to every live subscriber.
    ///
    /// Subscribers whose receiver has been dropped are pruned here.
    pub fn publish(&self, snapshot: &HistorySnapshot) {
        let mut senders = self.senders.lock();
        senders.retain(|tx| tx.send(Arc::clone(snapshot)).is_ok());
    }

    /// Number of live subscribers (for tests and diagnostics).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.senders.lock().len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
