//! Canonical pump-history event store.
//!
//! [`EventStore`] owns the history log: it normalizes raw pump events,
//! merges them into the persisted log with identity-based dedup, applies the
//! rolling retention window, and notifies subscribers with the committed
//! view. It is the only writer; the reconciler only ever reads through it.
//!
//! # Merge cycle
//!
//! Every append runs one atomic cycle against the snapshot store:
//!
//! 1. read the persisted log (absent key reads as empty),
//! 2. append candidates, discarding any whose id is already present
//!    (first-write-wins),
//! 3. evict records older than the retention window,
//! 4. stable-sort descending by timestamp (the canonical ordering, and the
//!    one the reconciler's pairing depends on),
//! 5. persist the result wholesale,
//! 6. publish the new view to subscribers.
//!
//! Steps 1–5 run inside a single store transaction; a mutex totally orders
//! cycles from concurrent callers, and step 6 happens only after commit.

pub mod file;
pub mod notify;
pub mod snapshot;

pub use file::FileStore;
pub use notify::{HistorySnapshot, HistoryUpdates};
pub use snapshot::{MemoryStore, SnapshotStore, StoreError, StoreErrorCode, StoreTxn};

use chrono::{DateTime, Duration, Utc};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::PumplogConfig;
use crate::model::event::HistoryEvent;
use crate::model::raw::RawPumpEvent;
use crate::model::treatment::Treatment;
use crate::normalize::{journal_carbs, normalize};
use crate::reconcile;

/// Store key for the canonical pump-history log.
pub const HISTORY_KEY: &str = "pump-history";

/// Store key for the uploader-owned snapshot of already-uploaded treatments.
/// Read-only from this crate's perspective.
pub const UPLOADED_TREATMENTS_KEY: &str = "uploaded-treatments";

/// Rolling retention window applied on every merge cycle.
pub const RETENTION_WINDOW_HOURS: i64 = 24;

/// Source of "now" for the retention window. Injectable so window behavior
/// is exactly testable; defaults to [`Utc::now`].
pub type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Statistics from one merge cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Candidate records appended to the log.
    pub appended: usize,
    /// Candidate records discarded because their id was already present.
    pub duplicates: usize,
    /// Previously stored records evicted by the retention window.
    pub evicted: usize,
    /// Records in the log after the cycle.
    pub retained: usize,
}

/// Durable, deduplicated, time-windowed log of pump events.
pub struct EventStore<S> {
    store: S,
    /// Total order over merge cycles from concurrent callers.
    merge: Mutex<()>,
    updates: HistoryUpdates,
    window: Duration,
    clock: Clock,
}

impl<S: SnapshotStore> EventStore<S> {
    /// Create a store with the default 24 h window and wall clock.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Box::new(Utc::now))
    }

    /// Create a store with an injected clock (window tests pin "now").
    #[must_use]
    pub fn with_clock(store: S, clock: Clock) -> Self {
        Self {
            store,
            merge: Mutex::new(()),
            updates: HistoryUpdates::default(),
            window: Duration::hours(RETENTION_WINDOW_HOURS),
            clock,
        }
    }

    /// Create a store honoring a loaded configuration.
    #[must_use]
    pub fn from_config(store: S, config: &PumplogConfig) -> Self {
        let mut this = Self::new(store);
        this.window = Duration::hours(config.retention_hours);
        this
    }

    /// Register a subscriber for post-commit history snapshots.
    pub fn subscribe(&self) -> Receiver<HistorySnapshot> {
        self.updates.subscribe()
    }

    /// Normalize `raw` and run one merge cycle over the candidates.
    ///
    /// Unrecognized raw events normalize to nothing and are not an error.
    ///
    /// # Errors
    ///
    /// Propagates the snapshot store's failure unchanged; the log is left at
    /// its pre-transaction state in that case.
    pub fn append(&self, raw: &[RawPumpEvent]) -> Result<MergeStats, StoreError> {
        let candidates: Vec<HistoryEvent> = raw.iter().flat_map(normalize).collect();
        self.merge_cycle(candidates)
    }

    /// Record a manually journaled carbohydrate entry.
    ///
    /// Each call synthesizes a fresh record (new id), so repeated identical
    /// gram counts are all retained.
    ///
    /// # Errors
    ///
    /// Same contract as [`append`](Self::append).
    pub fn append_journal_carbs(&self, grams: i32) -> Result<MergeStats, StoreError> {
        let entry = journal_carbs(grams, (self.clock)());
        self.merge_cycle(vec![entry])
    }

    /// Return the persisted log, newest first.
    ///
    /// Always a fully committed snapshot: the read runs in its own store
    /// transaction and the log is only ever replaced wholesale.
    ///
    /// # Errors
    ///
    /// Propagates the snapshot store's failure unchanged.
    pub fn recent(&self) -> Result<Vec<HistoryEvent>, StoreError> {
        self.store.transaction(read_history)
    }

    /// Derive upload-candidate treatments not yet acknowledged as uploaded.
    ///
    /// Reads the history log and the uploader's snapshot in one transaction
    /// so the diff is computed over a consistent pair. An empty history
    /// short-circuits without reading the uploaded snapshot.
    ///
    /// # Errors
    ///
    /// Propagates the snapshot store's failure unchanged.
    pub fn pending_treatments(&self) -> Result<Vec<Treatment>, StoreError> {
        self.store.transaction(|txn| {
            let history = read_history(txn)?;
            if history.is_empty() {
                return Ok(Vec::new());
            }
            let uploaded: Vec<Treatment> = read_list(txn, UPLOADED_TREATMENTS_KEY)?;
            Ok(reconcile::pending_treatments(&history, &uploaded))
        })
    }

    fn merge_cycle(&self, candidates: Vec<HistoryEvent>) -> Result<MergeStats, StoreError> {
        let _serial = self.merge.lock();
        let cutoff = (self.clock)() - self.window;

        let (log, stats) = self.store.transaction(move |txn| {
            let mut log = read_history(txn)?;
            let mut stats = MergeStats::default();

            let mut ids: HashSet<String> = log.iter().map(|event| event.id.clone()).collect();
            for event in candidates {
                if ids.insert(event.id.clone()) {
                    log.push(event);
                    stats.appended += 1;
                } else {
                    stats.duplicates += 1;
                }
            }

            let before = log.len();
            log.retain(|event| event.timestamp >= cutoff);
            stats.evicted = before - log.len();

            // Stable: records sharing a timestamp keep their emission order,
            // which is what keeps a temp-basal rate adjacent to its duration.
            log.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            stats.retained = log.len();

            let bytes = serde_json::to_vec(&log).map_err(|source| StoreError::Encode {
                key: HISTORY_KEY.to_owned(),
                source,
            })?;
            txn.save(HISTORY_KEY, &bytes)?;
            Ok((log, stats))
        })?;

        tracing::debug!(
            appended = stats.appended,
            duplicates = stats.duplicates,
            evicted = stats.evicted,
            retained = stats.retained,
            "history merge committed"
        );

        // Happens-after the persist: subscribers only see committed state.
        self.updates.publish(&Arc::new(log));
        Ok(stats)
    }
}

fn read_history(txn: &mut dyn StoreTxn) -> Result<Vec<HistoryEvent>, StoreError> {
    read_list(txn, HISTORY_KEY)
}

/// Decode the list stored under `key`; an absent key reads as empty.
fn read_list<T: DeserializeOwned>(
    txn: &mut dyn StoreTxn,
    key: &str,
) -> Result<Vec<T>, StoreError> {
    match txn.retrieve(key)? {
        None => Ok(Vec::new()),
        Some(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            key: key.to_owned(),
            source,
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
