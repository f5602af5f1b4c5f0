//! Keyed snapshot persistence boundary.
//!
//! The event store does not own a file format; it runs every merge cycle
//! inside one [`SnapshotStore::transaction`] scope, which grants exclusive
//! read-modify-write access to the store's keys for the duration of the
//! body. An interrupted body must leave the store at its pre-transaction
//! state — that guarantee belongs to the implementation, not the caller.
//!
//! Two implementations ship here: [`MemoryStore`] (ephemeral, the test
//! double) and [`FileStore`](super::file::FileStore) (one JSON file per key
//! under an advisory-locked directory).

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Machine-readable codes for [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// Underlying I/O failure.
    Io,
    /// Transaction lock could not be acquired in time.
    LockTimeout,
    /// A persisted snapshot failed to decode.
    Corrupt,
    /// A snapshot failed to encode.
    Encode,
}

/// Errors crossing the snapshot-store boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error reading or writing a key.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The exclusive transaction lock was not acquired within the timeout.
    #[error("store lock timed out after {waited:?} at {}", path.display())]
    LockTimeout {
        /// Lock file that stayed contended.
        path: PathBuf,
        /// How long acquisition was attempted.
        waited: Duration,
    },

    /// A persisted snapshot failed to decode.
    #[error("malformed snapshot under key {key:?}: {source}")]
    Corrupt {
        /// The key whose value is malformed.
        key: String,
        /// Decode failure.
        source: serde_json::Error,
    },

    /// A snapshot failed to encode before persisting.
    #[error("failed to encode snapshot for key {key:?}: {source}")]
    Encode {
        /// The key being written.
        key: String,
        /// Encode failure.
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Return the machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> StoreErrorCode {
        match self {
            Self::Io(_) => StoreErrorCode::Io,
            Self::LockTimeout { .. } => StoreErrorCode::LockTimeout,
            Self::Corrupt { .. } => StoreErrorCode::Corrupt,
            Self::Encode { .. } => StoreErrorCode::Encode,
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Read-modify-write handle valid for one transaction scope.
pub trait StoreTxn {
    /// Load the bytes stored under `key`, or `None` if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the read fails for any reason other
    /// than the key being absent.
    fn retrieve(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace the value stored under `key` wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the write fails.
    fn save(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError>;
}

/// Keyed persistent store with an exclusive transactional scope.
pub trait SnapshotStore {
    /// Run `body` with exclusive read-modify-write access to every key.
    ///
    /// No other transaction observes a state between this body's reads and
    /// its writes. Errors from the body propagate unchanged.
    ///
    /// # Errors
    ///
    /// Returns the body's error, or the implementation's own failure to
    /// establish the exclusive scope.
    fn transaction<T, F>(&self, body: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn StoreTxn) -> Result<T, StoreError>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Ephemeral in-memory snapshot store.
///
/// Transaction scope is the mutex guard, so exclusivity holds across
/// threads sharing the store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    keys: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemoryTxn<'a> {
    keys: &'a mut HashMap<String, Vec<u8>>,
}

impl StoreTxn for MemoryTxn<'_> {
    fn retrieve(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.keys.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.keys.insert(key.to_owned(), value.to_vec());
        Ok(())
    }
}

impl SnapshotStore for MemoryStore {
    fn transaction<T, F>(&self, body: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn StoreTxn) -> Result<T, StoreError>,
    {
        let mut keys = self.keys.lock();
        let mut txn = MemoryTxn { keys: &mut keys };
        body(&mut txn)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
