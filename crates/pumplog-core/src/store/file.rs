//! File-backed snapshot store.
//!
//! One JSON file per key under a data directory. A transaction holds an
//! exclusive advisory lock on `store.lock` for its whole scope, so
//! concurrent processes serialize their read-modify-write cycles. Each save
//! writes to a temp file and renames over the target, so readers never
//! observe a half-written snapshot and an interrupted transaction leaves
//! the previous value intact.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write as IoWrite};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use super::snapshot::{SnapshotStore, StoreError, StoreTxn};

/// Advisory lock file name inside the store directory.
const LOCK_FILE: &str = "store.lock";

/// Default transaction lock acquisition timeout.
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Retry interval while the lock is contended.
const LOCK_RETRY: Duration = Duration::from_millis(10);

/// File-backed [`SnapshotStore`].
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    lock_timeout: Duration,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }

    /// Override the transaction lock timeout.
    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Root directory of this store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }
}

impl SnapshotStore for FileStore {
    fn transaction<T, F>(&self, body: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn StoreTxn) -> Result<T, StoreError>,
    {
        let _guard = LockGuard::acquire(&self.lock_path(), self.lock_timeout)?;
        let mut txn = FileTxn { dir: &self.dir };
        body(&mut txn)
    }
}

// ---------------------------------------------------------------------------
// Transaction handle
// ---------------------------------------------------------------------------

struct FileTxn<'a> {
    dir: &'a Path,
}

impl FileTxn<'_> {
    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StoreTxn for FileTxn<'_> {
    fn retrieve(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.key_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.key_path(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        {
            let mut file = File::create(&tmp)?;
            file.write_all(value)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Advisory lock
// ---------------------------------------------------------------------------

/// RAII guard for the store-wide exclusive transaction lock.
struct LockGuard {
    file: File,
}

impl LockGuard {
    fn acquire(path: &Path, timeout: Duration) -> Result<Self, StoreError> {
        let start = Instant::now();
        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(path)?;

            if file.try_lock_exclusive().is_ok() {
                return Ok(Self { file });
            }

            if start.elapsed() >= timeout {
                return Err(StoreError::LockTimeout {
                    path: path.to_path_buf(),
                    waited: start.elapsed(),
                });
            }

            thread::sleep(LOCK_RETRY);
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
