//! Durable storage for the state document, plus the write throttle.
//!
//! The document persists as one pretty-printed JSON blob under a fixed key.
//! Storage failure is never fatal: the in-memory document stays
//! authoritative, the failure is logged, and no automatic retry happens.

use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path as FsPath, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Host key-value persistence boundary: load/save a single JSON document
/// under a fixed key.
pub trait StorageAdapter: Send {
    /// Write the document. Callers treat failure as non-fatal.
    fn persist(&mut self, document: &Value) -> Result<(), PersistError>;

    /// Read the stored document. Absent data and unparseable data are
    /// treated identically: `None`, with the parse failure logged.
    fn load(&mut self) -> Option<Value>;
}

/// Shared handle: lets a host (or test) keep inspecting an adapter the store
/// owns.
impl<S: StorageAdapter> StorageAdapter for std::sync::Arc<std::sync::Mutex<S>> {
    fn persist(&mut self, document: &Value) -> Result<(), PersistError> {
        match self.lock() {
            Ok(mut inner) => inner.persist(document),
            Err(_) => Err(PersistError::Io(io::Error::new(
                io::ErrorKind::Other,
                "storage mutex poisoned",
            ))),
        }
    }

    fn load(&mut self) -> Option<Value> {
        self.lock().ok().and_then(|mut inner| inner.load())
    }
}

// ============================================================================
// File storage
// ============================================================================

/// One JSON blob at `<dir>/<key>.json`.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl AsRef<FsPath>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{key}.json")),
        }
    }

    /// Use an explicit file path instead of the `<dir>/<key>.json` layout.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &FsPath {
        &self.path
    }
}

impl StorageAdapter for FileStorage {
    fn persist(&mut self, document: &Value) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(document)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    fn load(&mut self) -> Option<Value> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return None,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "failed to read stored state");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(document) => Some(document),
            Err(error) => {
                warn!(path = %self.path.display(), %error, "stored state is not valid JSON; treating as absent");
                None
            }
        }
    }
}

// ============================================================================
// In-memory storage
// ============================================================================

/// In-memory adapter for tests and ephemeral sessions. Counts persist calls
/// and can be told to fail writes (quota-exceeded simulation).
#[derive(Default)]
pub struct MemoryStorage {
    stored: Option<String>,
    persist_count: usize,
    fail_writes: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful persist calls so far.
    pub fn persist_count(&self) -> usize {
        self.persist_count
    }

    /// Make subsequent writes fail, as a full or disabled storage would.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// The raw stored JSON, if any persist succeeded.
    pub fn stored_json(&self) -> Option<&str> {
        self.stored.as_deref()
    }

    /// Pre-load stored content, as if a previous session had persisted it.
    pub fn with_stored(content: impl Into<String>) -> Self {
        Self {
            stored: Some(content.into()),
            ..Self::default()
        }
    }
}

impl StorageAdapter for MemoryStorage {
    fn persist(&mut self, document: &Value) -> Result<(), PersistError> {
        if self.fail_writes {
            return Err(PersistError::Io(io::Error::new(
                io::ErrorKind::Other,
                "storage quota exceeded",
            )));
        }
        self.stored = Some(serde_json::to_string_pretty(document)?);
        self.persist_count += 1;
        Ok(())
    }

    fn load(&mut self) -> Option<Value> {
        let content = self.stored.as_ref()?;
        match serde_json::from_str(content) {
            Ok(document) => Some(document),
            Err(error) => {
                warn!(%error, "stored state is not valid JSON; treating as absent");
                None
            }
        }
    }
}

// ============================================================================
// Write throttle
// ============================================================================

/// Write-coalescing policy: every mutation pushes the persist deadline to
/// `now + quiet_period`; the persist fires once the quiet period elapses
/// with no further mutations. A force-save clears the deadline and writes
/// immediately.
///
/// Deadline checks take explicit instants so the host event loop drives the
/// timer and tests stay deterministic.
#[derive(Debug, Clone)]
pub struct PersistThrottle {
    quiet_period: Duration,
    deadline: Option<Instant>,
}

impl PersistThrottle {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            deadline: None,
        }
    }

    /// Record a mutation at `now`, resetting the quiet-period deadline.
    pub fn note_mutation(&mut self, now: Instant) {
        self.deadline = Some(now + self.quiet_period);
    }

    /// Whether a coalesced persist is due at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Whether a persist is scheduled at all.
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Drop any scheduled persist (after a force-save, or once fired).
    pub fn clear(&mut self) {
        self.deadline = None;
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }
}
