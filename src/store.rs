//! The state container: single owner of the campaign document.
//!
//! All reads and writes pass through [`StateStore`]. Reads hand out deep
//! copies, so no caller can alias the internal document; writes go through
//! the path utility, stamp `ui.lastSaved`, schedule a throttled persist, and
//! fan out change notifications.
//!
//! The store is an explicitly constructed instance owned by the
//! application's composition root, not ambient global state. Every operation
//! is synchronous and runs to completion; the only deferred effect is the
//! durable write behind the persist throttle.

use crate::document::{self, Path};
use crate::model::{generate_id, sample_campaign, AppState};
use crate::notify::{ChangeBus, ChangeRecord, SubscriberError, SubscriptionId};
use crate::persist::{PersistThrottle, StorageAdapter};
use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Errors from store operations. Expected failure modes (bad import JSON,
/// wrong shape at a path) are returned, never panicked; the document is left
/// unchanged.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid JSON: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("no array at `{0}`")]
    NotAnArray(Path),

    #[error("items in `{0}` must be JSON objects")]
    ItemNotObject(Path),

    #[error("no entity with id `{0}`")]
    UnknownId(String),

    #[error("cannot start combat with an empty roster")]
    EmptyRoster,
}

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Quiet period for the persist throttle: a coalesced write fires only
    /// after this long with no further mutations.
    pub quiet_period: Duration,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self {
            quiet_period: Duration::from_secs(2),
        }
    }

    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Single owner of the state document.
pub struct StateStore {
    document: Value,
    bus: ChangeBus,
    storage: Box<dyn StorageAdapter>,
    throttle: PersistThrottle,
}

impl StateStore {
    /// Create a store over the given storage, starting from the default
    /// skeleton. Call [`initialize`](Self::initialize) to load persisted
    /// state or seed sample data.
    pub fn new(storage: impl StorageAdapter + 'static) -> Self {
        Self::with_config(storage, StoreConfig::default())
    }

    pub fn with_config(storage: impl StorageAdapter + 'static, config: StoreConfig) -> Self {
        Self {
            document: AppState::default().to_document(),
            bus: ChangeBus::new(),
            storage: Box::new(storage),
            throttle: PersistThrottle::new(config.quiet_period),
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Deep copy of the whole document.
    pub fn state(&self) -> Value {
        self.document.clone()
    }

    /// Deep copy of the value at `path`, or `None` if nothing is there.
    pub fn state_at(&self, path: &Path) -> Option<Value> {
        document::get(&self.document, path).cloned()
    }

    /// Typed read of the value at `path`. `None` covers both a missing value
    /// and a shape mismatch.
    pub fn state_as<T: DeserializeOwned>(&self, path: &Path) -> Option<T> {
        let value = self.state_at(path)?;
        serde_json::from_value(value).ok()
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Write `value` at `path`, notify subscribers, schedule a persist.
    pub fn set_value(&mut self, path: &Path, value: Value) {
        self.write(path, value, false);
    }

    /// Like [`set_value`](Self::set_value) but skips subscriber
    /// notification. The document still changes and persistence is still
    /// scheduled.
    pub fn set_value_silent(&mut self, path: &Path, value: Value) {
        self.write(path, value, true);
    }

    fn write(&mut self, path: &Path, value: Value, silent: bool) {
        let next = document::set(&self.document, path, value.clone());
        self.install(next);
        if !silent {
            self.bus.notify(path, &value);
        }
    }

    /// Apply several path writes against one working copy, install it once,
    /// then notify once per path in the given order.
    pub fn batch_update(&mut self, updates: Vec<(Path, Value)>) {
        self.apply_batch(updates, false);
    }

    pub fn batch_update_silent(&mut self, updates: Vec<(Path, Value)>) {
        self.apply_batch(updates, true);
    }

    fn apply_batch(&mut self, updates: Vec<(Path, Value)>, silent: bool) {
        if updates.is_empty() {
            return;
        }
        let mut working = self.document.clone();
        for (path, value) in &updates {
            working = document::set(&working, path, value.clone());
        }
        self.install(working);
        if !silent {
            for (path, value) in &updates {
                self.bus.notify(path, value);
            }
        }
    }

    /// Install a new document: stamp `ui.lastSaved` and reset the persist
    /// throttle. Notification is the caller's concern.
    fn install(&mut self, next: Value) {
        let stamped = document::set(
            &next,
            &Path::parse("ui.lastSaved"),
            Value::String(Utc::now().to_rfc3339()),
        );
        self.document = stamped;
        self.throttle.note_mutation(Instant::now());
    }

    // ------------------------------------------------------------------
    // Collection items
    // ------------------------------------------------------------------

    /// Append an item to the array at `array_path` (created empty if
    /// absent). Assigns an id when the item lacks one. Returns the item's
    /// id.
    pub fn add_item(&mut self, array_path: &Path, item: Value) -> Result<String, StoreError> {
        let Value::Object(mut item) = item else {
            return Err(StoreError::ItemNotObject(array_path.clone()));
        };

        let id = match item.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let id = generate_id();
                item.insert("id".to_string(), Value::String(id.clone()));
                id
            }
        };

        let mut items = match self.state_at(array_path) {
            None => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(StoreError::NotAnArray(array_path.clone())),
        };
        items.push(Value::Object(item));
        self.set_value(array_path, Value::Array(items));
        Ok(id)
    }

    /// Shallow-merge `updates` into the first item whose id matches.
    /// Returns false, without mutating, when no item matches (or the path
    /// holds no array of objects).
    ///
    /// Shallow merge: a nested field present in `updates` replaces the
    /// stored nested value wholesale.
    pub fn update_item(&mut self, array_path: &Path, id: &str, updates: Value) -> bool {
        let Value::Object(updates) = updates else {
            return false;
        };
        let Some(Value::Array(mut items)) = self.state_at(array_path) else {
            return false;
        };
        let Some(slot) = items
            .iter_mut()
            .find(|item| item.get("id").and_then(Value::as_str) == Some(id))
        else {
            return false;
        };
        let Value::Object(fields) = slot else {
            return false;
        };
        for (key, value) in updates {
            fields.insert(key, value);
        }
        self.set_value(array_path, Value::Array(items));
        true
    }

    /// Remove the item with the given id. Returns false when nothing was
    /// removed.
    pub fn remove_item(&mut self, array_path: &Path, id: &str) -> bool {
        let Some(Value::Array(items)) = self.state_at(array_path) else {
            return false;
        };
        let before = items.len();
        let kept: Vec<Value> = items
            .into_iter()
            .filter(|item| item.get("id").and_then(Value::as_str) != Some(id))
            .collect();
        if kept.len() == before {
            return false;
        }
        self.set_value(array_path, Value::Array(kept));
        true
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Force an immediate persist, cancelling any pending throttled write.
    pub fn save(&mut self) {
        self.throttle.clear();
        self.persist_now();
    }

    /// Host-driven throttle tick: persist if the quiet period has elapsed
    /// since the last mutation. Returns whether a persist fired.
    pub fn persist_due(&mut self, now: Instant) -> bool {
        if !self.throttle.is_due(now) {
            return false;
        }
        self.throttle.clear();
        self.persist_now();
        true
    }

    /// Whether a throttled persist is scheduled.
    pub fn persist_pending(&self) -> bool {
        self.throttle.is_pending()
    }

    fn persist_now(&mut self) {
        match self.storage.persist(&self.document) {
            Ok(()) => debug!("campaign state persisted"),
            Err(error) => {
                // The in-memory document stays authoritative; the durable
                // copy is stale until the next successful write.
                warn!(%error, "persist failed");
            }
        }
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// Register a callback invoked with `(path, value)` on every non-silent
    /// mutation.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Path, &Value) -> Result<(), SubscriberError> + Send + 'static,
    {
        self.bus.subscribe(callback)
    }

    /// Remove the subscription behind `id`.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Broadcast receiver of structured change records, for listeners that
    /// do not formally subscribe.
    pub fn changes(&self) -> broadcast::Receiver<ChangeRecord> {
        self.bus.records()
    }

    // ------------------------------------------------------------------
    // Export / import / lifecycle
    // ------------------------------------------------------------------

    /// Full document as pretty-printed JSON.
    pub fn export_json(&self) -> String {
        serde_json::to_string_pretty(&self.document).unwrap_or_else(|_| "{}".to_string())
    }

    /// Download name for an export made on `date`.
    pub fn export_filename(date: NaiveDate) -> String {
        format!("campaign-{}.json", date.format("%Y-%m-%d"))
    }

    /// Parse `json` and deep-merge it over the current document. Parse
    /// failure leaves the state untouched. On success the merged document is
    /// persisted immediately and subscribers receive a whole-document
    /// notification.
    pub fn import_json(&mut self, json: &str) -> Result<(), StoreError> {
        let incoming: Value = serde_json::from_str(json).map_err(|error| {
            warn!(%error, "import rejected: not valid JSON");
            StoreError::Parse(error)
        })?;

        let mut merged = self.document.clone();
        document::deep_merge(&mut merged, incoming);
        self.install(merged);
        self.save();
        self.notify_whole_document();
        Ok(())
    }

    /// Replace the document with the default skeleton, persist immediately,
    /// and notify with the whole document.
    pub fn reset(&mut self) {
        self.install(AppState::default().to_document());
        self.save();
        self.notify_whole_document();
    }

    /// Load previously persisted state, deep-merged over the default
    /// skeleton so documents from older or newer versions still produce a
    /// complete state. With nothing (or nothing parseable) stored, install
    /// the sample campaign and persist it. Always ends with a
    /// whole-document notification.
    pub fn initialize(&mut self) {
        match self.storage.load() {
            Some(stored) => {
                let mut merged = AppState::default().to_document();
                document::deep_merge(&mut merged, stored);
                self.document = merged;
                info!("loaded persisted campaign state");
            }
            None => {
                self.document = sample_campaign().to_document();
                info!("no persisted campaign state; seeding sample data");
                self.persist_now();
            }
        }
        self.notify_whole_document();
    }

    fn notify_whole_document(&mut self) {
        let snapshot = self.document.clone();
        self.bus.notify(&Path::root(), &snapshot);
    }
}
