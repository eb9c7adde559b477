//! Change notification fan-out.
//!
//! The store owns a [`ChangeBus`]: an insertion-ordered list of subscriber
//! callbacks plus a broadcast channel carrying structured [`ChangeRecord`]s
//! for listeners that do not formally subscribe (ambient UI chrome, loggers).
//!
//! Subscribers are isolated from each other: one erring callback is logged
//! and skipped, and never prevents later subscribers from running.

use crate::document::Path;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::warn;

/// Error type subscriber callbacks may surface. Errors are logged by the bus
/// and never propagate to the mutation that triggered the notification.
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

/// A subscriber callback, invoked with the changed path and the new value at
/// that path.
pub type Subscriber = Box<dyn FnMut(&Path, &Value) -> Result<(), SubscriberError> + Send>;

/// Structured record describing one state change, broadcast on every
/// non-silent mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Path that changed; the root path means the whole document changed.
    pub path: Path,
    /// New value at `path`.
    pub value: Value,
    /// ISO-8601 timestamp of the mutation.
    pub timestamp: String,
}

/// Handle identifying one subscription. Unsubscribing removes exactly the
/// registration that produced the id; registering the same callback twice
/// yields two independent subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Fan-out list owned by the store.
pub struct ChangeBus {
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_id: u64,
    channel: broadcast::Sender<ChangeRecord>,
}

impl ChangeBus {
    /// Capacity of the broadcast channel; slow ambient listeners that lag
    /// further than this miss records rather than blocking mutations.
    const CHANNEL_CAPACITY: usize = 64;

    pub fn new() -> Self {
        let (channel, _) = broadcast::channel(Self::CHANNEL_CAPACITY);
        Self {
            subscribers: Vec::new(),
            next_id: 0,
            channel,
        }
    }

    /// Register a callback, invoked on every non-silent mutation in
    /// subscription order.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Path, &Value) -> Result<(), SubscriberError> + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Remove the registration behind `id`. Returns false when the id is
    /// unknown (already unsubscribed).
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
        self.subscribers.len() < before
    }

    /// Open a broadcast receiver for structured change records.
    pub fn records(&self) -> broadcast::Receiver<ChangeRecord> {
        self.channel.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Invoke every subscriber in order with `(path, value)` and broadcast
    /// the corresponding [`ChangeRecord`].
    pub fn notify(&mut self, path: &Path, value: &Value) {
        for (id, callback) in &mut self.subscribers {
            if let Err(error) = callback(path, value) {
                warn!(subscription = id.0, %path, %error, "subscriber failed");
            }
        }

        let record = ChangeRecord {
            path: path.clone(),
            value: value.clone(),
            timestamp: Utc::now().to_rfc3339(),
        };
        // No ambient listeners is the normal case, not an error.
        let _ = self.channel.send(record);
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}
