//! Engine event system.
//!
//! The façade and the action queue publish [`ResilienceEvent`]s on a
//! broadcast channel so UI and observability layers can follow connectivity
//! changes, deferred actions and resync progress without polling.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use resync_types::{NetworkState, Priority};

use crate::queue::DrainReport;

/// Events emitted by the engine.
///
/// All events are serializable for logging, persistence, and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ResilienceEvent {
    /// The normalized network snapshot changed.
    NetworkChanged { state: NetworkState },
    /// An action was added to the queue.
    ActionQueued {
        id: String,
        action_type: String,
        priority: Priority,
    },
    /// A queued action was replayed successfully and removed.
    ActionSucceeded { id: String, action_type: String },
    /// A replay attempt failed; the action stays queued.
    ActionRequeued {
        id: String,
        action_type: String,
        retry_count: u32,
        error: Option<String>,
    },
    /// An action exhausted its retries and was dropped.
    ActionDropped {
        id: String,
        action_type: String,
        retry_count: u32,
    },
    /// A resync drain started.
    SyncStarted { pending: usize },
    /// A resync drain finished.
    SyncCompleted { report: DrainReport },
}

/// Sender for engine events.
pub type EventSender = broadcast::Sender<ResilienceEvent>;

/// Receiver for engine events.
pub type EventReceiver = broadcast::Receiver<ResilienceEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: ResilienceEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}
