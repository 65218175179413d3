//! Durable action queue.
//!
//! [`ActionQueue`] keeps deferred operations in memory and mirrors the whole
//! list into [`OfflineStorage`] under one reserved key after every change, so
//! the queue survives restarts. The key is pinned and never expires, which
//! keeps cache eviction from ever dropping pending work.
//!
//! # Draining
//!
//! [`ActionQueue::process_queue`] replays a snapshot of the queue against an
//! [`ActionExecutor`]:
//!
//! 1. The snapshot is sorted critical-first, oldest-first within a priority.
//! 2. Actions run in batches of `batch_size`; members of a batch run
//!    concurrently, batches run one after another with `batch_delay` between.
//! 3. Success removes the action. Failure bumps `retry_count`; once it reaches
//!    `max_retries` the action is dropped.
//!
//! Only one drain runs at a time; overlapping calls return `None` at once.
//! Actions enqueued during a drain wait for the next one. A drain that
//! actually starts publishes `SyncStarted` and always ends with
//! `SyncCompleted`; skipped drains publish neither.
//!
//! # Persistence
//!
//! The persisted queue assumes a single writer process. Two processes sharing
//! one database overwrite each other's queue (last write wins).
//!
//! If a write fails, the persisted copy is deleted rather than left stale, so
//! a restart never replays actions that already succeeded or were removed.
//! The in-memory queue is unaffected and the next successful write restores
//! the copy. Failed writes during a drain are counted in
//! [`DrainReport::persist_failures`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use resync_store::{OfflineStorage, StoreOptions};
use resync_types::{ActionDraft, Priority, QueuedAction};

use crate::events::{EventDispatcher, ResilienceEvent};
use crate::guard::SingleFlight;
use crate::traits::ActionExecutor;

/// Storage key holding the serialized queue.
pub const QUEUE_KEY: &str = "action_queue";

/// How a drain walks the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct DrainStrategy {
    /// Actions executed concurrently per batch.
    pub batch_size: usize,
    /// Pause between batches.
    pub batch_delay: Duration,
    /// No new batch starts once this much time has passed.
    pub max_wait_time: Duration,
    /// Sort by priority; `false` keeps enqueue order.
    pub priority_order: bool,
}

impl Default for DrainStrategy {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_delay: Duration::from_millis(100),
            max_wait_time: Duration::from_secs(30),
            priority_order: true,
        }
    }
}

impl DrainStrategy {
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn max_wait_time(mut self, max_wait: Duration) -> Self {
        self.max_wait_time = max_wait;
        self
    }

    pub fn priority_order(mut self, enabled: bool) -> Self {
        self.priority_order = enabled;
        self
    }
}

/// Summary of one drain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrainReport {
    /// Actions handed to the executor.
    pub attempted: usize,
    /// Actions that succeeded and were removed.
    pub succeeded: usize,
    /// Failed actions left in the queue for another attempt.
    pub requeued: usize,
    /// Failed actions removed after exhausting their retries.
    pub dropped: usize,
    /// Snapshot members not attempted because `max_wait_time` ran out.
    pub deferred: usize,
    /// Batches executed.
    pub batches: usize,
    /// Batches whose queue write failed.
    #[serde(default)]
    pub persist_failures: usize,
}

/// Aggregate queue telemetry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total: usize,
    pub by_priority: BTreeMap<Priority, usize>,
    pub by_type: BTreeMap<String, usize>,
    /// Enqueue time of the oldest pending action.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub oldest_action: Option<OffsetDateTime>,
}

/// Sort critical-first, oldest-first within a priority.
///
/// The sort is stable, so equal timestamps keep enqueue order.
pub fn sort_for_drain(actions: &mut [QueuedAction]) {
    actions.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.timestamp.cmp(&b.timestamp))
    });
}

/// Priority-ordered, persisted queue of deferred actions.
pub struct ActionQueue {
    storage: Arc<OfflineStorage>,
    actions: Mutex<Vec<QueuedAction>>,
    drain: SingleFlight,
    events: Option<EventDispatcher>,
}

impl std::fmt::Debug for ActionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionQueue")
            .field("len", &self.len())
            .field("draining", &self.is_draining())
            .finish()
    }
}

impl ActionQueue {
    /// Open the queue persisted in `storage`, starting empty if none is stored.
    pub fn new(storage: Arc<OfflineStorage>) -> Self {
        storage.pin(QUEUE_KEY);

        let actions = match storage.try_retrieve::<Vec<QueuedAction>>(QUEUE_KEY) {
            Ok(Some(actions)) => {
                if !actions.is_empty() {
                    info!("Loaded {} queued actions", actions.len());
                }
                actions
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to load persisted queue, starting empty: {}", e);
                Vec::new()
            }
        };

        Self {
            storage,
            actions: Mutex::new(actions),
            drain: SingleFlight::new(),
            events: None,
        }
    }

    /// Publish queue events on `events`.
    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = Some(events);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Vec<QueuedAction>> {
        self.actions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: ResilienceEvent) {
        if let Some(events) = &self.events {
            events.send(event);
        }
    }

    /// Mirror `actions` into storage. Returns whether the write succeeded.
    fn persist(&self, actions: &[QueuedAction]) -> bool {
        let options = StoreOptions::new()
            .priority(Priority::Critical)
            .never_expires();
        match self.storage.try_store(QUEUE_KEY, actions, options) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Failed to persist action queue ({} actions), discarding stale copy: {}",
                    actions.len(),
                    e
                );
                self.storage.remove(QUEUE_KEY);
                false
            }
        }
    }

    /// Add an action and return its new id.
    ///
    /// The action stays queued in memory even if persisting fails.
    pub fn enqueue(&self, draft: ActionDraft) -> String {
        let id = Uuid::new_v4().to_string();
        let action = QueuedAction::from_draft(draft, id.clone(), self.storage.clock().now());
        let event = ResilienceEvent::ActionQueued {
            id: id.clone(),
            action_type: action.action_type.clone(),
            priority: action.priority,
        };

        {
            let mut actions = self.lock();
            debug!(
                "Queued {} '{}' ({:?}), {} pending",
                action.action_type,
                id,
                action.priority,
                actions.len() + 1
            );
            actions.push(action);
            self.persist(&actions);
        }

        self.emit(event);
        id
    }

    /// Remove the action with `id`. Returns whether it was present.
    pub fn dequeue(&self, id: &str) -> bool {
        let mut actions = self.lock();
        let before = actions.len();
        actions.retain(|a| a.id != id);
        let removed = actions.len() != before;
        if removed {
            self.persist(&actions);
        }
        removed
    }

    /// Snapshot of the pending actions in enqueue order.
    pub fn queue(&self) -> Vec<QueuedAction> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether a drain is in progress.
    pub fn is_draining(&self) -> bool {
        self.drain.is_active()
    }

    /// Drop every pending action.
    pub fn clear(&self) {
        let mut actions = self.lock();
        let count = actions.len();
        actions.clear();
        self.persist(&actions);
        info!("Cleared {} queued actions", count);
    }

    /// Aggregate counts by priority and type.
    pub fn stats(&self) -> QueueStats {
        let actions = self.lock();
        let mut by_priority: BTreeMap<Priority, usize> =
            Priority::ALL.iter().map(|p| (*p, 0)).collect();
        let mut by_type = BTreeMap::new();

        for action in actions.iter() {
            *by_priority.entry(action.priority).or_default() += 1;
            *by_type.entry(action.action_type.clone()).or_default() += 1;
        }

        QueueStats {
            total: actions.len(),
            by_priority,
            by_type,
            oldest_action: actions.iter().map(|a| a.timestamp).min(),
        }
    }

    /// Replay pending actions against `executor`.
    ///
    /// Returns `None` without doing anything when the queue is empty or
    /// another drain is already running.
    pub async fn process_queue(
        &self,
        executor: &dyn ActionExecutor,
        strategy: &DrainStrategy,
    ) -> Option<DrainReport> {
        let Some(_flight) = self.drain.try_begin() else {
            debug!("Queue drain already in progress, skipping");
            return None;
        };

        let mut snapshot = {
            let actions = self.lock();
            if actions.is_empty() {
                debug!("Queue is empty, nothing to drain");
                return None;
            }
            actions.clone()
        };

        if strategy.priority_order {
            sort_for_drain(&mut snapshot);
        }

        let batch_size = strategy.batch_size.max(1);
        let started = tokio::time::Instant::now();
        let mut report = DrainReport::default();

        info!(
            "Draining {} queued actions in batches of {}",
            snapshot.len(),
            batch_size
        );
        self.emit(ResilienceEvent::SyncStarted {
            pending: snapshot.len(),
        });

        for (index, batch) in snapshot.chunks(batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(strategy.batch_delay).await;
                if started.elapsed() >= strategy.max_wait_time {
                    report.deferred = snapshot.len() - report.attempted;
                    info!(
                        "Drain time budget of {:?} spent, {} actions left for the next drain",
                        strategy.max_wait_time, report.deferred
                    );
                    break;
                }
            }

            let results = join_all(batch.iter().map(|a| executor.execute(a.clone()))).await;
            report.attempted += batch.len();
            report.batches += 1;

            let events = {
                let mut actions = self.lock();
                let events: Vec<ResilienceEvent> = batch
                    .iter()
                    .zip(results)
                    .filter_map(|(action, result)| {
                        apply_outcome(&mut actions, action, result, &mut report)
                    })
                    .collect();
                if !self.persist(&actions) {
                    report.persist_failures += 1;
                }
                events
            };

            for event in events {
                self.emit(event);
            }
        }

        info!(
            "Drain finished: {} succeeded, {} requeued, {} dropped",
            report.succeeded, report.requeued, report.dropped
        );
        self.emit(ResilienceEvent::SyncCompleted {
            report: report.clone(),
        });
        Some(report)
    }
}

/// Apply one executor result to the live queue.
fn apply_outcome(
    actions: &mut Vec<QueuedAction>,
    attempted: &QueuedAction,
    result: crate::Result<bool>,
    report: &mut DrainReport,
) -> Option<ResilienceEvent> {
    let position = actions.iter().position(|a| a.id == attempted.id);

    let error = match result {
        Ok(true) => {
            if let Some(pos) = position {
                actions.remove(pos);
            }
            report.succeeded += 1;
            debug!("Action {} '{}' succeeded", attempted.action_type, attempted.id);
            return Some(ResilienceEvent::ActionSucceeded {
                id: attempted.id.clone(),
                action_type: attempted.action_type.clone(),
            });
        }
        Ok(false) => None,
        Err(e) => Some(e.to_string()),
    };

    // Dequeued while its attempt was in flight.
    let Some(pos) = position else {
        debug!("Action '{}' left the queue during its attempt", attempted.id);
        return None;
    };

    let action = &mut actions[pos];
    action.retry_count = action.retry_count.saturating_add(1);
    let retry_count = action.retry_count;

    if action.is_exhausted() {
        warn!(
            "Dropping action {} '{}' after {} failed attempts{}",
            action.action_type,
            action.id,
            retry_count,
            error.as_deref().map(|e| format!(": {e}")).unwrap_or_default()
        );
        let dropped = actions.remove(pos);
        report.dropped += 1;
        Some(ResilienceEvent::ActionDropped {
            id: dropped.id,
            action_type: dropped.action_type,
            retry_count,
        })
    } else {
        debug!(
            "Action {} '{}' failed (attempt {}/{})",
            action.action_type, action.id, retry_count, action.max_retries
        );
        report.requeued += 1;
        Some(ResilienceEvent::ActionRequeued {
            id: action.id.clone(),
            action_type: action.action_type.clone(),
            retry_count,
            error,
        })
    }
}
