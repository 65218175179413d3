//! The resilience façade.
//!
//! [`ResilienceManager`] is the single entry point applications use. It
//! decides per call whether to run an operation now or defer it to the
//! [`ActionQueue`], replays the queue automatically when connectivity
//! returns, and exposes cache, queue and network telemetry.
//!
//! There is no global instance: build one with
//! [`ResilienceManager::builder`] and share the returned `Arc`.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Instant;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use resync_store::{
    KeyValueStore, OfflineStorage, SqliteStore, StorageInfo, StoreOptions,
};
use resync_types::{ActionDraft, Clock, NetworkState, Priority, SystemClock};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{EventDispatcher, ResilienceEvent};
use crate::guard::SingleFlight;
use crate::metrics::{EngineMetrics, MetricsSnapshot};
use crate::monitor::{NetworkMonitor, Subscription};
use crate::queue::{ActionQueue, DrainReport, DrainStrategy, QueueStats};
use crate::traits::{ActionExecutor, ConnectivitySource};

/// Description of an action passed to [`ResilienceManager::execute_action`].
///
/// `T` is the operation's result type; the optimistic result is returned in
/// its place whenever the operation is deferred.
#[derive(Debug, Clone)]
pub struct ActionRequest<T> {
    action_type: String,
    data: Value,
    priority: Priority,
    max_retries: Option<u32>,
    requires_auth: bool,
    optimistic_result: Option<T>,
}

impl<T> ActionRequest<T> {
    /// Create a request with medium priority and the configured retry budget.
    pub fn new(action_type: impl Into<String>, data: Value) -> Self {
        Self {
            action_type: action_type.into(),
            data,
            priority: Priority::default(),
            max_retries: None,
            requires_auth: false,
            optimistic_result: None,
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn requires_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }

    /// Value returned immediately when the action is deferred.
    pub fn optimistic_result(mut self, result: T) -> Self {
        self.optimistic_result = Some(result);
        self
    }

    /// The action type tag.
    pub fn action_type(&self) -> &str {
        &self.action_type
    }
}

/// Builder for [`ResilienceManager`].
pub struct ResilienceManagerBuilder {
    config: Config,
    connectivity: Option<Arc<dyn ConnectivitySource>>,
    backend: Option<Arc<dyn KeyValueStore>>,
    clock: Option<Arc<dyn Clock>>,
    executor: Option<Arc<dyn ActionExecutor>>,
    strategy: Option<DrainStrategy>,
    spawn_driver: bool,
}

impl ResilienceManagerBuilder {
    fn new() -> Self {
        Self {
            config: Config::default(),
            connectivity: None,
            backend: None,
            clock: None,
            executor: None,
            strategy: None,
            spawn_driver: true,
        }
    }

    /// Use `config` instead of the defaults.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Connectivity source to monitor (required).
    pub fn connectivity(mut self, source: Arc<dyn ConnectivitySource>) -> Self {
        self.connectivity = Some(source);
        self
    }

    /// Key-value backend. Defaults to SQLite at `config.storage.path`.
    pub fn backend(mut self, backend: Arc<dyn KeyValueStore>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Time source. Defaults to the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Executor used to replay queued actions.
    pub fn executor<E: ActionExecutor + 'static>(mut self, executor: E) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    /// Drain strategy. Defaults to the one described by `config.queue`.
    pub fn strategy(mut self, strategy: DrainStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Whether to spawn the monitor driver task (default `true`).
    ///
    /// Without the driver, state changes are only noticed through
    /// [`NetworkMonitor::refresh`].
    pub fn spawn_driver(mut self, spawn: bool) -> Self {
        self.spawn_driver = spawn;
        self
    }

    /// Build the manager.
    ///
    /// Spawning background tasks needs a Tokio runtime; outside one the
    /// manager still works but does not follow connectivity changes on its own.
    pub fn build(self) -> Result<Arc<ResilienceManager>> {
        self.config
            .validate()
            .map_err(|e| Error::invalid_config(e.to_string()))?;

        let connectivity = self
            .connectivity
            .ok_or_else(|| Error::invalid_config("a connectivity source is required"))?;

        let backend: Arc<dyn KeyValueStore> = match self.backend {
            Some(backend) => backend,
            None => Arc::new(SqliteStore::open(&self.config.storage.path)?),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let storage = Arc::new(OfflineStorage::with_clock(
            backend,
            self.config.storage.options(),
            clock,
        ));
        let events = EventDispatcher::new(self.config.monitor.event_capacity);
        let queue = Arc::new(ActionQueue::new(Arc::clone(&storage)).with_events(events.clone()));
        let monitor = Arc::new(NetworkMonitor::new(connectivity));
        let strategy = self
            .strategy
            .unwrap_or_else(|| self.config.queue.strategy());
        let initially_online = monitor.last_published().is_online;

        let manager = Arc::new(ResilienceManager {
            config: self.config,
            monitor,
            storage,
            queue,
            executor: RwLock::new(self.executor),
            strategy,
            sync: SingleFlight::new(),
            events,
            metrics: EngineMetrics::new(),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            subscription: Mutex::new(None),
        });

        let subscription = manager.watch_connectivity(initially_online);
        if let Ok(mut slot) = manager.subscription.lock() {
            *slot = Some(subscription);
        }

        match Handle::try_current() {
            Ok(_) if self.spawn_driver => {
                let driver = manager.monitor.spawn_driver(
                    manager.cancel.child_token(),
                    manager.config.monitor.poll_interval(),
                );
                manager.track(driver);
            }
            Ok(_) => debug!("Monitor driver disabled"),
            Err(_) => warn!("No tokio runtime available; connectivity changes will not be followed"),
        }

        // Resume work left over from a previous run.
        if initially_online && !manager.queue.is_empty() {
            manager.spawn_sync();
        }

        info!(
            "Resilience manager ready: online={}, {} queued actions",
            initially_online,
            manager.queue.len()
        );
        Ok(manager)
    }
}

/// Offline-aware execution, queueing and resync.
pub struct ResilienceManager {
    config: Config,
    monitor: Arc<NetworkMonitor>,
    storage: Arc<OfflineStorage>,
    queue: Arc<ActionQueue>,
    executor: RwLock<Option<Arc<dyn ActionExecutor>>>,
    strategy: DrainStrategy,
    sync: SingleFlight,
    events: EventDispatcher,
    metrics: EngineMetrics,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    subscription: Mutex<Option<Subscription>>,
}

impl std::fmt::Debug for ResilienceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceManager")
            .field("monitor", &self.monitor)
            .field("queue", &self.queue)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl ResilienceManager {
    /// Start building a manager.
    pub fn builder() -> ResilienceManagerBuilder {
        ResilienceManagerBuilder::new()
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    /// Subscribe to the monitor and trigger a sync on every offline → online edge.
    fn watch_connectivity(self: &Arc<Self>, initially_online: bool) -> Subscription {
        let weak: Weak<Self> = Arc::downgrade(self);
        let was_online = AtomicBool::new(initially_online);

        self.monitor.subscribe(move |state: &NetworkState| {
            let Some(manager) = weak.upgrade() else {
                return;
            };
            manager.events.send(ResilienceEvent::NetworkChanged {
                state: state.clone(),
            });

            let previously_online = was_online.swap(state.is_online, Ordering::AcqRel);
            if state.is_online && !previously_online {
                info!("Connectivity restored, starting resync");
                manager.spawn_sync();
            } else if !state.is_online && previously_online {
                info!("Connectivity lost, deferring actions");
            }
        })
    }

    fn spawn_sync(self: &Arc<Self>) {
        let Ok(handle) = Handle::try_current() else {
            warn!("No tokio runtime available for automatic resync");
            return;
        };
        let manager = Arc::clone(self);
        let task = handle.spawn(async move {
            manager.sync_when_online().await;
        });
        self.track(task);
    }

    /// Run `operation` now if online, otherwise queue it.
    ///
    /// - Online and the operation succeeds: its result.
    /// - Online and it fails with a network-related error: the action is
    ///   queued and the optimistic result (or `None`) returned.
    /// - Online and it fails otherwise: the error.
    /// - Offline: the action is queued without running `operation`.
    pub async fn execute_action<T, F, Fut>(
        &self,
        request: ActionRequest<T>,
        operation: F,
    ) -> Result<Option<T>>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.monitor.state().is_online {
            debug!("Offline, deferring {}", request.action_type);
            self.defer(&request);
            return Ok(request.optimistic_result);
        }

        let started = Instant::now();
        match operation().await {
            Ok(value) => {
                self.metrics.direct.record(started.elapsed(), true);
                Ok(Some(value))
            }
            Err(e) if e.is_network_related() => {
                self.metrics.direct.record(started.elapsed(), false);
                warn!("{} failed with a network error, queueing: {}", request.action_type, e);
                self.defer(&request);
                Ok(request.optimistic_result)
            }
            Err(e) => {
                self.metrics.direct.record(started.elapsed(), false);
                debug!("{} failed permanently: {}", request.action_type, e);
                Err(e)
            }
        }
    }

    fn defer<T: Serialize>(&self, request: &ActionRequest<T>) -> String {
        let optimistic = request.optimistic_result.as_ref().and_then(|r| {
            serde_json::to_value(r)
                .inspect_err(|e| warn!("Optimistic result for {} not serializable: {}", request.action_type, e))
                .ok()
        });

        let mut draft = ActionDraft::new(request.action_type.clone(), request.data.clone())
            .priority(request.priority)
            .max_retries(
                request
                    .max_retries
                    .unwrap_or(self.config.queue.default_max_retries),
            )
            .requires_auth(request.requires_auth);
        draft.optimistic_result = optimistic;

        self.metrics.record_deferred();
        self.queue.enqueue(draft)
    }

    /// Drain the queue if online and an executor is installed.
    ///
    /// Returns `None` when a sync is already running, the network is
    /// offline, no executor is set, or nothing is queued.
    pub async fn sync_when_online(&self) -> Option<DrainReport> {
        let Some(_flight) = self.sync.try_begin() else {
            debug!("Sync already in progress");
            return None;
        };

        if !self.monitor.state().is_online {
            debug!("Offline, skipping sync");
            return None;
        }

        let executor = self
            .executor
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let Some(executor) = executor else {
            debug!("No executor installed, skipping sync");
            return None;
        };

        // The queue publishes SyncStarted/SyncCompleted once a drain begins.
        let report = self
            .queue
            .process_queue(executor.as_ref(), &self.strategy)
            .await?;

        self.metrics.record_drain(&report);
        Some(report)
    }

    /// Trigger a sync immediately.
    pub async fn sync_now(&self) -> Option<DrainReport> {
        self.sync_when_online().await
    }

    /// Install or replace the replay executor.
    pub fn set_executor<E: ActionExecutor + 'static>(&self, executor: E) {
        let mut slot = self.executor.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Arc::new(executor));
    }

    /// Whether a sync is running.
    pub fn is_syncing(&self) -> bool {
        self.sync.is_active()
    }

    /// Cache `data` under `key`.
    pub fn cache_data<D: Serialize + ?Sized>(&self, key: &str, data: &D, options: StoreOptions) -> bool {
        self.storage.store(key, data, options)
    }

    /// Read `key` from the cache.
    pub fn get_cached_data<D: DeserializeOwned>(&self, key: &str) -> Option<D> {
        self.storage.retrieve(key)
    }

    /// Current network snapshot.
    pub fn network_state(&self) -> NetworkState {
        self.monitor.state()
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    pub fn storage_info(&self) -> StorageInfo {
        self.storage.storage_info()
    }

    /// Get the event dispatcher for subscribing to events.
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Snapshot of the engine counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn monitor(&self) -> &Arc<NetworkMonitor> {
        &self.monitor
    }

    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    pub fn storage(&self) -> &OfflineStorage {
        &self.storage
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stop background tasks and wait for them to finish.
    ///
    /// Queued actions stay persisted; an in-flight drain is allowed to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Ok(mut slot) = self.subscription.lock() {
            slot.take();
        }

        let tasks: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            tasks.drain(..).collect()
        };
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Background task ended abnormally: {}", e);
            }
        }
        info!("Resilience manager shut down");
    }
}

impl Drop for ResilienceManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
