//! Offline-resilience engine.
//!
//! This crate keeps an application usable under intermittent connectivity:
//! it watches the network, runs side-effecting operations immediately when it
//! can, defers them to a durable priority queue when it cannot, and replays
//! the queue once connectivity returns.
//!
//! # Features
//!
//! - **Connectivity monitoring**: normalized, de-duplicated [`NetworkState`] snapshots
//! - **Execute or defer**: transient failures are queued, permanent ones surface
//! - **Durable queue**: priority-ordered, persisted through [`resync_store::OfflineStorage`]
//! - **Batched resync**: bounded concurrency, inter-batch delay, retry accounting
//! - **Events and metrics**: broadcast [`ResilienceEvent`]s and atomic counters
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use resync_core::{ActionRequest, Error, MockConnectivity, ResilienceManager};
//! use resync_types::{Priority, QueuedAction};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let manager = ResilienceManager::builder()
//!         .connectivity(Arc::new(MockConnectivity::new(false)))
//!         .executor(|action: QueuedAction| async move {
//!             println!("replaying {}", action.action_type);
//!             Ok::<_, Error>(true)
//!         })
//!         .build()?;
//!
//!     let request = ActionRequest::new("placeBet", json!({"amount": 10}))
//!         .priority(Priority::High)
//!         .optimistic_result(json!({"queued": true}));
//!
//!     // Offline: returns the optimistic result immediately.
//!     let result = manager
//!         .execute_action(request, || async { Ok(json!({"queued": false})) })
//!         .await?;
//!     assert_eq!(result, Some(json!({"queued": true})));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod guard;
pub mod manager;
pub mod metrics;
pub mod mock;
pub mod monitor;
#[cfg(feature = "probe")]
pub mod probe;
pub mod queue;
pub mod registry;
pub mod traits;

// Core exports
pub use config::{Config, ConfigError, ValidationError, default_config_path};
pub use error::{Error, FailureClass, Result};
pub use events::{EventDispatcher, EventReceiver, EventSender, ResilienceEvent};
pub use guard::{FlightGuard, SingleFlight};
pub use manager::{ActionRequest, ResilienceManager, ResilienceManagerBuilder};
pub use metrics::{EngineMetrics, MetricsSnapshot, OperationTimings};
pub use mock::MockConnectivity;
pub use monitor::{Listener, NetworkMonitor, Subscription};
#[cfg(feature = "probe")]
pub use probe::{DEFAULT_PROBE_TARGETS, HttpProbe, ProbeOutcome};
pub use queue::{ActionQueue, DrainReport, DrainStrategy, QUEUE_KEY, QueueStats, sort_for_drain};
pub use registry::ExecutorRegistry;
pub use traits::{ActionExecutor, ConnectivitySource};

// Re-export from resync-types
pub use resync_types::{
    ActionDraft, ConnectionType, EffectiveType, LinkQuality, NetworkState, Priority, QueuedAction,
};
