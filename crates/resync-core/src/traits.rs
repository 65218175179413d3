//! Trait abstractions for the engine's collaborators.
//!
//! [`ConnectivitySource`] abstracts the platform's online flag and link-quality
//! hints; [`ActionExecutor`] replays a queued action against the backend.
//! Both have test doubles ([`crate::MockConnectivity`], plain closures).

use std::future::Future;

use async_trait::async_trait;
use tokio::sync::broadcast;

use resync_types::{LinkQuality, QueuedAction};

use crate::error::Result;

/// Source of connectivity signals.
///
/// Only [`is_online`](Self::is_online) is required. Sources that cannot report
/// link quality or change notifications keep the defaults, and the monitor
/// degrades to the binary online flag.
pub trait ConnectivitySource: Send + Sync {
    /// Whether the device currently has connectivity.
    fn is_online(&self) -> bool;

    /// Link-quality hints, if the platform exposes any.
    fn link_quality(&self) -> Option<LinkQuality> {
        None
    }

    /// A channel that ticks whenever any signal may have changed.
    fn changes(&self) -> Option<broadcast::Receiver<()>> {
        None
    }
}

/// Replays a queued action.
///
/// Return `Ok(true)` when the action succeeded and can be removed from the
/// queue. `Ok(false)` or an error counts as a failed attempt.
///
/// Any `Fn(QueuedAction) -> impl Future<Output = Result<bool>>` closure
/// implements this trait.
///
/// # Example
///
/// ```
/// use resync_core::{ActionExecutor, Result};
/// use resync_types::QueuedAction;
///
/// async fn accept_all(_action: QueuedAction) -> Result<bool> {
///     Ok(true)
/// }
///
/// fn assert_executor<E: ActionExecutor>(_: &E) {}
/// assert_executor(&accept_all);
/// ```
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Attempt to replay `action`.
    async fn execute(&self, action: QueuedAction) -> Result<bool>;
}

#[async_trait]
impl<F, Fut> ActionExecutor for F
where
    F: Fn(QueuedAction) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool>> + Send,
{
    async fn execute(&self, action: QueuedAction) -> Result<bool> {
        (self)(action).await
    }
}
