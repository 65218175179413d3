//! Connectivity monitoring.
//!
//! [`NetworkMonitor`] samples a [`ConnectivitySource`], normalizes the signals
//! into a [`NetworkState`] and notifies subscribers only when the snapshot
//! actually changes. Noisy sources that fire repeatedly with identical values
//! produce a single notification.
//!
//! Consumers can either register callbacks with [`NetworkMonitor::subscribe`]
//! or await changes through [`NetworkMonitor::watch`].
//!
//! Refreshes are serialized, so callbacks see snapshots in publish order even
//! when several tasks refresh at once. A callback must not call
//! [`NetworkMonitor::refresh`] on the monitor that invoked it.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use resync_types::NetworkState;

use crate::traits::ConnectivitySource;

/// Callback invoked with each new snapshot.
pub type Listener = Arc<dyn Fn(&NetworkState) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// De-duplicating connectivity observer.
pub struct NetworkMonitor {
    source: Arc<dyn ConnectivitySource>,
    state: watch::Sender<NetworkState>,
    listeners: Arc<Mutex<Listeners>>,
    publish: Mutex<()>,
}

impl std::fmt::Debug for NetworkMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkMonitor")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl NetworkMonitor {
    /// Create a monitor and take an initial sample from `source`.
    pub fn new(source: Arc<dyn ConnectivitySource>) -> Self {
        let initial = sample(source.as_ref());
        let (state, _) = watch::channel(initial);
        Self {
            source,
            state,
            listeners: Arc::new(Mutex::new(Listeners::default())),
            publish: Mutex::new(()),
        }
    }

    /// A fresh snapshot read from the source.
    pub fn state(&self) -> NetworkState {
        sample(self.source.as_ref())
    }

    /// The last snapshot delivered to subscribers.
    pub fn last_published(&self) -> NetworkState {
        self.state.borrow().clone()
    }

    /// Re-sample the source and notify subscribers if the snapshot changed.
    ///
    /// Returns whether a notification was sent.
    pub fn refresh(&self) -> bool {
        let _publish = self.publish.lock().unwrap_or_else(|e| e.into_inner());
        let next = sample(self.source.as_ref());
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });

        if changed {
            debug!(
                "Network state changed: online={} type={} effective={}",
                next.is_online, next.connection_type, next.effective_type
            );
            self.notify(&next);
        }
        changed
    }

    fn notify(&self, state: &NetworkState) {
        // Listeners run outside the lock so they may subscribe or unsubscribe.
        let listeners: Vec<Listener> = match self.listeners.lock() {
            Ok(guard) => guard.entries.iter().map(|(_, l)| Arc::clone(l)).collect(),
            Err(poisoned) => poisoned
                .into_inner()
                .entries
                .iter()
                .map(|(_, l)| Arc::clone(l))
                .collect(),
        };
        for listener in listeners {
            listener(state);
        }
    }

    /// Register a callback for state changes.
    ///
    /// The callback fires only when the snapshot differs from the previous
    /// notification. Dropping the returned [`Subscription`] unregisters it.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&NetworkState) + Send + Sync + 'static,
    {
        let mut guard = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        let id = guard.next_id;
        guard.next_id += 1;
        guard.entries.push((id, Arc::new(listener)));

        Subscription {
            listeners: Arc::downgrade(&self.listeners),
            id,
        }
    }

    /// Number of registered callbacks.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .map(|l| l.entries.len())
            .unwrap_or_default()
    }

    /// Receiver that observes every published snapshot.
    pub fn watch(&self) -> watch::Receiver<NetworkState> {
        self.state.subscribe()
    }

    /// Whether the current link is slow.
    pub fn is_slow_connection(&self) -> bool {
        self.state().is_slow()
    }

    /// Whether the current link is fast.
    pub fn is_fast_connection(&self) -> bool {
        self.state().is_fast()
    }

    /// Spawn a task that refreshes on source notifications and, if given, on
    /// a fixed poll interval. The task exits when `cancel` fires.
    pub fn spawn_driver(
        self: &Arc<Self>,
        cancel: CancellationToken,
        poll_interval: Option<Duration>,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        let mut changes = monitor.source.changes();
        let mut ticker = poll_interval.filter(|p| !p.is_zero()).map(|period| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        tokio::spawn(async move {
            if changes.is_none() && ticker.is_none() {
                debug!("Connectivity source has no change notifications and polling is off");
            }

            loop {
                let signal = tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Network monitor stopped");
                        break;
                    }
                    signal = next_change(&mut changes) => Some(signal),
                    _ = next_tick(&mut ticker) => None,
                };

                match signal {
                    Some(Err(broadcast::error::RecvError::Closed)) => {
                        debug!("Connectivity change channel closed");
                        changes = None;
                    }
                    // A lagged receiver still means something changed.
                    Some(_) | None => {
                        monitor.refresh();
                    }
                }
            }
        })
    }
}

fn sample(source: &dyn ConnectivitySource) -> NetworkState {
    let quality = source.link_quality();
    NetworkState::from_signals(source.is_online(), quality.as_ref())
}

async fn next_change(
    changes: &mut Option<broadcast::Receiver<()>>,
) -> Result<(), broadcast::error::RecvError> {
    match changes {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Registration handle returned by [`NetworkMonitor::subscribe`].
///
/// The listener stays registered until this handle is dropped or
/// [`unsubscribe`](Self::unsubscribe) is called.
#[must_use = "dropping a Subscription unregisters the listener"]
pub struct Subscription {
    listeners: Weak<Mutex<Listeners>>,
    id: u64,
}

impl Subscription {
    /// Unregister the listener.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            let mut guard = listeners.lock().unwrap_or_else(|e| e.into_inner());
            guard.entries.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockConnectivity;
    use resync_types::{EffectiveType, LinkQuality};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn monitor(online: bool) -> (Arc<MockConnectivity>, Arc<NetworkMonitor>) {
        let source = Arc::new(MockConnectivity::new(online));
        let monitor = Arc::new(NetworkMonitor::new(source.clone()));
        (source, monitor)
    }

    #[test]
    fn test_initial_state() {
        let (_, monitor) = monitor(true);
        let state = monitor.state();
        assert!(state.is_online);
        assert_eq!(state.effective_type, EffectiveType::Unknown);
        assert_eq!(state.downlink, 0.0);
        assert_eq!(state.rtt, 0);
    }

    #[test]
    fn test_refresh_notifies_only_on_change() {
        let (source, monitor) = monitor(true);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let _sub = monitor.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!monitor.refresh());
        source.set_online(false);
        assert!(monitor.refresh());
        assert!(!monitor.refresh());
        assert!(!monitor.refresh());
        source.set_online(true);
        assert!(monitor.refresh());

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let (source, monitor) = monitor(true);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sub = monitor.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(monitor.listener_count(), 1);

        sub.unsubscribe();
        assert_eq!(monitor.listener_count(), 0);

        source.set_online(false);
        monitor.refresh();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_slow_and_fast_classification() {
        let (source, monitor) = monitor(true);
        source.set_link_quality(Some(LinkQuality {
            effective_type: Some(EffectiveType::TwoG),
            downlink: Some(0.5),
            ..Default::default()
        }));
        assert!(monitor.is_slow_connection());
        assert!(!monitor.is_fast_connection());

        source.set_link_quality(Some(LinkQuality {
            effective_type: Some(EffectiveType::FourG),
            downlink: Some(15.0),
            rtt: Some(50),
            ..Default::default()
        }));
        assert!(monitor.is_fast_connection());
        assert!(!monitor.is_slow_connection());
    }

    #[test]
    fn test_no_link_quality_is_not_slow() {
        let (_, monitor) = monitor(true);
        assert!(!monitor.is_slow_connection());
        assert!(!monitor.is_fast_connection());
    }

    #[test]
    fn test_concurrent_refreshes_notify_in_order() {
        let (source, monitor) = monitor(true);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let _sub = monitor.subscribe(move |state| {
            log.lock().unwrap().push(state.is_online);
        });

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let (source, monitor) = (&source, &monitor);
                scope.spawn(move || {
                    for i in 0..200 {
                        source.set_online((i + worker) % 2 == 0);
                        monitor.refresh();
                    }
                });
            }
        });

        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|pair| pair[0] != pair[1]));
        assert_eq!(
            seen.last().copied(),
            Some(monitor.last_published().is_online)
        );
    }

    #[tokio::test]
    async fn test_driver_follows_source_notifications() {
        let (source, monitor) = monitor(true);
        let mut rx = monitor.watch();
        let cancel = CancellationToken::new();
        let handle = monitor.spawn_driver(cancel.clone(), None);

        source.set_online(false);
        tokio::time::timeout(Duration::from_secs(1), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(!rx.borrow().is_online);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_polls_silent_source() {
        let source = Arc::new(MockConnectivity::new(true).without_notifications());
        let monitor = Arc::new(NetworkMonitor::new(source.clone()));
        let cancel = CancellationToken::new();
        let handle = monitor.spawn_driver(cancel.clone(), Some(Duration::from_secs(5)));

        source.set_online(false);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!monitor.last_published().is_online);

        cancel.cancel();
        handle.await.unwrap();
    }
}
