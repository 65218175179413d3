//! Mock connectivity source for testing.
//!
//! [`MockConnectivity`] implements [`ConnectivitySource`] with values that
//! tests flip directly. Every change is broadcast so a running
//! [`NetworkMonitor`](crate::NetworkMonitor) driver picks it up immediately.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

use resync_types::LinkQuality;

use crate::traits::ConnectivitySource;

/// A scriptable connectivity source.
///
/// # Example
///
/// ```
/// use resync_core::{ConnectivitySource, MockConnectivity};
///
/// let source = MockConnectivity::new(false);
/// assert!(!source.is_online());
///
/// source.set_online(true);
/// assert!(source.is_online());
/// ```
#[derive(Debug)]
pub struct MockConnectivity {
    online: AtomicBool,
    quality: RwLock<Option<LinkQuality>>,
    changes: broadcast::Sender<()>,
    notify: bool,
}

impl MockConnectivity {
    /// Create a source with the given online flag and no link-quality hints.
    pub fn new(online: bool) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            online: AtomicBool::new(online),
            quality: RwLock::new(None),
            changes,
            notify: true,
        }
    }

    /// Start with link-quality hints.
    pub fn with_link_quality(self, quality: LinkQuality) -> Self {
        if let Ok(mut q) = self.quality.write() {
            *q = Some(quality);
        }
        self
    }

    /// Report no change channel, forcing consumers to poll.
    pub fn without_notifications(mut self) -> Self {
        self.notify = false;
        self
    }

    /// Flip the online flag.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
        self.emit();
    }

    /// Replace the link-quality hints.
    pub fn set_link_quality(&self, quality: Option<LinkQuality>) {
        if let Ok(mut q) = self.quality.write() {
            *q = quality;
        }
        self.emit();
    }

    /// Broadcast a change tick without changing anything.
    pub fn emit(&self) {
        // No receivers is fine
        let _ = self.changes.send(());
    }
}

impl ConnectivitySource for MockConnectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn link_quality(&self) -> Option<LinkQuality> {
        self.quality.read().ok().and_then(|q| q.clone())
    }

    fn changes(&self) -> Option<broadcast::Receiver<()>> {
        self.notify.then(|| self.changes.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resync_types::ConnectionType;

    #[test]
    fn test_defaults() {
        let source = MockConnectivity::new(true);
        assert!(source.is_online());
        assert!(source.link_quality().is_none());
        assert!(source.changes().is_some());
    }

    #[test]
    fn test_link_quality_roundtrip() {
        let source = MockConnectivity::new(true).with_link_quality(LinkQuality {
            connection_type: Some(ConnectionType::Wifi),
            ..Default::default()
        });
        assert_eq!(
            source.link_quality().and_then(|q| q.connection_type),
            Some(ConnectionType::Wifi)
        );

        source.set_link_quality(None);
        assert!(source.link_quality().is_none());
    }

    #[tokio::test]
    async fn test_changes_are_broadcast() {
        let source = MockConnectivity::new(true);
        let mut rx = source.changes().unwrap();
        source.set_online(false);
        assert!(rx.recv().await.is_ok());
    }

    #[test]
    fn test_without_notifications() {
        let source = MockConnectivity::new(true).without_notifications();
        assert!(source.changes().is_none());
    }
}
