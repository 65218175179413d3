//! Active connectivity probing over HTTP.
//!
//! Outside a browser there is no ambient online flag, so [`HttpProbe`] derives
//! one: it sends `HEAD` requests to a set of targets and treats any HTTP
//! response (whatever the status) as proof of connectivity. The fastest
//! round trip becomes the reported `rtt`, and an effective connection type is
//! estimated from it.
//!
//! Enabled with the `probe` feature.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use resync_core::{ConnectivitySource, HttpProbe};
//!
//! # async fn example() -> Result<(), resync_core::Error> {
//! let probe = Arc::new(HttpProbe::new(
//!     vec!["https://example.com".to_string()],
//!     Duration::from_secs(5),
//! )?);
//!
//! let outcome = probe.probe().await;
//! println!("online={} rtt={:?}", outcome.online, outcome.rtt);
//! assert_eq!(probe.is_online(), outcome.online);
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use futures::future::join_all;
use reqwest::Client;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use resync_types::{EffectiveType, LinkQuality};

use crate::error::{Error, Result};
use crate::traits::ConnectivitySource;

/// Targets used when none are configured.
pub const DEFAULT_PROBE_TARGETS: [&str; 2] = [
    "https://www.cloudflare.com/cdn-cgi/trace",
    "https://www.google.com/generate_204",
];

/// Result of one probe round.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    /// At least one target answered.
    pub online: bool,
    /// Fastest round trip among the targets that answered.
    pub rtt: Option<Duration>,
    /// Number of targets that answered.
    pub reachable: usize,
    /// Number of targets probed.
    pub attempted: usize,
}

/// A [`ConnectivitySource`] backed by periodic HTTP probes.
///
/// Until the first probe completes the source reports offline.
#[derive(Debug)]
pub struct HttpProbe {
    client: Client,
    targets: Vec<String>,
    last: RwLock<Option<ProbeOutcome>>,
    changes: broadcast::Sender<()>,
}

impl HttpProbe {
    /// Create a probe against `targets` with a per-request timeout.
    pub fn new(targets: Vec<String>, timeout: Duration) -> Result<Self> {
        let targets: Vec<String> = targets
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        if let Some(bad) = targets
            .iter()
            .find(|t| !t.starts_with("http://") && !t.starts_with("https://"))
        {
            return Err(Error::invalid_config(format!(
                "probe target must start with http:// or https://, got '{}'",
                bad
            )));
        }

        let targets = if targets.is_empty() {
            DEFAULT_PROBE_TARGETS.iter().map(|t| t.to_string()).collect()
        } else {
            targets
        };

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::invalid_config(format!("failed to build HTTP client: {}", e)))?;

        let (changes, _) = broadcast::channel(16);
        Ok(Self {
            client,
            targets,
            last: RwLock::new(None),
            changes,
        })
    }

    /// The configured targets.
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Outcome of the most recent probe round.
    pub fn last_outcome(&self) -> Option<ProbeOutcome> {
        self.last.read().ok().and_then(|l| l.clone())
    }

    /// Probe every target concurrently and record the outcome.
    pub async fn probe(&self) -> ProbeOutcome {
        let results = join_all(self.targets.iter().map(|url| self.probe_one(url))).await;

        let latencies: Vec<Duration> = results.into_iter().flatten().collect();
        let outcome = ProbeOutcome {
            online: !latencies.is_empty(),
            rtt: latencies.iter().min().copied(),
            reachable: latencies.len(),
            attempted: self.targets.len(),
        };

        debug!(
            "Probe round: {}/{} reachable, rtt={:?}",
            outcome.reachable, outcome.attempted, outcome.rtt
        );

        if let Ok(mut last) = self.last.write() {
            *last = Some(outcome.clone());
        }
        let _ = self.changes.send(());
        outcome
    }

    async fn probe_one(&self, url: &str) -> Option<Duration> {
        let started = Instant::now();
        match self.client.head(url).send().await {
            Ok(response) => {
                debug!("Probe {} -> {}", url, response.status());
                Some(started.elapsed())
            }
            Err(e) => {
                debug!("Probe {} failed: {}", url, e);
                None
            }
        }
    }

    /// Spawn a task that probes every `interval` until `cancel` fires.
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken, interval: Duration) -> JoinHandle<()> {
        let probe = Arc::clone(self);
        tokio::spawn(async move {
            if interval.is_zero() {
                warn!("Probe interval is zero; probing once");
                probe.probe().await;
                return;
            }
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        probe.probe().await;
                    }
                }
            }
        })
    }
}

/// Effective type for a round trip, using the Network Information API bands.
fn effective_type_for(rtt: Duration) -> EffectiveType {
    match rtt.as_millis() {
        ms if ms >= 2000 => EffectiveType::Slow2g,
        ms if ms >= 1400 => EffectiveType::TwoG,
        ms if ms >= 270 => EffectiveType::ThreeG,
        _ => EffectiveType::FourG,
    }
}

impl ConnectivitySource for HttpProbe {
    fn is_online(&self) -> bool {
        self.last_outcome().is_some_and(|o| o.online)
    }

    fn link_quality(&self) -> Option<LinkQuality> {
        let rtt = self.last_outcome()?.rtt?;
        Some(LinkQuality {
            effective_type: Some(effective_type_for(rtt)),
            rtt: Some(u32::try_from(rtt.as_millis()).unwrap_or(u32::MAX)),
            ..Default::default()
        })
    }

    fn changes(&self) -> Option<broadcast::Receiver<()>> {
        Some(self.changes.subscribe())
    }
}
