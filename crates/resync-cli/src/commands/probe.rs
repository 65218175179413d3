//! Probe command - one-shot HTTP connectivity check.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use resync_core::{HttpProbe, NetworkMonitor, NetworkState};
use serde::Serialize;

use super::status::format_network;
use crate::util::{Env, print_json};

#[derive(Debug, Serialize)]
struct ProbeReport {
    targets: Vec<String>,
    reachable: usize,
    attempted: usize,
    rtt_ms: Option<u128>,
    state: NetworkState,
}

pub async fn cmd_probe(env: &Env, urls: Vec<String>, timeout: Option<u64>, json: bool) -> Result<()> {
    let monitor = &env.config.monitor;
    let targets = if urls.is_empty() {
        monitor.probe_targets.clone()
    } else {
        urls
    };
    let timeout = Duration::from_secs(timeout.unwrap_or(monitor.probe_timeout_secs));

    let prober = Arc::new(HttpProbe::new(targets, timeout)?);
    tracing::info!("Probing {} target(s)", prober.targets().len());
    let outcome = prober.probe().await;
    let state = NetworkMonitor::new(prober.clone()).state();

    let report = ProbeReport {
        targets: prober.targets().to_vec(),
        reachable: outcome.reachable,
        attempted: outcome.attempted,
        rtt_ms: outcome.rtt.map(|d| d.as_millis()),
        state,
    };

    if json {
        return print_json(&report);
    }

    println!("{}", format_network(&report.state, env.no_color));
    println!("Reachable: {}/{}", report.reachable, report.attempted);
    for target in &report.targets {
        println!("  {}", target);
    }
    Ok(())
}
