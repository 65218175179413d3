//! Status command implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use owo_colors::OwoColorize;
use resync_core::{ActionQueue, HttpProbe, NetworkMonitor, NetworkState, QueueStats};
use resync_store::StorageInfo;
use serde::Serialize;

use crate::util::{Env, format_bytes, format_timestamp, print_json};

#[derive(Debug, Serialize)]
struct StatusReport {
    database: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    network: Option<NetworkState>,
    queue: QueueStats,
    storage: StorageInfo,
}

pub async fn cmd_status(env: &Env, json: bool, probe: bool) -> Result<()> {
    let storage = env.open_storage()?;
    let queue = ActionQueue::new(Arc::clone(&storage));

    let network = if probe {
        let monitor = &env.config.monitor;
        let prober = Arc::new(HttpProbe::new(
            monitor.probe_targets.clone(),
            Duration::from_secs(monitor.probe_timeout_secs),
        )?);
        prober.probe().await;
        Some(NetworkMonitor::new(prober).state())
    } else {
        None
    };

    let report = StatusReport {
        database: env.database.clone(),
        network,
        queue: queue.stats(),
        storage: storage.storage_info(),
    };

    if json {
        return print_json(&report);
    }

    println!("Database: {}", report.database.display());
    if let Some(state) = &report.network {
        println!("Network:  {}", format_network(state, env.no_color));
    }

    println!("Queue:    {} pending", report.queue.total);
    for (priority, count) in report.queue.by_priority.iter().rev() {
        if *count > 0 {
            println!("  {:<9} {}", priority.to_string(), count);
        }
    }
    if let Some(oldest) = report.queue.oldest_action {
        println!("  oldest    {}", format_timestamp(oldest)?);
    }

    let info = &report.storage;
    println!(
        "Storage:  {} items, {} of {} ({:.1}%)",
        info.total_items,
        format_bytes(info.total_size),
        format_bytes(info.max_size),
        info.utilization_percent
    );

    Ok(())
}

pub(crate) fn format_network(state: &NetworkState, no_color: bool) -> String {
    let label = if state.is_online { "online" } else { "offline" };
    let label = match (no_color, state.is_online) {
        (true, _) => label.to_string(),
        (false, true) => label.green().to_string(),
        (false, false) => label.red().to_string(),
    };

    if !state.is_online || !state.has_link_quality() {
        return label;
    }

    let speed = if state.is_slow() {
        "slow"
    } else if state.is_fast() {
        "fast"
    } else {
        "moderate"
    };
    format!(
        "{} ({}, {}, rtt {} ms)",
        label, state.effective_type, speed, state.rtt
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use resync_types::{EffectiveType, LinkQuality};

    #[test]
    fn test_format_offline() {
        assert_eq!(format_network(&NetworkState::offline(), true), "offline");
    }

    #[test]
    fn test_format_online_with_quality() {
        let quality = LinkQuality {
            effective_type: Some(EffectiveType::FourG),
            rtt: Some(40),
            ..Default::default()
        };
        let state = NetworkState::from_signals(true, Some(&quality));
        let text = format_network(&state, true);
        assert!(text.starts_with("online"));
        assert!(text.contains("rtt 40 ms"));
    }
}
