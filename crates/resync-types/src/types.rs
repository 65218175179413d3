//! Core types for connectivity snapshots and deferred actions.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::ParseError;

/// Downlink below this (Mbps) counts as a slow link.
pub const SLOW_DOWNLINK_MBPS: f64 = 1.5;
/// Round-trip time above this (ms) counts as a slow link.
pub const SLOW_RTT_MS: u32 = 300;
/// Downlink above this (Mbps) is required for a fast link.
pub const FAST_DOWNLINK_MBPS: f64 = 10.0;
/// Round-trip time below this (ms) is required for a fast link.
pub const FAST_RTT_MS: u32 = 100;

/// Default retry budget for a queued action.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Physical link type reported by the connectivity source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Wifi,
    Cellular,
    Ethernet,
    #[default]
    Unknown,
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Wifi => "wifi",
            Self::Cellular => "cellular",
            Self::Ethernet => "ethernet",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl FromStr for ConnectionType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wifi" => Ok(Self::Wifi),
            "cellular" => Ok(Self::Cellular),
            "ethernet" => Ok(Self::Ethernet),
            "unknown" | "" => Ok(Self::Unknown),
            other => Err(ParseError::UnknownVariant {
                kind: "connection type",
                value: other.to_string(),
            }),
        }
    }
}

/// Effective link class, as reported by network-information style APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EffectiveType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl EffectiveType {
    /// Whether this class alone marks the link as slow.
    pub fn is_slow(self) -> bool {
        matches!(self, Self::Slow2g | Self::TwoG)
    }
}

impl fmt::Display for EffectiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Slow2g => "slow-2g",
            Self::TwoG => "2g",
            Self::ThreeG => "3g",
            Self::FourG => "4g",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl FromStr for EffectiveType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slow-2g" => Ok(Self::Slow2g),
            "2g" => Ok(Self::TwoG),
            "3g" => Ok(Self::ThreeG),
            "4g" => Ok(Self::FourG),
            "unknown" | "" => Ok(Self::Unknown),
            other => Err(ParseError::UnknownVariant {
                kind: "effective type",
                value: other.to_string(),
            }),
        }
    }
}

/// Optional link-quality hints. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkQuality {
    pub connection_type: Option<ConnectionType>,
    pub effective_type: Option<EffectiveType>,
    /// Estimated downlink in Mbps.
    pub downlink: Option<f64>,
    /// Estimated round-trip time in milliseconds.
    pub rtt: Option<u32>,
    pub save_data: Option<bool>,
}

impl LinkQuality {
    /// Returns true if no hint is present.
    pub fn is_empty(&self) -> bool {
        self.connection_type.is_none()
            && self.effective_type.is_none()
            && self.downlink.is_none()
            && self.rtt.is_none()
            && self.save_data.is_none()
    }
}

/// Normalized connectivity snapshot.
///
/// Produced wholesale from the online flag and optional [`LinkQuality`] hints;
/// never patched field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkState {
    pub is_online: bool,
    pub connection_type: ConnectionType,
    pub effective_type: EffectiveType,
    /// Downlink in Mbps (0 when unknown).
    pub downlink: f64,
    /// Round-trip time in milliseconds (0 when unknown).
    pub rtt: u32,
    pub save_data: bool,
}

impl NetworkState {
    /// Build a snapshot from raw signals, filling gaps with unknown/zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use resync_types::{EffectiveType, LinkQuality, NetworkState};
    ///
    /// let state = NetworkState::from_signals(true, None);
    /// assert!(state.is_online);
    /// assert_eq!(state.effective_type, EffectiveType::Unknown);
    /// assert_eq!(state.downlink, 0.0);
    /// ```
    pub fn from_signals(is_online: bool, quality: Option<&LinkQuality>) -> Self {
        let q = quality.cloned().unwrap_or_default();
        Self {
            is_online,
            connection_type: q.connection_type.unwrap_or_default(),
            effective_type: q.effective_type.unwrap_or_default(),
            downlink: q.downlink.filter(|d| d.is_finite() && *d >= 0.0).unwrap_or(0.0),
            rtt: q.rtt.unwrap_or(0),
            save_data: q.save_data.unwrap_or(false),
        }
    }

    /// Offline snapshot with no link information.
    pub fn offline() -> Self {
        Self::from_signals(false, None)
    }

    /// True when at least one link-quality field carries information.
    pub fn has_link_quality(&self) -> bool {
        self.effective_type != EffectiveType::Unknown || self.downlink > 0.0 || self.rtt > 0
    }

    /// Slow link: 2g-class effective type, low downlink, or high latency.
    ///
    /// A zero downlink means "not reported" and does not count as low. Without
    /// any link-quality information this is `false`: only the online flag is
    /// authoritative then.
    pub fn is_slow(&self) -> bool {
        let low_downlink = self.downlink > 0.0 && self.downlink < SLOW_DOWNLINK_MBPS;
        self.effective_type.is_slow() || low_downlink || self.rtt > SLOW_RTT_MS
    }

    /// Fast link: 4g with high downlink and low latency.
    pub fn is_fast(&self) -> bool {
        self.effective_type == EffectiveType::FourG
            && self.downlink > FAST_DOWNLINK_MBPS
            && self.rtt < FAST_RTT_MS
    }
}

impl Default for NetworkState {
    fn default() -> Self {
        Self::offline()
    }
}

/// Importance of a queued action or cached item.
///
/// Ordering is `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    /// All priorities from lowest to highest.
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

impl FromStr for Priority {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(ParseError::UnknownVariant {
                kind: "priority",
                value: other.to_string(),
            }),
        }
    }
}

/// A side-effecting operation deferred until connectivity allows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
    pub id: String,
    /// Tag identifying which handler replays this action.
    #[serde(rename = "type")]
    pub action_type: String,
    pub data: Value,
    /// Enqueue time.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub retry_count: u32,
    pub max_retries: u32,
    pub priority: Priority,
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimistic_result: Option<Value>,
}

impl QueuedAction {
    /// Materialize a draft with identity, enqueue time and a zero retry count.
    pub fn from_draft(draft: ActionDraft, id: impl Into<String>, timestamp: OffsetDateTime) -> Self {
        Self {
            id: id.into(),
            action_type: draft.action_type,
            data: draft.data,
            timestamp,
            retry_count: 0,
            max_retries: draft.max_retries,
            priority: draft.priority,
            requires_auth: draft.requires_auth,
            optimistic_result: draft.optimistic_result,
        }
    }

    /// Whether the retry budget is used up.
    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}

/// An action before it is enqueued (no id, timestamp or retry count yet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDraft {
    #[serde(rename = "type")]
    pub action_type: String,
    pub data: Value,
    pub max_retries: u32,
    pub priority: Priority,
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default)]
    pub optimistic_result: Option<Value>,
}

impl ActionDraft {
    /// Create a draft with default priority and retry budget.
    pub fn new(action_type: impl Into<String>, data: Value) -> Self {
        Self {
            action_type: action_type.into(),
            data,
            max_retries: DEFAULT_MAX_RETRIES,
            priority: Priority::default(),
            requires_auth: false,
            optimistic_result: None,
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn requires_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }

    pub fn optimistic_result(mut self, result: Value) -> Self {
        self.optimistic_result = Some(result);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slow_connection_from_2g() {
        let state = NetworkState::from_signals(
            true,
            Some(&LinkQuality {
                effective_type: Some(EffectiveType::TwoG),
                downlink: Some(0.5),
                ..Default::default()
            }),
        );
        assert!(state.is_slow());
        assert!(!state.is_fast());
    }

    #[test]
    fn test_fast_connection() {
        let state = NetworkState::from_signals(
            true,
            Some(&LinkQuality {
                effective_type: Some(EffectiveType::FourG),
                downlink: Some(15.0),
                rtt: Some(50),
                ..Default::default()
            }),
        );
        assert!(state.is_fast());
        assert!(!state.is_slow());
    }

    #[test]
    fn test_high_rtt_is_slow_even_on_4g() {
        let state = NetworkState::from_signals(
            true,
            Some(&LinkQuality {
                effective_type: Some(EffectiveType::FourG),
                downlink: Some(20.0),
                rtt: Some(450),
                ..Default::default()
            }),
        );
        assert!(state.is_slow());
        assert!(!state.is_fast());
    }

    #[test]
    fn test_no_hints_is_neither_slow_nor_fast() {
        let state = NetworkState::from_signals(true, None);
        assert!(!state.has_link_quality());
        assert!(!state.is_slow());
        assert!(!state.is_fast());
        assert_eq!(state.connection_type, ConnectionType::Unknown);
    }

    #[test]
    fn test_negative_downlink_is_ignored() {
        let state = NetworkState::from_signals(
            true,
            Some(&LinkQuality {
                downlink: Some(-3.0),
                ..Default::default()
            }),
        );
        assert_eq!(state.downlink, 0.0);
    }

    #[test]
    fn test_unreported_downlink_is_not_slow() {
        let state = NetworkState::from_signals(
            true,
            Some(&LinkQuality {
                rtt: Some(80),
                ..Default::default()
            }),
        );
        assert!(state.has_link_quality());
        assert!(!state.is_slow());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_effective_type_serde_names() {
        let json = serde_json::to_string(&EffectiveType::Slow2g).unwrap();
        assert_eq!(json, "\"slow-2g\"");
        let parsed: EffectiveType = serde_json::from_str("\"4g\"").unwrap();
        assert_eq!(parsed, EffectiveType::FourG);
    }

    #[test]
    fn test_queued_action_uses_type_key() {
        let draft = ActionDraft::new("placeBet", json!({"amount": 5}))
            .priority(Priority::High)
            .optimistic_result(json!({"queued": true}));
        let action = QueuedAction::from_draft(draft, "a-1", OffsetDateTime::UNIX_EPOCH);

        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["type"], "placeBet");
        assert_eq!(value["priority"], "high");
        assert_eq!(value["retry_count"], 0);

        let back: QueuedAction = serde_json::from_value(value).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn test_exhaustion() {
        let mut action = QueuedAction::from_draft(
            ActionDraft::new("x", Value::Null).max_retries(2),
            "id",
            OffsetDateTime::UNIX_EPOCH,
        );
        assert!(!action.is_exhausted());
        action.retry_count = 2;
        assert!(action.is_exhausted());
    }
}
