//! Platform-agnostic types for the resync offline-resilience engine.
//!
//! This crate holds the data model shared by the storage layer
//! (resync-store) and the engine itself (resync-core).
//!
//! # Features
//!
//! - Normalized connectivity snapshots ([`NetworkState`]) built from optional link hints
//! - Priorities and persisted queue entries ([`QueuedAction`])
//! - A [`Clock`] seam for deterministic time in tests
//!
//! # Example
//!
//! ```
//! use resync_types::{EffectiveType, LinkQuality, NetworkState};
//!
//! let state = NetworkState::from_signals(
//!     true,
//!     Some(&LinkQuality {
//!         effective_type: Some(EffectiveType::TwoG),
//!         downlink: Some(0.5),
//!         ..Default::default()
//!     }),
//! );
//! assert!(state.is_slow());
//! ```

pub mod clock;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ParseError, ParseResult};
pub use types::{
    ActionDraft, ConnectionType, DEFAULT_MAX_RETRIES, EffectiveType, LinkQuality, NetworkState,
    Priority, QueuedAction,
};
