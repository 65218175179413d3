//! Dispatch of queued actions by type.
//!
//! The queue never knows how to replay an action; the integration layer
//! assembles an [`ExecutorRegistry`] that maps each action type to a handler
//! and hands it to the façade as its executor.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use resync_types::QueuedAction;

use crate::error::{Error, Result};
use crate::traits::ActionExecutor;

/// Maps action types to their replay handlers.
///
/// # Example
///
/// ```
/// use resync_core::ExecutorRegistry;
/// use resync_types::QueuedAction;
///
/// let registry = ExecutorRegistry::new()
///     .register("placeBet", |action: QueuedAction| async move {
///         // Submit action.data to the backend here.
///         let _ = action.data;
///         Ok::<_, resync_core::Error>(true)
///     });
///
/// assert!(registry.contains("placeBet"));
/// ```
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    handlers: HashMap<String, Arc<dyn ActionExecutor>>,
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&String> = self.handlers.keys().collect();
        types.sort();
        f.debug_struct("ExecutorRegistry")
            .field("types", &types)
            .finish()
    }
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `action_type`, replacing any previous one.
    pub fn register<E>(mut self, action_type: impl Into<String>, handler: E) -> Self
    where
        E: ActionExecutor + 'static,
    {
        self.insert(action_type, handler);
        self
    }

    /// Register a handler on an existing registry.
    pub fn insert<E>(&mut self, action_type: impl Into<String>, handler: E)
    where
        E: ActionExecutor + 'static,
    {
        self.handlers.insert(action_type.into(), Arc::new(handler));
    }

    /// Whether a handler exists for `action_type`.
    pub fn contains(&self, action_type: &str) -> bool {
        self.handlers.contains_key(action_type)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[async_trait]
impl ActionExecutor for ExecutorRegistry {
    async fn execute(&self, action: QueuedAction) -> Result<bool> {
        match self.handlers.get(&action.action_type) {
            Some(handler) => handler.execute(action).await,
            None => {
                warn!("No executor registered for action type '{}'", action.action_type);
                Err(Error::UnknownActionType(action.action_type))
            }
        }
    }
}
