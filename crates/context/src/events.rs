//! Session-created event dispatch

use bridge_core::{SessionCreated, SessionListener};
use std::sync::Arc;

/// Ordered list of [`SessionListener`]s
///
/// Listeners run synchronously in subscription order, before the session is
/// handed to the caller that triggered its creation.
#[derive(Clone, Default)]
pub struct SessionEvents {
    listeners: Vec<Arc<dyn SessionListener>>,
}

impl SessionEvents {
    /// Create an empty dispatcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener
    pub fn subscribe(&mut self, listener: Arc<dyn SessionListener>) {
        self.listeners.push(listener);
    }

    /// Deliver `event` to every listener
    pub fn publish(&self, event: &SessionCreated) {
        for listener in &self.listeners {
            listener.on_session_created(event);
        }
    }

    /// Number of listeners
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// True if nobody listens
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl std::fmt::Debug for SessionEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEvents")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
