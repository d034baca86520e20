//! Persistence contexts touched by one scope
//!
//! A scope may use several persistence contexts (one session each). A
//! flush-mode change applies to all of them, so `PersistenceContexts` is the
//! [`FlushModeTarget`] a scope's controller drives.
//!
//! ## Partial failure
//!
//! Sessions are switched in name order. If one rejects the mode, the sessions
//! already switched are put back to the mode each reported before the call
//! and the original error is returned, so the set never ends up split between
//! two modes because of a rejected change. A failed revert is logged and
//! otherwise ignored.

use crate::target::FlushModeTarget;
use bridge_core::{BridgeResult, FlushModeType, PersistenceSession, SessionHandle};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Name-ordered registry of the sessions a scope has used
#[derive(Clone, Default)]
pub struct PersistenceContexts {
    touched: BTreeMap<String, SessionHandle>,
    /// Reported as default while no session is touched
    fallback_mode: FlushModeType,
}

impl PersistenceContexts {
    /// Create an empty registry with `Auto` as fallback default
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with the given fallback default
    pub fn with_default_flush_mode(mode: FlushModeType) -> Self {
        Self {
            touched: BTreeMap::new(),
            fallback_mode: mode,
        }
    }

    /// Register `session` under `name`
    ///
    /// Returns the session previously registered under that name.
    pub fn touch(&mut self, name: impl Into<String>, session: SessionHandle) -> Option<SessionHandle> {
        self.touched.insert(name.into(), session)
    }

    /// Remove the session registered under `name`
    pub fn untouch(&mut self, name: &str) -> Option<SessionHandle> {
        self.touched.remove(name)
    }

    /// Whether `name` has been touched
    pub fn is_touched(&self, name: &str) -> bool {
        self.touched.contains_key(name)
    }

    /// Session registered under `name`
    pub fn get(&self, name: &str) -> Option<&SessionHandle> {
        self.touched.get(name)
    }

    /// Touched context names in order
    pub fn touched(&self) -> impl Iterator<Item = &str> {
        self.touched.keys().map(String::as_str)
    }

    /// Number of touched contexts
    pub fn len(&self) -> usize {
        self.touched.len()
    }

    /// True if no context was touched
    pub fn is_empty(&self) -> bool {
        self.touched.is_empty()
    }

    /// Drop every session handle
    pub fn clear(&mut self) {
        self.touched.clear();
    }
}

impl FlushModeTarget for PersistenceContexts {
    fn default_flush_mode(&self) -> FlushModeType {
        self.touched
            .values()
            .next()
            .map(|session| session.flush_mode())
            .unwrap_or(self.fallback_mode)
    }

    fn apply_flush_mode(&mut self, mode: FlushModeType) -> BridgeResult<()> {
        let mut switched: Vec<(&str, &SessionHandle, FlushModeType)> =
            Vec::with_capacity(self.touched.len());

        for (name, session) in &self.touched {
            let previous = session.flush_mode();
            if let Err(err) = session.set_flush_mode(mode) {
                for (reverted, session, previous) in switched.into_iter().rev() {
                    if let Err(revert_err) = session.set_flush_mode(previous) {
                        warn!(
                            context = reverted,
                            mode = %previous,
                            error = %revert_err,
                            "Failed to revert flush mode after rejected change"
                        );
                    }
                }
                warn!(context = %name, mode = %mode, error = %err, "Flush mode rejected");
                return Err(err);
            }
            switched.push((name.as_str(), session, previous));
        }
        Ok(())
    }
}

impl fmt::Debug for PersistenceContexts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.touched
                    .iter()
                    .map(|(name, session)| (name, session.flush_mode())),
            )
            .finish()
    }
}
