//! Managed persistence contexts
//!
//! A managed context opens its session lazily, on first use within the
//! owning scope, and announces it with a [`SessionCreated`] event before the
//! caller sees it. The session stays cached for the rest of the scope unless
//! the engine reports it closed, in which case the next access opens a new
//! one.

use crate::events::SessionEvents;
use bridge_core::{BridgeResult, PersistenceSession, SessionCreated, SessionFactory, SessionHandle};
use std::sync::Arc;
use tracing::debug;

/// Outcome of [`ManagedPersistenceContext::session`]
#[derive(Clone)]
pub enum SessionAccess {
    /// The cached session was returned
    Cached(SessionHandle),
    /// A new session was opened and announced
    Opened(SessionCreated),
}

impl SessionAccess {
    /// The session, however it was obtained
    pub fn session(&self) -> &SessionHandle {
        match self {
            SessionAccess::Cached(session) => session,
            SessionAccess::Opened(event) => &event.session,
        }
    }

    /// The creation event, if a session was opened
    pub fn created(&self) -> Option<&SessionCreated> {
        match self {
            SessionAccess::Cached(_) => None,
            SessionAccess::Opened(event) => Some(event),
        }
    }

    /// Consume into the session handle
    pub fn into_session(self) -> SessionHandle {
        match self {
            SessionAccess::Cached(session) => session,
            SessionAccess::Opened(event) => event.session,
        }
    }
}

/// Lazily opened session for one named persistence context
#[derive(Clone)]
pub struct ManagedPersistenceContext {
    name: String,
    factory: Arc<dyn SessionFactory>,
    session: Option<SessionHandle>,
}

impl ManagedPersistenceContext {
    /// Create a context that will open sessions through `factory`
    pub fn new(name: impl Into<String>, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            name: name.into(),
            factory,
            session: None,
        }
    }

    /// Context name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once a session is cached and still open
    pub fn is_open(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_open())
    }

    /// The cached session, without opening one
    pub fn current(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    /// Get the session, opening it on first use
    ///
    /// A newly opened session is published to `events` before it is returned,
    /// so listeners see it before the caller enlists it anywhere.
    ///
    /// # Errors
    ///
    /// Returns the factory's error if a session has to be opened and cannot be.
    pub fn session(&mut self, events: &SessionEvents) -> BridgeResult<SessionAccess> {
        if let Some(session) = self.session.as_ref().filter(|s| s.is_open()) {
            return Ok(SessionAccess::Cached(Arc::clone(session)));
        }
        if self.session.is_some() {
            debug!(context = %self.name, "Cached session closed, reopening");
        }

        let session = self.factory.open_session(&self.name)?;
        self.session = Some(Arc::clone(&session));
        debug!(context = %self.name, mode = %session.flush_mode(), "Opened session");

        let event = SessionCreated::new(self.name.clone(), session);
        events.publish(&event);
        Ok(SessionAccess::Opened(event))
    }

    /// Forget the cached session
    pub fn release(&mut self) -> Option<SessionHandle> {
        self.session.take()
    }
}

impl std::fmt::Debug for SessionAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionAccess::Cached(session) => f
                .debug_tuple("Cached")
                .field(&session.flush_mode())
                .finish(),
            SessionAccess::Opened(event) => f.debug_tuple("Opened").field(event).finish(),
        }
    }
}

impl std::fmt::Debug for ManagedPersistenceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedPersistenceContext")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .finish()
    }
}
