//! Persistence session contracts
//!
//! The bridge never owns the engine. It talks to it through three seams:
//!
//! - [`PersistenceSession`]: a live session / entity manager whose flush mode
//!   can be read and changed
//! - [`SessionFactory`]: opens a session for a named persistence context
//! - [`SessionListener`]: observes [`SessionCreated`] events so collaborators
//!   (filter setup, flush-mode baselines) can act before first use
//!
//! Sessions are shared through [`SessionHandle`]; their lifetime belongs to
//! whoever opened them.

use crate::error::BridgeResult;
use crate::flush::FlushModeType;
use std::fmt;
use std::sync::Arc;

/// Live session of the wrapped persistence engine
///
/// Thread safety: sessions are shared through `Arc`, so implementations use
/// interior mutability for the flush mode (requires Send + Sync).
pub trait PersistenceSession: Send + Sync {
    /// Flush mode currently applied to the session
    fn flush_mode(&self) -> FlushModeType;

    /// Apply a flush mode
    ///
    /// Must be synchronous: the next operation issued against the session
    /// observes the new mode. Never retroactive.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the mode (session closed,
    /// unsupported mode). The session's mode is unchanged in that case.
    fn set_flush_mode(&self, mode: FlushModeType) -> BridgeResult<()>;

    /// Mode the engine assigns to a freshly opened session
    fn default_flush_mode(&self) -> FlushModeType {
        FlushModeType::Auto
    }

    /// Whether the session still accepts operations
    fn is_open(&self) -> bool {
        true
    }
}

/// Shared, borrowed handle to a session
pub type SessionHandle = Arc<dyn PersistenceSession>;

/// Opens sessions for named persistence contexts
pub trait SessionFactory: Send + Sync {
    /// Open a new session for `context`
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot open the session.
    fn open_session(&self, context: &str) -> BridgeResult<SessionHandle>;
}

impl<F> SessionFactory for F
where
    F: Fn(&str) -> BridgeResult<SessionHandle> + Send + Sync,
{
    fn open_session(&self, context: &str) -> BridgeResult<SessionHandle> {
        self(context)
    }
}

/// Published when a managed persistence context opens its session
#[derive(Clone)]
pub struct SessionCreated {
    /// Name of the persistence context that opened the session
    pub context: String,
    /// The new session
    pub session: SessionHandle,
}

impl SessionCreated {
    /// Create a new event
    pub fn new(context: impl Into<String>, session: SessionHandle) -> Self {
        Self {
            context: context.into(),
            session,
        }
    }
}

impl fmt::Debug for SessionCreated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCreated")
            .field("context", &self.context)
            .field("flush_mode", &self.session.flush_mode())
            .finish()
    }
}

/// Observer of [`SessionCreated`] events
pub trait SessionListener: Send + Sync {
    /// Called once per opened session, before the caller first uses it
    fn on_session_created(&self, event: &SessionCreated);
}

impl<F> SessionListener for F
where
    F: Fn(&SessionCreated) + Send + Sync,
{
    fn on_session_created(&self, event: &SessionCreated) {
        self(event)
    }
}
