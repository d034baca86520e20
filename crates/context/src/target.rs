//! Where flush-mode changes land
//!
//! The controller never calls the engine directly; it hands every accepted
//! change to a [`FlushModeTarget`]. A single session is a target, and so is a
//! scope's whole set of touched persistence contexts.

use bridge_core::{BridgeResult, FlushModeType, PersistenceSession, SessionHandle};

/// Receiver of flush-mode changes
pub trait FlushModeTarget {
    /// Mode the controller starts from when nothing else is configured
    fn default_flush_mode(&self) -> FlushModeType;

    /// Apply `mode` synchronously
    ///
    /// # Errors
    ///
    /// Returns the engine's error unmodified. On error the target must be
    /// left in the mode it had before the call.
    fn apply_flush_mode(&mut self, mode: FlushModeType) -> BridgeResult<()>;
}

impl FlushModeTarget for SessionHandle {
    fn default_flush_mode(&self) -> FlushModeType {
        PersistenceSession::default_flush_mode(&**self)
    }

    fn apply_flush_mode(&mut self, mode: FlushModeType) -> BridgeResult<()> {
        PersistenceSession::set_flush_mode(&**self, mode)
    }
}

impl<T: FlushModeTarget + ?Sized> FlushModeTarget for Box<T> {
    fn default_flush_mode(&self) -> FlushModeType {
        (**self).default_flush_mode()
    }

    fn apply_flush_mode(&mut self, mode: FlushModeType) -> BridgeResult<()> {
        (**self).apply_flush_mode(mode)
    }
}
