//! Error types for the persistence bridge
//!
//! This module defines the error hierarchy shared by every bridge crate.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Errors raised by the persistence engine (a session refusing a flush mode,
//! a native transaction failing) are carried through unmodified in meaning:
//! the bridge never retries and never swallows them.

use crate::flush::FlushModeType;
use crate::transaction::TransactionStatus;
use thiserror::Error;

/// Result type alias for bridge operations
pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

/// Error types for the persistence bridge
///
/// # Categories
///
/// | Category | Variants |
/// |----------|----------|
/// | Propagation | `SessionClosed`, `UnsupportedFlushMode`, `Propagation` |
/// | Lookup | `UnknownPersistenceContext`, `UnknownTransaction` |
/// | Transaction | `TransactionState`, `RollbackOnly`, `Resource` |
/// | System | `Config` |
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The session behind a persistence context is already closed
    #[error("session for persistence context '{context}' is closed")]
    SessionClosed {
        /// Persistence context name
        context: String,
    },

    /// The persistence engine does not support the requested flush mode
    #[error("flush mode {mode} is not supported by the persistence engine")]
    UnsupportedFlushMode {
        /// The rejected mode
        mode: FlushModeType,
    },

    /// Any other engine-side rejection of a flush-mode change
    #[error("flush mode propagation failed: {message}")]
    Propagation {
        /// Engine-provided detail
        message: String,
    },

    /// The scope has no persistence context registered under this name
    #[error("unknown persistence context: {name}")]
    UnknownPersistenceContext {
        /// Requested context name
        name: String,
    },

    /// The transaction registry has no transaction under this name
    #[error("unknown transaction: {name}")]
    UnknownTransaction {
        /// Requested transaction name
        name: String,
    },

    /// A transaction operation was issued in the wrong state
    #[error("illegal transaction state: expected {expected}, found {actual:?}")]
    TransactionState {
        /// What the operation required
        expected: String,
        /// The status the transaction was in
        actual: TransactionStatus,
    },

    /// Commit was requested on a transaction marked rollback-only.
    /// The transaction has been rolled back.
    #[error("transaction was marked rollback-only and has been rolled back")]
    RollbackOnly,

    /// Failure inside the native (resource-local) transaction
    #[error("resource transaction failed: {message}")]
    Resource {
        /// Engine-provided detail
        message: String,
    },

    /// Configuration could not be read, parsed or validated
    #[error("configuration error: {message}")]
    Config {
        /// Detail
        message: String,
    },
}

impl BridgeError {
    /// Create a `SessionClosed` error
    pub fn session_closed(context: impl Into<String>) -> Self {
        BridgeError::SessionClosed {
            context: context.into(),
        }
    }

    /// Create a `Propagation` error
    pub fn propagation(message: impl Into<String>) -> Self {
        BridgeError::Propagation {
            message: message.into(),
        }
    }

    /// Create an `UnknownPersistenceContext` error
    pub fn unknown_context(name: impl Into<String>) -> Self {
        BridgeError::UnknownPersistenceContext { name: name.into() }
    }

    /// Create an `UnknownTransaction` error
    pub fn unknown_transaction(name: impl Into<String>) -> Self {
        BridgeError::UnknownTransaction { name: name.into() }
    }

    /// Create a `TransactionState` error
    pub fn transaction_state(expected: impl Into<String>, actual: TransactionStatus) -> Self {
        BridgeError::TransactionState {
            expected: expected.into(),
            actual,
        }
    }

    /// Create a `Resource` error
    pub fn resource(message: impl Into<String>) -> Self {
        BridgeError::Resource {
            message: message.into(),
        }
    }

    /// Create a `Config` error
    pub fn config(message: impl Into<String>) -> Self {
        BridgeError::Config {
            message: message.into(),
        }
    }

    /// True if the error came from the engine rejecting a flush mode
    pub fn is_propagation_failure(&self) -> bool {
        matches!(
            self,
            BridgeError::SessionClosed { .. }
                | BridgeError::UnsupportedFlushMode { .. }
                | BridgeError::Propagation { .. }
        )
    }

    /// True if the error concerns transaction demarcation
    pub fn is_transaction_failure(&self) -> bool {
        matches!(
            self,
            BridgeError::TransactionState { .. }
                | BridgeError::RollbackOnly
                | BridgeError::Resource { .. }
        )
    }
}
