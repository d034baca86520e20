//! Core types and traits for the persistence bridge
//!
//! This crate defines the foundational types shared by every bridge crate:
//! - FlushModeType: the wrapped engine's flush policies
//! - PersistenceSession / SessionFactory / SessionListener: session seams
//! - SessionCreated: event published when a managed context opens a session
//! - Transaction / ResourceTransaction / Synchronization: demarcation seams
//! - ScopeId / ScopeKind: identity of the owning request or conversation
//! - BridgeError: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod flush;
pub mod session;
pub mod transaction;
pub mod types;

pub use error::{BridgeError, BridgeResult};
pub use flush::{FlushModeType, ParseFlushModeError};
pub use session::{
    PersistenceSession, SessionCreated, SessionFactory, SessionHandle, SessionListener,
};
pub use transaction::{
    ResourceTransaction, Synchronization, Transaction, TransactionHandle, TransactionStatus,
    DEFAULT_TRANSACTION,
};
pub use types::{ScopeId, ScopeKind};
