//! Transaction contracts
//!
//! [`Transaction`] is the uniform demarcation contract application code sees,
//! whichever engine sits underneath. [`ResourceTransaction`] is the engine's
//! native (resource-local) transaction that an adapter delegates to, and
//! [`Synchronization`] lets collaborators hook into completion.
//!
//! Status values follow the standard two-phase transaction status set.

use crate::error::BridgeResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Registry key of the transaction used when none is named
pub const DEFAULT_TRANSACTION: &str = "default";

/// Status of a transaction in its lifecycle
///
/// Transitions driven by the bridge:
/// - `NoTransaction` → `Active` (begin)
/// - `Active` → `MarkedRollback` (set rollback-only)
/// - `Active` → `Committing` → `Committed`
/// - `Active` | `MarkedRollback` → `RollingBack` → `RolledBack`
///
/// `Committed` and `RolledBack` are terminal for one demarcation; a new
/// `begin` starts the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Associated and in progress
    Active,
    /// Will be rolled back whatever happens
    MarkedRollback,
    /// Prepared in a two-phase commit
    Prepared,
    /// Completed by commit
    Committed,
    /// Completed by rollback
    RolledBack,
    /// Status cannot be determined
    Unknown,
    /// No transaction is associated
    NoTransaction,
    /// In the prepare phase
    Preparing,
    /// Commit in progress
    Committing,
    /// Rollback in progress
    RollingBack,
}

impl TransactionStatus {
    /// True once a demarcation has finished (committed or rolled back)
    pub fn is_completed(&self) -> bool {
        matches!(self, TransactionStatus::Committed | TransactionStatus::RolledBack)
    }
}

/// Uniform transaction demarcation contract
///
/// Implementations are shared (`Arc<dyn Transaction>`), so every method takes
/// `&self` and state lives behind interior mutability.
pub trait Transaction: Send + Sync {
    /// Start a new transaction
    ///
    /// # Errors
    ///
    /// Returns `TransactionState` if a transaction is already in progress.
    fn begin(&self) -> BridgeResult<()>;

    /// Commit the current transaction
    ///
    /// # Errors
    ///
    /// Returns `RollbackOnly` (after rolling back) if the transaction was
    /// marked rollback-only, `TransactionState` if none is active, or the
    /// resource error if the engine fails.
    fn commit(&self) -> BridgeResult<()>;

    /// Roll back the current transaction
    ///
    /// # Errors
    ///
    /// Returns `TransactionState` if no transaction is in progress.
    fn rollback(&self) -> BridgeResult<()>;

    /// Mark the current transaction so it can only roll back
    ///
    /// # Errors
    ///
    /// Returns `TransactionState` if no transaction is in progress.
    fn set_rollback_only(&self) -> BridgeResult<()>;

    /// Current status
    fn status(&self) -> TransactionStatus;

    /// Timeout applied to transactions started after this call
    fn set_timeout(&self, timeout: Option<Duration>);

    /// Register a completion callback for the current transaction
    ///
    /// # Errors
    ///
    /// Returns `TransactionState` if no transaction is active.
    fn register_synchronization(&self, sync: Box<dyn Synchronization>) -> BridgeResult<()>;

    /// `status() == Active`
    fn is_active(&self) -> bool {
        self.status() == TransactionStatus::Active
    }

    /// Active, or active but doomed to roll back
    fn is_active_or_marked_rollback(&self) -> bool {
        matches!(
            self.status(),
            TransactionStatus::Active | TransactionStatus::MarkedRollback
        )
    }

    /// `status() == MarkedRollback`
    fn is_marked_rollback(&self) -> bool {
        self.status() == TransactionStatus::MarkedRollback
    }

    /// Rolled back, or marked so that it will be
    fn is_rolled_back_or_marked_rollback(&self) -> bool {
        matches!(
            self.status(),
            TransactionStatus::RolledBack | TransactionStatus::MarkedRollback
        )
    }

    /// `status() == Committed`
    fn is_committed(&self) -> bool {
        self.status() == TransactionStatus::Committed
    }

    /// `status() == RolledBack`
    fn is_rolled_back(&self) -> bool {
        self.status() == TransactionStatus::RolledBack
    }

    /// `status() == NoTransaction`
    fn is_no_transaction(&self) -> bool {
        self.status() == TransactionStatus::NoTransaction
    }
}

/// Shared handle to a transaction
pub type TransactionHandle = Arc<dyn Transaction>;

/// Native transaction of the persistence engine
pub trait ResourceTransaction: Send {
    /// Begin a native transaction
    fn begin(&mut self) -> BridgeResult<()>;

    /// Commit the native transaction
    fn commit(&mut self) -> BridgeResult<()>;

    /// Roll back the native transaction
    fn rollback(&mut self) -> BridgeResult<()>;

    /// Apply a timeout to the next native transaction, if supported
    fn set_timeout(&mut self, _timeout: Option<Duration>) {}
}

/// Completion callback
pub trait Synchronization: Send {
    /// Called before commit starts
    ///
    /// # Errors
    ///
    /// An error aborts the commit; the transaction is rolled back.
    fn before_completion(&mut self) -> BridgeResult<()> {
        Ok(())
    }

    /// Called after commit or rollback with the final status
    fn after_completion(&mut self, status: TransactionStatus);
}
