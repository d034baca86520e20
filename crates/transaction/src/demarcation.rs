//! Declarative transaction demarcation
//!
//! [`transactional`] runs a closure inside a transaction boundary and decides
//! begin/commit/rollback from the closure's result, so application code never
//! pairs those calls by hand.
//!
//! ```ignore
//! let total = transactional(&*tx, Propagation::Required, || {
//!     orders.insert(&order)?;
//!     ledger.post(&order)
//! })?;
//! ```

use bridge_core::{BridgeError, BridgeResult, Transaction};
use tracing::{debug, warn};

/// How a demarcated block relates to a transaction already in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Propagation {
    /// Join the active transaction, or start one around the block
    #[default]
    Required,
    /// Join the active transaction; fail if there is none
    Mandatory,
    /// Run untransacted; fail if a transaction is active
    Never,
}

/// Run `f` inside `tx` according to `propagation`
///
/// When this call starts the transaction it also completes it: commit on
/// `Ok`, rollback on `Err`. If `f` marked the transaction rollback-only the
/// commit rolls back and `RollbackOnly` is returned. When joining a
/// transaction started by a caller, an `Err` from `f` marks it rollback-only
/// and completion is left to that caller.
///
/// A panic in `f` rolls back a transaction this call started.
///
/// # Errors
///
/// Returns the error from `f`, a `TransactionState` error if `propagation`
/// does not allow the current status, or the transaction's own error if it
/// cannot begin or commit.
pub fn transactional<T, F>(tx: &dyn Transaction, propagation: Propagation, f: F) -> BridgeResult<T>
where
    F: FnOnce() -> BridgeResult<T>,
{
    let in_progress = tx.is_active_or_marked_rollback();
    match propagation {
        Propagation::Required if in_progress => join(tx, f),
        Propagation::Required => run_in_new(tx, f),
        Propagation::Mandatory if in_progress => join(tx, f),
        Propagation::Mandatory => Err(BridgeError::transaction_state(
            "Active or MarkedRollback",
            tx.status(),
        )),
        Propagation::Never if in_progress => Err(BridgeError::transaction_state(
            "no transaction in progress",
            tx.status(),
        )),
        Propagation::Never => f(),
    }
}

/// Rolls back on unwind until disarmed
struct RollbackOnUnwind<'a> {
    tx: &'a dyn Transaction,
    armed: bool,
}

impl Drop for RollbackOnUnwind<'_> {
    fn drop(&mut self) {
        if self.armed && self.tx.is_active_or_marked_rollback() {
            if let Err(e) = self.tx.rollback() {
                warn!(target: "bridge::tx", error = %e, "Rollback during unwind failed");
            }
        }
    }
}

fn run_in_new<T, F>(tx: &dyn Transaction, f: F) -> BridgeResult<T>
where
    F: FnOnce() -> BridgeResult<T>,
{
    tx.begin()?;
    let mut guard = RollbackOnUnwind { tx, armed: true };
    let outcome = f();
    guard.armed = false;

    match outcome {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(e) => {
            debug!(target: "bridge::tx", error = %e, "Demarcated block failed, rolling back");
            if let Err(rollback) = tx.rollback() {
                warn!(target: "bridge::tx", error = %rollback, "Rollback after failed block failed");
            }
            Err(e)
        }
    }
}

fn join<T, F>(tx: &dyn Transaction, f: F) -> BridgeResult<T>
where
    F: FnOnce() -> BridgeResult<T>,
{
    f().map_err(|e| {
        debug!(target: "bridge::tx", error = %e, "Joined block failed, marking rollback-only");
        if let Err(mark) = tx.set_rollback_only() {
            warn!(target: "bridge::tx", error = %mark, "Could not mark transaction rollback-only");
        }
        e
    })
}
