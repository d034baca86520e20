//! Resource-local transaction adapter
//!
//! [`LocalTransaction`] wraps an engine's native transaction and adds what the
//! engine does not track on its own: the uniform status set, the rollback-only
//! mark, a timeout carried to the next `begin`, and completion callbacks.
//!
//! ## Status transitions
//!
//! ```text
//! NoTransaction ──begin──> Active ──commit──> Committing ──> Committed
//!                            │                    └─(engine error)─> RolledBack
//!                            ├──set_rollback_only──> MarkedRollback
//!                            └──rollback──> RollingBack ──> RolledBack
//!                                                  └─(engine error)─> Unknown
//! ```
//!
//! `Committed`, `RolledBack` and `Unknown` accept a new `begin`.
//!
//! Synchronization callbacks run without the internal lock held, so a
//! callback may query the transaction's status, mark it rollback-only, or
//! register further callbacks from `before_completion`.

use bridge_core::{
    BridgeError, BridgeResult, ResourceTransaction, Synchronization, Transaction,
    TransactionStatus,
};
use parking_lot::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

struct LocalState<R> {
    resource: R,
    status: TransactionStatus,
    timeout: Option<Duration>,
    synchronizations: Vec<Box<dyn Synchronization>>,
}

impl<R: ResourceTransaction> LocalState<R> {
    fn ensure_in_progress(&self) -> BridgeResult<()> {
        match self.status {
            TransactionStatus::Active | TransactionStatus::MarkedRollback => Ok(()),
            other => Err(BridgeError::transaction_state(
                "Active or MarkedRollback",
                other,
            )),
        }
    }

    /// Roll the native transaction back and record the outcome
    fn roll_back(&mut self) -> BridgeResult<()> {
        self.status = TransactionStatus::RollingBack;
        let result = self.resource.rollback();
        self.status = if result.is_ok() {
            TransactionStatus::RolledBack
        } else {
            TransactionStatus::Unknown
        };
        result
    }
}

/// [`Transaction`] over an engine's native transaction
///
/// # Example
///
/// ```ignore
/// let tx = LocalTransaction::new(session.native_transaction());
/// tx.begin()?;
/// // ... work through the session ...
/// tx.commit()?;
/// ```
pub struct LocalTransaction<R: ResourceTransaction> {
    state: Mutex<LocalState<R>>,
}

impl<R: ResourceTransaction> LocalTransaction<R> {
    /// Wrap a native transaction; nothing is started yet
    pub fn new(resource: R) -> Self {
        Self {
            state: Mutex::new(LocalState {
                resource,
                status: TransactionStatus::NoTransaction,
                timeout: None,
                synchronizations: Vec::new(),
            }),
        }
    }

    /// Run `f` against the wrapped native transaction
    pub fn with_resource<T>(&self, f: impl FnOnce(&mut R) -> T) -> T {
        f(&mut self.state.lock().resource)
    }

    /// Timeout applied at the next `begin`
    pub fn timeout(&self) -> Option<Duration> {
        self.state.lock().timeout
    }

    /// Number of callbacks registered for the current transaction
    pub fn synchronization_count(&self) -> usize {
        self.state.lock().synchronizations.len()
    }

    fn notify(synchronizations: &mut [Box<dyn Synchronization>], status: TransactionStatus) {
        for sync in synchronizations.iter_mut() {
            sync.after_completion(status);
        }
    }
}

impl<R: ResourceTransaction> Transaction for LocalTransaction<R> {
    fn begin(&self) -> BridgeResult<()> {
        let mut state = self.state.lock();
        if matches!(
            state.status,
            TransactionStatus::Active | TransactionStatus::MarkedRollback
        ) {
            return Err(BridgeError::transaction_state(
                "no transaction in progress",
                state.status,
            ));
        }

        let timeout = state.timeout;
        state.resource.set_timeout(timeout);
        state.resource.begin()?;
        state.synchronizations.clear();
        state.status = TransactionStatus::Active;
        debug!(target: "bridge::tx", ?timeout, "Transaction begun");
        Ok(())
    }

    fn commit(&self) -> BridgeResult<()> {
        let mut synchronizations = {
            let mut state = self.state.lock();
            let status = state.status;
            match status {
                TransactionStatus::Active => {}
                TransactionStatus::MarkedRollback => {
                    drop(state);
                    debug!(target: "bridge::tx", "Commit of rollback-only transaction, rolling back");
                    self.rollback()?;
                    return Err(BridgeError::RollbackOnly);
                }
                other => return Err(BridgeError::transaction_state("Active", other)),
            }
            std::mem::take(&mut state.synchronizations)
        };

        // Phase 1: callbacks may veto the commit
        let vetoed = synchronizations
            .iter_mut()
            .find_map(|sync| sync.before_completion().err());

        // Phase 2: native commit, unless phase 1 vetoed it or changed the status
        let (status, result) = {
            let mut state = self.state.lock();
            // Registered during phase 1: notified below, no before_completion
            synchronizations.append(&mut state.synchronizations);
            let status = state.status;
            match (vetoed, status) {
                (Some(veto), TransactionStatus::Active | TransactionStatus::MarkedRollback) => {
                    if let Err(e) = state.roll_back() {
                        warn!(target: "bridge::tx", error = %e, "Rollback after vetoed commit failed");
                    }
                    debug!(target: "bridge::tx", error = %veto, "Commit vetoed by synchronization");
                    (state.status, Err(veto))
                }
                (Some(veto), other) => (other, Err(veto)),
                (None, TransactionStatus::MarkedRollback) => {
                    debug!(target: "bridge::tx", "Marked rollback-only during commit, rolling back");
                    let result = state.roll_back().and(Err(BridgeError::RollbackOnly));
                    (state.status, result)
                }
                (None, TransactionStatus::Active) => {
                    state.status = TransactionStatus::Committing;
                    let committed = state.resource.commit();
                    match committed {
                        Ok(()) => {
                            state.status = TransactionStatus::Committed;
                            debug!(target: "bridge::tx", "Transaction committed");
                            (state.status, Ok(()))
                        }
                        Err(e) => {
                            // A failed resource-local commit leaves nothing applied
                            state.status = TransactionStatus::RolledBack;
                            warn!(target: "bridge::tx", error = %e, "Commit failed");
                            (state.status, Err(e))
                        }
                    }
                }
                // A callback completed the transaction itself
                (None, other) => (other, Err(BridgeError::transaction_state("Active", other))),
            }
        };

        Self::notify(&mut synchronizations, status);
        result
    }

    fn rollback(&self) -> BridgeResult<()> {
        let (mut synchronizations, result, status) = {
            let mut state = self.state.lock();
            state.ensure_in_progress()?;
            let synchronizations = std::mem::take(&mut state.synchronizations);
            let result = state.roll_back();
            (synchronizations, result, state.status)
        };

        Self::notify(&mut synchronizations, status);
        match &result {
            Ok(()) => debug!(target: "bridge::tx", "Transaction rolled back"),
            Err(e) => warn!(target: "bridge::tx", error = %e, "Rollback failed"),
        }
        result
    }

    fn set_rollback_only(&self) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.ensure_in_progress()?;
        state.status = TransactionStatus::MarkedRollback;
        Ok(())
    }

    fn status(&self) -> TransactionStatus {
        self.state.lock().status
    }

    fn set_timeout(&self, timeout: Option<Duration>) {
        self.state.lock().timeout = timeout;
    }

    fn register_synchronization(&self, sync: Box<dyn Synchronization>) -> BridgeResult<()> {
        let mut state = self.state.lock();
        if state.status != TransactionStatus::Active {
            return Err(BridgeError::transaction_state("Active", state.status));
        }
        state.synchronizations.push(sync);
        Ok(())
    }
}

impl<R: ResourceTransaction> std::fmt::Debug for LocalTransaction<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LocalTransaction")
            .field("status", &state.status)
            .field("timeout", &state.timeout)
            .field("synchronizations", &state.synchronizations.len())
            .finish()
    }
}
