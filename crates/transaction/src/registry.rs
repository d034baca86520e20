//! Named transactions
//!
//! Applications that wire more than one transaction refer to them by name.
//! The name resolved by [`TransactionRegistry::default_transaction`] comes from
//! configuration and defaults to [`DEFAULT_TRANSACTION`].

use bridge_core::{BridgeError, BridgeResult, TransactionHandle, DEFAULT_TRANSACTION};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Registry of transactions keyed by name
#[derive(Clone)]
pub struct TransactionRegistry {
    transactions: BTreeMap<String, TransactionHandle>,
    default_name: String,
}

impl TransactionRegistry {
    /// Empty registry whose default is [`DEFAULT_TRANSACTION`]
    pub fn new() -> Self {
        Self::with_default_name(DEFAULT_TRANSACTION)
    }

    /// Empty registry resolving the default to `name`
    pub fn with_default_name(name: impl Into<String>) -> Self {
        Self {
            transactions: BTreeMap::new(),
            default_name: name.into(),
        }
    }

    /// Name resolved by [`default_transaction`](Self::default_transaction)
    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Change which registered name is the default
    pub fn set_default_name(&mut self, name: impl Into<String>) {
        self.default_name = name.into();
    }

    /// Register `transaction` under `name`, returning the one it replaced
    pub fn register(
        &mut self,
        name: impl Into<String>,
        transaction: TransactionHandle,
    ) -> Option<TransactionHandle> {
        let name = name.into();
        debug!(target: "bridge::tx", transaction = %name, "Transaction registered");
        self.transactions.insert(name, transaction)
    }

    /// Register `transaction` as the default
    pub fn register_default(&mut self, transaction: TransactionHandle) -> Option<TransactionHandle> {
        let name = self.default_name.clone();
        self.register(name, transaction)
    }

    /// Remove the transaction registered under `name`
    pub fn remove(&mut self, name: &str) -> Option<TransactionHandle> {
        self.transactions.remove(name)
    }

    /// Look up a transaction by name
    ///
    /// # Errors
    ///
    /// Returns `UnknownTransaction` if nothing is registered under `name`.
    pub fn get(&self, name: &str) -> BridgeResult<TransactionHandle> {
        self.transactions
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| BridgeError::unknown_transaction(name))
    }

    /// The transaction registered under the default name
    ///
    /// # Errors
    ///
    /// Returns `UnknownTransaction` if the default name is not registered.
    pub fn default_transaction(&self) -> BridgeResult<TransactionHandle> {
        self.get(&self.default_name)
    }

    /// True if `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.transactions.contains_key(name)
    }

    /// Registered names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.transactions.keys().map(String::as_str)
    }

    /// Number of registered transactions
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// True if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl Default for TransactionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TransactionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let statuses: BTreeMap<&str, _> = self
            .transactions
            .iter()
            .map(|(name, tx)| (name.as_str(), tx.status()))
            .collect();
        f.debug_struct("TransactionRegistry")
            .field("default_name", &self.default_name)
            .field("transactions", &statuses)
            .finish()
    }
}
