//! Persistence bridge - flush-mode and transaction plumbing between an
//! application framework and a persistence engine
//!
//! The bridge lets request-scoped code change how eagerly the engine writes
//! pending changes (its flush mode), temporarily or permanently, and makes
//! sure a temporary change never outlives the render phase that needed it.
//! It also offers closure-based transaction demarcation over the engine's
//! native transactions.
//!
//! # Quick Start
//!
//! ```ignore
//! use persistence_bridge::{FlushModeType, PersistenceBridge, ScopeKind};
//!
//! let mut bridge = PersistenceBridge::open("/etc/myapp")?;
//! bridge.register_context("orders", orders_factory);
//!
//! let mut scope = bridge.open_scope(ScopeKind::Request);
//! scope.change_flush_mode_with(FlushModeType::Manual, true)?;
//! scope.render(|scope| render_page(scope))?;   // flush mode restored here
//! scope.close()?;
//! ```
//!
//! # Architecture
//!
//! - `bridge-core`: flush modes, errors, and the session and transaction traits
//! - `bridge-context`: the flush-mode state machine, scopes, and configuration
//! - `bridge-transaction`: the resource-local adapter and demarcation

pub use bridge_context::{
    BridgeConfig, FlushModeController, FlushModeState, FlushModeTarget, ManagedPersistenceContext,
    PersistenceContexts, PersistenceScope, RenderGuard, RenderPolicy, SessionAccess,
    SessionEvents, CONFIG_FILE_NAME,
};
pub use bridge_core::{
    BridgeError, BridgeResult, FlushModeType, ParseFlushModeError, PersistenceSession,
    ResourceTransaction, ScopeId, ScopeKind, SessionCreated, SessionFactory, SessionHandle,
    SessionListener, Synchronization, Transaction, TransactionHandle, TransactionStatus,
    DEFAULT_TRANSACTION,
};
pub use bridge_transaction::{transactional, LocalTransaction, Propagation, TransactionRegistry};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Application-wide wiring: configuration, persistence contexts, transactions
///
/// One `PersistenceBridge` lives for the application; it opens a
/// [`PersistenceScope`] per request or conversation with every registered
/// context and listener already wired in.
pub struct PersistenceBridge {
    config: BridgeConfig,
    factories: BTreeMap<String, Arc<dyn SessionFactory>>,
    listeners: Vec<Arc<dyn SessionListener>>,
    transactions: TransactionRegistry,
}

impl PersistenceBridge {
    /// Bridge with an explicit configuration
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the configuration fails validation.
    pub fn new(config: BridgeConfig) -> BridgeResult<Self> {
        config.validate()?;
        let transactions = TransactionRegistry::with_default_name(config.default_transaction.clone());
        Ok(Self {
            config,
            factories: BTreeMap::new(),
            listeners: Vec::new(),
            transactions,
        })
    }

    /// Bridge configured from `bridge.toml` in `config_dir`
    ///
    /// The directory is created if needed, and a commented default
    /// `bridge.toml` is written if none exists.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the directory or file cannot be created,
    /// read, or parsed.
    pub fn open<P: AsRef<Path>>(config_dir: P) -> BridgeResult<Self> {
        let config_dir = config_dir.as_ref();
        std::fs::create_dir_all(config_dir).map_err(|e| {
            BridgeError::config(format!(
                "Failed to create config directory '{}': {}",
                config_dir.display(),
                e
            ))
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        BridgeConfig::write_default_if_missing(&config_path)?;
        let config = BridgeConfig::from_file(&config_path)?;

        info!(
            target: "bridge",
            path = %config_path.display(),
            default_flush_mode = %config.default_flush_mode,
            render_policy = ?config.render_policy,
            default_transaction = %config.default_transaction,
            "Persistence bridge configured"
        );
        Self::new(config)
    }

    /// Active configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Register a persistence context available to every scope opened afterwards
    pub fn register_context(
        &mut self,
        name: impl Into<String>,
        factory: Arc<dyn SessionFactory>,
    ) -> &mut Self {
        let name = name.into();
        debug!(target: "bridge", context = %name, "Persistence context registered");
        self.factories.insert(name, factory);
        self
    }

    /// Names of the registered persistence contexts, in order
    pub fn context_names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Subscribe a listener to session-created events in every new scope
    pub fn add_listener(&mut self, listener: Arc<dyn SessionListener>) -> &mut Self {
        self.listeners.push(listener);
        self
    }

    /// Register a transaction under `name`
    pub fn register_transaction(
        &mut self,
        name: impl Into<String>,
        transaction: TransactionHandle,
    ) -> &mut Self {
        self.transactions.register(name, transaction);
        self
    }

    /// Named transactions
    pub fn transactions(&self) -> &TransactionRegistry {
        &self.transactions
    }

    /// Transaction registered under `name`
    ///
    /// # Errors
    ///
    /// Returns `UnknownTransaction` if nothing is registered under `name`.
    pub fn transaction(&self, name: &str) -> BridgeResult<TransactionHandle> {
        self.transactions.get(name)
    }

    /// Transaction named by `default_transaction` in the configuration
    ///
    /// # Errors
    ///
    /// Returns `UnknownTransaction` if that name is not registered.
    pub fn default_transaction(&self) -> BridgeResult<TransactionHandle> {
        self.transactions.default_transaction()
    }

    /// Run `f` in the default transaction
    ///
    /// # Errors
    ///
    /// See [`transactional`]; also `UnknownTransaction` if no default is registered.
    pub fn transactional<T, F>(&self, propagation: Propagation, f: F) -> BridgeResult<T>
    where
        F: FnOnce() -> BridgeResult<T>,
    {
        let tx = self.default_transaction()?;
        transactional(&*tx, propagation, f)
    }

    /// Open a scope with every registered context and listener wired in
    pub fn open_scope(&self, kind: ScopeKind) -> PersistenceScope {
        let mut scope = PersistenceScope::open(kind, &self.config);
        for (name, factory) in &self.factories {
            scope.register(name.clone(), Arc::clone(factory));
        }
        for listener in &self.listeners {
            scope.add_listener(Arc::clone(listener));
        }
        scope
    }
}

impl std::fmt::Debug for PersistenceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceBridge")
            .field("config", &self.config)
            .field("contexts", &self.factories.keys().collect::<Vec<_>>())
            .field("listeners", &self.listeners.len())
            .field("transactions", &self.transactions)
            .finish()
    }
}
