//! Shared test utilities for the end-to-end suites.
//!
//! An in-memory engine whose sessions honour the flush mode: pending writes
//! reach the engine's flushed log only when the mode says so.
//! Import via `mod common;` from any test file.

#![allow(dead_code)]

use parking_lot::Mutex;
use persistence_bridge::{
    BridgeError, BridgeResult, FlushModeType, PersistenceSession, ResourceTransaction,
    SessionCreated, SessionFactory, SessionHandle, SessionListener,
};
use std::sync::{Arc, Once};

static INIT_TRACING: Once = Once::new();

/// Install a test subscriber once.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

// ============================================================================
// MemoryEngine
// ============================================================================

/// Engine storage shared by all sessions
#[derive(Default)]
pub struct MemoryEngine {
    committed: Mutex<Vec<String>>,
    sessions: Mutex<Vec<Arc<MemorySession>>>,
}

impl MemoryEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn committed(&self) -> Vec<String> {
        self.committed.lock().clone()
    }

    pub fn sessions(&self) -> Vec<Arc<MemorySession>> {
        self.sessions.lock().clone()
    }

    /// Open a session directly, outside any factory
    pub fn open(self: &Arc<Self>, context: &str) -> Arc<MemorySession> {
        let session = Arc::new(MemorySession {
            context: context.to_string(),
            engine: Arc::clone(self),
            mode: Mutex::new(FlushModeType::Auto),
            pending: Mutex::new(Vec::new()),
            flushed: Mutex::new(Vec::new()),
            flush_count: Mutex::new(0),
        });
        self.sessions.lock().push(Arc::clone(&session));
        session
    }
}

/// Factory over a shared engine
pub struct MemoryFactory(pub Arc<MemoryEngine>);

impl SessionFactory for MemoryFactory {
    fn open_session(&self, context: &str) -> BridgeResult<SessionHandle> {
        Ok(self.0.open(context))
    }
}

// ============================================================================
// MemorySession
// ============================================================================

pub struct MemorySession {
    context: String,
    engine: Arc<MemoryEngine>,
    mode: Mutex<FlushModeType>,
    pending: Mutex<Vec<String>>,
    flushed: Mutex<Vec<String>>,
    flush_count: Mutex<usize>,
}

impl MemorySession {
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Queue a write; `Always` flushes immediately
    pub fn persist(&self, item: &str) {
        self.pending.lock().push(item.to_string());
        if *self.mode.lock() == FlushModeType::Always {
            self.flush();
        }
    }

    /// Read; `Auto` and `Always` flush pending writes first
    pub fn query(&self) -> usize {
        if matches!(
            *self.mode.lock(),
            FlushModeType::Auto | FlushModeType::Always
        ) {
            self.flush();
        }
        self.flushed.lock().len() + self.engine.committed.lock().len()
    }

    pub fn flush(&self) {
        let mut pending = self.pending.lock();
        if pending.is_empty() {
            return;
        }
        self.flushed.lock().append(&mut pending);
        *self.flush_count.lock() += 1;
    }

    pub fn pending(&self) -> Vec<String> {
        self.pending.lock().clone()
    }

    pub fn flush_count(&self) -> usize {
        *self.flush_count.lock()
    }

    /// Native transaction bound to this session
    pub fn native_transaction(self: &Arc<Self>) -> NativeTransaction {
        NativeTransaction {
            session: Arc::clone(self),
        }
    }
}

impl PersistenceSession for MemorySession {
    fn flush_mode(&self) -> FlushModeType {
        *self.mode.lock()
    }

    fn set_flush_mode(&self, mode: FlushModeType) -> BridgeResult<()> {
        *self.mode.lock() = mode;
        Ok(())
    }
}

// ============================================================================
// NativeTransaction
// ============================================================================

/// Resource-local transaction: commit flushes unless the mode is `Manual`
pub struct NativeTransaction {
    session: Arc<MemorySession>,
}

impl ResourceTransaction for NativeTransaction {
    fn begin(&mut self) -> BridgeResult<()> {
        Ok(())
    }

    fn commit(&mut self) -> BridgeResult<()> {
        let session = &self.session;
        if session.flush_mode() != FlushModeType::Manual {
            session.flush();
        }
        let mut flushed = session.flushed.lock();
        if flushed.iter().any(|item| item.is_empty()) {
            flushed.clear();
            return Err(BridgeError::resource("empty item violates constraint"));
        }
        session.engine.committed.lock().append(&mut flushed);
        Ok(())
    }

    fn rollback(&mut self) -> BridgeResult<()> {
        self.session.pending.lock().clear();
        self.session.flushed.lock().clear();
        Ok(())
    }
}

// ============================================================================
// Listener
// ============================================================================

/// Counts session-created events per context
#[derive(Default)]
pub struct CreatedLog(Mutex<Vec<String>>);

impl CreatedLog {
    pub fn contexts(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

impl SessionListener for CreatedLog {
    fn on_session_created(&self, event: &SessionCreated) {
        self.0.lock().push(event.context.clone());
    }
}
