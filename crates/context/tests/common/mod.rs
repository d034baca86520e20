//! Shared test utilities for the bridge-context integration suites.
//!
//! Import via `mod common;` from any test file.

#![allow(dead_code)]

use bridge_core::{
    BridgeError, BridgeResult, FlushModeType, PersistenceSession, SessionFactory, SessionHandle,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

static INIT_TRACING: Once = Once::new();

/// Install a test subscriber once, so `RUST_LOG=debug` shows bridge logs.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Session that records every mode applied to it
pub struct RecordingSession {
    name: String,
    default: FlushModeType,
    mode: Mutex<FlushModeType>,
    history: Mutex<Vec<FlushModeType>>,
    open: AtomicBool,
    unsupported: Mutex<Vec<FlushModeType>>,
}

impl RecordingSession {
    pub fn new(name: &str, default: FlushModeType) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            default,
            mode: Mutex::new(default),
            history: Mutex::new(Vec::new()),
            open: AtomicBool::new(true),
            unsupported: Mutex::new(Vec::new()),
        })
    }

    /// Modes applied so far, oldest first
    pub fn history(&self) -> Vec<FlushModeType> {
        self.history.lock().clone()
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub fn reject(&self, mode: FlushModeType) {
        self.unsupported.lock().push(mode);
    }
}

impl PersistenceSession for RecordingSession {
    fn flush_mode(&self) -> FlushModeType {
        *self.mode.lock()
    }

    fn set_flush_mode(&self, mode: FlushModeType) -> BridgeResult<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(BridgeError::session_closed(self.name.clone()));
        }
        if self.unsupported.lock().contains(&mode) {
            return Err(BridgeError::UnsupportedFlushMode { mode });
        }
        *self.mode.lock() = mode;
        self.history.lock().push(mode);
        Ok(())
    }

    fn default_flush_mode(&self) -> FlushModeType {
        self.default
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Factory that opens a fresh `RecordingSession` per call and keeps them all
pub struct RecordingFactory {
    default: FlushModeType,
    opened: Mutex<Vec<Arc<RecordingSession>>>,
}

impl RecordingFactory {
    pub fn new(default: FlushModeType) -> Arc<Self> {
        Arc::new(Self {
            default,
            opened: Mutex::new(Vec::new()),
        })
    }

    pub fn opened(&self) -> Vec<Arc<RecordingSession>> {
        self.opened.lock().clone()
    }

    pub fn last(&self) -> Option<Arc<RecordingSession>> {
        self.opened.lock().last().cloned()
    }
}

impl SessionFactory for RecordingFactory {
    fn open_session(&self, context: &str) -> BridgeResult<SessionHandle> {
        let session = RecordingSession::new(context, self.default);
        self.opened.lock().push(Arc::clone(&session));
        Ok(session)
    }
}
