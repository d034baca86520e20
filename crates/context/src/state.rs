//! Flush-mode bookkeeping for one scope
//!
//! `FlushModeState` is the pure half of the flush-mode controller: it knows
//! which mode is current and which mode a pending temporary override must
//! return to, but never talks to a session. Transitions are computed as new
//! values so the controller can apply them to the engine first and commit
//! them only once the engine accepted the change.
//!
//! ## States
//!
//! ```text
//!            change(_, temporary)          change(_, temporary)
//!   Normal ──────────────────────▶ Overridden ◀─────────────┐
//!     ▲  ▲                             │  │                  │
//!     │  └──── change(_, permanent) ───┘  └──────────────────┘
//!     └─────── restore ────────────────┘
//! ```
//!
//! `Normal`: no saved mode. `Overridden`: a saved mode is pending restore.
//! Consecutive temporary changes keep the first saved mode, so one restore
//! always returns to the mode in effect before the first unrestored override.

use bridge_core::FlushModeType;

/// Current flush mode plus the pending restore target, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushModeState {
    current: FlushModeType,
    saved: Option<FlushModeType>,
}

impl FlushModeState {
    /// Create a state in `Normal` with the given baseline
    pub fn new(baseline: FlushModeType) -> Self {
        Self {
            current: baseline,
            saved: None,
        }
    }

    /// Mode presented to callers
    pub fn current(&self) -> FlushModeType {
        self.current
    }

    /// Mode a restore returns to, present only while overridden
    pub fn saved(&self) -> Option<FlushModeType> {
        self.saved
    }

    /// True while a temporary override is pending
    pub fn is_overridden(&self) -> bool {
        self.saved.is_some()
    }

    /// State after `change_flush_mode(mode, temporary)`
    ///
    /// A permanent change discards any pending restore target and becomes
    /// the new baseline. A temporary change captures the baseline only if no
    /// override is pending yet.
    #[must_use]
    pub fn changed(&self, mode: FlushModeType, temporary: bool) -> Self {
        let saved = if temporary {
            Some(self.saved.unwrap_or(self.current))
        } else {
            None
        };
        Self {
            current: mode,
            saved,
        }
    }

    /// State after `restore_flush_mode()`, or `None` when nothing is pending
    #[must_use]
    pub fn restored(&self) -> Option<Self> {
        self.saved.map(FlushModeState::new)
    }
}

impl Default for FlushModeState {
    fn default() -> Self {
        Self::new(FlushModeType::default())
    }
}
