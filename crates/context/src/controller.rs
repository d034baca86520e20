//! Flush-mode controller
//!
//! The only access path for reading and changing the flush mode of a scope's
//! persistence contexts. It pairs a [`FlushModeState`] with a
//! [`FlushModeTarget`] and guarantees:
//!
//! - `current` always reflects the last mode the target accepted; a rejected
//!   change leaves both `current` and `saved` untouched
//! - a temporary override is undone exactly once, by `restore_flush_mode`
//!   or `after_render`
//! - `before_render` never restores
//!
//! The host must call `after_render` once per render cycle (or end the
//! scope). The controller cannot detect a missing call; a forgotten restore
//! shows up as an unexpected mode in the next operation.

use crate::state::FlushModeState;
use crate::target::FlushModeTarget;
use bridge_core::{BridgeResult, FlushModeType, PersistenceSession, SessionCreated};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What `before_render` does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPolicy {
    /// Rendering runs under whatever mode is current
    #[default]
    Passthrough,
    /// Rendering runs under `Manual`, applied as a temporary override so the
    /// restore in `after_render` returns to the pre-render mode
    ManualDuringRender,
}

/// Owns one scope's flush-mode state and applies it to a target
pub struct FlushModeController<T: FlushModeTarget> {
    state: FlushModeState,
    target: T,
    render_policy: RenderPolicy,
    /// No change has been applied yet
    pristine: bool,
}

impl<T: FlushModeTarget> FlushModeController<T> {
    /// Create a controller whose baseline is the target's default mode
    pub fn new(target: T) -> Self {
        let baseline = target.default_flush_mode();
        Self::with_baseline(target, baseline)
    }

    /// Create a controller with an explicit baseline
    ///
    /// The baseline is not pushed to the target; the target is assumed to be
    /// in that mode already or to receive it from its own initialization.
    pub fn with_baseline(target: T, baseline: FlushModeType) -> Self {
        Self {
            state: FlushModeState::new(baseline),
            target,
            render_policy: RenderPolicy::default(),
            pristine: true,
        }
    }

    /// Set the render policy (builder pattern)
    pub fn with_render_policy(mut self, policy: RenderPolicy) -> Self {
        self.render_policy = policy;
        self
    }

    /// Current render policy
    pub fn render_policy(&self) -> RenderPolicy {
        self.render_policy
    }

    /// Flush mode presented to callers
    pub fn flush_mode(&self) -> FlushModeType {
        self.state.current()
    }

    /// Snapshot of the state
    pub fn state(&self) -> FlushModeState {
        self.state
    }

    /// True while a temporary override is pending
    pub fn is_overridden(&self) -> bool {
        self.state.is_overridden()
    }

    /// Borrow the target
    pub fn target(&self) -> &T {
        &self.target
    }

    /// Mutably borrow the target
    ///
    /// Changes made through this borrow bypass the state machine.
    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    /// Release the target
    pub fn into_target(self) -> T {
        self.target
    }

    /// Permanently change the flush mode
    ///
    /// Same as `change_flush_mode_with(mode, false)`.
    pub fn change_flush_mode(&mut self, mode: FlushModeType) -> BridgeResult<()> {
        self.change_flush_mode_with(mode, false)
    }

    /// Change the flush mode, optionally as a temporary override
    ///
    /// # Errors
    ///
    /// Returns the target's error unmodified; the state is unchanged then.
    pub fn change_flush_mode_with(
        &mut self,
        mode: FlushModeType,
        temporary: bool,
    ) -> BridgeResult<()> {
        let next = self.state.changed(mode, temporary);
        self.target.apply_flush_mode(mode)?;
        debug!(
            mode = %mode,
            temporary,
            saved = ?next.saved(),
            "Flush mode changed"
        );
        self.state = next;
        self.pristine = false;
        Ok(())
    }

    /// Undo a pending temporary override; no-op when none is pending
    ///
    /// # Errors
    ///
    /// Returns the target's error unmodified; the override stays pending.
    pub fn restore_flush_mode(&mut self) -> BridgeResult<()> {
        let Some(next) = self.state.restored() else {
            return Ok(());
        };
        self.target.apply_flush_mode(next.current())?;
        debug!(restored = %next.current(), "Flush mode restored");
        self.state = next;
        Ok(())
    }

    /// Hook run right before the render phase
    ///
    /// Never restores. Under `ManualDuringRender` it switches to `Manual`
    /// temporarily.
    pub fn before_render(&mut self) -> BridgeResult<()> {
        match self.render_policy {
            RenderPolicy::Passthrough => Ok(()),
            RenderPolicy::ManualDuringRender => {
                self.change_flush_mode_with(FlushModeType::Manual, true)
            }
        }
    }

    /// Hook run right after the render phase; always restores
    pub fn after_render(&mut self) -> BridgeResult<()> {
        self.restore_flush_mode()
    }

    /// React to a newly opened session
    ///
    /// While no change has been applied, the new session's default becomes
    /// the baseline and is applied to the whole target. Afterwards the new
    /// session is brought in line with the current mode instead.
    pub fn on_session_created(&mut self, event: &SessionCreated) -> BridgeResult<()> {
        if self.pristine {
            let baseline = PersistenceSession::default_flush_mode(event.session.as_ref());
            self.target.apply_flush_mode(baseline)?;
            debug!(context = %event.context, baseline = %baseline, "Adopted session default flush mode");
            self.state = FlushModeState::new(baseline);
        } else if event.session.flush_mode() != self.state.current() {
            event.session.set_flush_mode(self.state.current())?;
            debug!(context = %event.context, mode = %self.state.current(), "Aligned new session flush mode");
        }
        Ok(())
    }
}

impl<T: FlushModeTarget + Default> Default for FlushModeController<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: FlushModeTarget> std::fmt::Debug for FlushModeController<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushModeController")
            .field("state", &self.state)
            .field("render_policy", &self.render_policy)
            .field("pristine", &self.pristine)
            .finish()
    }
}
