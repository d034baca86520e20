//! Persistence scope
//!
//! A `PersistenceScope` is the explicit owner of one request's or one
//! conversation's persistence state: the flush-mode controller, the managed
//! persistence contexts and the session-created listeners. The host creates
//! it when the scope starts and closes (or drops) it when the scope ends.
//!
//! # Render cycle
//!
//! The host calls `before_render` then `after_render` once per render phase.
//! `render` and `render_guard` do this on every exit path, including early
//! returns and panics, which is the preferred way to drive a render phase.
//!
//! # Teardown
//!
//! `close` restores a pending override and releases the sessions. Dropping a
//! scope that was not closed does the same on a best-effort basis and logs
//! what it had to undo.

use crate::config::BridgeConfig;
use crate::contexts::PersistenceContexts;
use crate::controller::FlushModeController;
use crate::events::SessionEvents;
use crate::managed::{ManagedPersistenceContext, SessionAccess};
use bridge_core::{
    BridgeError, BridgeResult, FlushModeType, ScopeId, ScopeKind, SessionCreated, SessionFactory,
    SessionHandle, SessionListener,
};
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::{debug, warn};

/// Persistence state owned by one request or conversation
pub struct PersistenceScope {
    id: ScopeId,
    kind: ScopeKind,
    controller: FlushModeController<PersistenceContexts>,
    managed: BTreeMap<String, ManagedPersistenceContext>,
    events: SessionEvents,
    rendering: bool,
    closed: bool,
}

impl PersistenceScope {
    /// Start a scope configured by `config`
    pub fn open(kind: ScopeKind, config: &BridgeConfig) -> Self {
        let contexts = PersistenceContexts::with_default_flush_mode(config.default_flush_mode);
        let controller = FlushModeController::with_baseline(contexts, config.default_flush_mode)
            .with_render_policy(config.render_policy);
        let id = ScopeId::new();
        debug!(scope_id = %id, kind = %kind, baseline = %config.default_flush_mode, "Opened persistence scope");
        Self {
            id,
            kind,
            controller,
            managed: BTreeMap::new(),
            events: SessionEvents::new(),
            rendering: false,
            closed: false,
        }
    }

    /// Scope identity
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Request or conversation
    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// Register a managed persistence context
    ///
    /// Returns the context previously registered under `name`, if any. A
    /// session it had opened leaves the scope; if a temporary override is
    /// pending, that session is first set back to the mode the override saved.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: Arc<dyn SessionFactory>,
    ) -> Option<ManagedPersistenceContext> {
        let name = name.into();
        let previous = self
            .managed
            .insert(name.clone(), ManagedPersistenceContext::new(name.clone(), factory));
        if previous.is_some() {
            let displaced = self.controller.target_mut().untouch(&name);
            if let (Some(session), Some(saved)) = (displaced, self.controller.state().saved()) {
                if let Err(err) = session.set_flush_mode(saved) {
                    warn!(
                        scope_id = %self.id,
                        context = %name,
                        error = %err,
                        "Failed to restore flush mode of replaced session"
                    );
                }
            }
        }
        previous
    }

    /// Subscribe to session-created events of this scope
    pub fn add_listener(&mut self, listener: Arc<dyn SessionListener>) {
        self.events.subscribe(listener);
    }

    /// Session of the managed context `name`, opened on first use
    ///
    /// A newly opened session is announced to listeners, touched, and either
    /// sets the scope's baseline (if the mode was never changed) or is
    /// switched to the scope's current mode.
    ///
    /// Listeners receive `SessionCreated` before the session is enlisted. If
    /// enlisting fails, the session is released again after listeners saw it,
    /// and the next call opens a fresh one.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPersistenceContext` for an unregistered name, the
    /// factory's error, or the propagation error from aligning the session.
    pub fn session(&mut self, name: &str) -> BridgeResult<SessionHandle> {
        let managed = self
            .managed
            .get_mut(name)
            .ok_or_else(|| BridgeError::unknown_context(name))?;

        match managed.session(&self.events)? {
            SessionAccess::Cached(session) => Ok(session),
            SessionAccess::Opened(event) => {
                if let Err(err) = Self::enlist(&mut self.controller, &event) {
                    managed.release();
                    return Err(err);
                }
                Ok(event.session)
            }
        }
    }

    /// Enlist a session the host owns under `name`
    ///
    /// The session is touched and handled like a newly opened one, without
    /// publishing a session-created event.
    ///
    /// # Errors
    ///
    /// Returns the propagation error from aligning the session; the session
    /// is not enlisted then.
    pub fn attach(&mut self, name: impl Into<String>, session: SessionHandle) -> BridgeResult<()> {
        let event = SessionCreated::new(name, session);
        Self::enlist(&mut self.controller, &event)
    }

    fn enlist(
        controller: &mut FlushModeController<PersistenceContexts>,
        event: &SessionCreated,
    ) -> BridgeResult<()> {
        let replaced = controller
            .target_mut()
            .touch(event.context.clone(), Arc::clone(&event.session));
        if let Err(err) = controller.on_session_created(event) {
            let contexts = controller.target_mut();
            match replaced {
                Some(previous) => {
                    contexts.touch(event.context.clone(), previous);
                }
                None => {
                    contexts.untouch(&event.context);
                }
            }
            return Err(err);
        }
        Ok(())
    }

    /// Touched persistence contexts
    pub fn contexts(&self) -> &PersistenceContexts {
        self.controller.target()
    }

    /// The scope's flush-mode controller
    pub fn controller(&self) -> &FlushModeController<PersistenceContexts> {
        &self.controller
    }

    /// Flush mode presented to callers
    pub fn flush_mode(&self) -> FlushModeType {
        self.controller.flush_mode()
    }

    /// True while a temporary override is pending
    pub fn is_overridden(&self) -> bool {
        self.controller.is_overridden()
    }

    /// Permanently change the flush mode of every touched context
    pub fn change_flush_mode(&mut self, mode: FlushModeType) -> BridgeResult<()> {
        self.controller.change_flush_mode(mode)
    }

    /// Change the flush mode, optionally as a temporary override
    pub fn change_flush_mode_with(
        &mut self,
        mode: FlushModeType,
        temporary: bool,
    ) -> BridgeResult<()> {
        self.controller.change_flush_mode_with(mode, temporary)
    }

    /// Undo a pending temporary override
    pub fn restore_flush_mode(&mut self) -> BridgeResult<()> {
        self.controller.restore_flush_mode()
    }

    /// True between `before_render` and `after_render`
    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    /// Render-phase start hook
    pub fn before_render(&mut self) -> BridgeResult<()> {
        if self.rendering {
            warn!(scope_id = %self.id, "before_render called again without after_render");
        }
        self.controller.before_render()?;
        self.rendering = true;
        Ok(())
    }

    /// Render-phase end hook; always restores a pending override
    pub fn after_render(&mut self) -> BridgeResult<()> {
        if !self.rendering {
            debug!(scope_id = %self.id, "after_render called outside a render phase");
        }
        self.rendering = false;
        self.controller.after_render()
    }

    /// Start a render phase that ends when the guard finishes or drops
    ///
    /// # Errors
    ///
    /// Returns the error of `before_render`; no render phase is started then.
    pub fn render_guard(&mut self) -> BridgeResult<RenderGuard<'_>> {
        self.before_render()?;
        Ok(RenderGuard {
            scope: self,
            finished: false,
        })
    }

    /// Run `f` as one render phase
    ///
    /// `after_render` runs however `f` exits. If both `f` and the restore
    /// fail, `f`'s error is returned and the restore error is logged.
    pub fn render<R, F>(&mut self, f: F) -> BridgeResult<R>
    where
        F: FnOnce(&mut PersistenceScope) -> BridgeResult<R>,
    {
        let mut guard = self.render_guard()?;
        let result = f(&mut *guard);
        let restored = guard.finish();
        match result {
            Ok(value) => restored.map(|()| value),
            Err(err) => {
                if let Err(restore_err) = restored {
                    warn!(error = %restore_err, "Flush mode restore failed after render error");
                }
                Err(err)
            }
        }
    }

    /// End the scope
    ///
    /// # Errors
    ///
    /// Returns the error of restoring a pending override. The sessions are
    /// released either way.
    pub fn close(mut self) -> BridgeResult<()> {
        let result = self.controller.restore_flush_mode();
        self.release_sessions();
        self.closed = true;
        debug!(scope_id = %self.id, kind = %self.kind, "Closed persistence scope");
        result
    }

    fn release_sessions(&mut self) {
        self.controller.target_mut().clear();
        for managed in self.managed.values_mut() {
            managed.release();
        }
    }
}

impl Drop for PersistenceScope {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if self.controller.is_overridden() {
            warn!(
                scope_id = %self.id,
                mode = %self.controller.flush_mode(),
                "Scope dropped with a pending flush-mode override, restoring"
            );
            if let Err(e) = self.controller.restore_flush_mode() {
                warn!(scope_id = %self.id, error = %e, "Flush mode restore failed during scope teardown");
            }
        }
        self.release_sessions();
    }
}

impl std::fmt::Debug for PersistenceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceScope")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("controller", &self.controller)
            .field("contexts", self.controller.target())
            .field("managed", &self.managed.keys().collect::<Vec<_>>())
            .field("rendering", &self.rendering)
            .finish()
    }
}

/// One render phase of a [`PersistenceScope`]
///
/// Dereferences to the scope. `finish` ends the phase and reports the
/// restore result; dropping the guard ends it and logs a failed restore.
pub struct RenderGuard<'a> {
    scope: &'a mut PersistenceScope,
    finished: bool,
}

impl RenderGuard<'_> {
    /// End the render phase
    ///
    /// # Errors
    ///
    /// Returns the error of restoring a pending override.
    pub fn finish(mut self) -> BridgeResult<()> {
        self.finished = true;
        self.scope.after_render()
    }
}

impl Deref for RenderGuard<'_> {
    type Target = PersistenceScope;

    fn deref(&self) -> &PersistenceScope {
        self.scope
    }
}

impl DerefMut for RenderGuard<'_> {
    fn deref_mut(&mut self) -> &mut PersistenceScope {
        self.scope
    }
}

impl Drop for RenderGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.scope.after_render() {
                warn!(scope_id = %self.scope.id, error = %e, "Flush mode restore failed at end of render");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::RenderPolicy;
    use bridge_core::PersistenceSession;
    use parking_lot::Mutex;
    use FlushModeType::*;

    struct Session {
        mode: Mutex<FlushModeType>,
        default: FlushModeType,
        closed: Mutex<bool>,
    }

    impl PersistenceSession for Session {
        fn flush_mode(&self) -> FlushModeType {
            *self.mode.lock()
        }
        fn set_flush_mode(&self, mode: FlushModeType) -> BridgeResult<()> {
            if *self.closed.lock() {
                return Err(BridgeError::session_closed("test"));
            }
            *self.mode.lock() = mode;
            Ok(())
        }
        fn default_flush_mode(&self) -> FlushModeType {
            self.default
        }
    }

    fn new_session(default: FlushModeType) -> Arc<Session> {
        Arc::new(Session {
            mode: Mutex::new(default),
            default,
            closed: Mutex::new(false),
        })
    }

    /// Factory handing out one prepared session
    fn factory_for(session: Arc<Session>) -> Arc<dyn SessionFactory> {
        Arc::new(move |_: &str| -> BridgeResult<SessionHandle> { Ok(session.clone()) })
    }

    fn request_scope() -> PersistenceScope {
        PersistenceScope::open(ScopeKind::Request, &BridgeConfig::default())
    }

    #[test]
    fn test_open_uses_config_baseline() {
        let config = BridgeConfig::default().with_default_flush_mode(Commit);
        let scope = PersistenceScope::open(ScopeKind::Conversation, &config);
        assert_eq!(scope.flush_mode(), Commit);
        assert_eq!(scope.kind(), ScopeKind::Conversation);
        assert!(scope.contexts().is_empty());
    }

    #[test]
    fn test_unknown_context() {
        let mut scope = request_scope();
        let err = scope.session("nope").err().unwrap();
        assert_eq!(err, BridgeError::unknown_context("nope"));
    }

    #[test]
    fn test_first_session_sets_baseline() {
        let session = new_session(Commit);
        let mut scope = request_scope();
        scope.register("orders", factory_for(session.clone()));

        scope.session("orders").unwrap();
        assert_eq!(scope.flush_mode(), Commit);
        assert!(scope.contexts().is_touched("orders"));
    }

    #[test]
    fn test_session_opened_after_change_follows_scope_mode() {
        let session = new_session(Auto);
        let mut scope = request_scope();
        scope.register("orders", factory_for(session.clone()));

        scope.change_flush_mode(Manual).unwrap();
        scope.session("orders").unwrap();
        assert_eq!(session.flush_mode(), Manual);
    }

    #[test]
    fn test_listener_sees_event_before_caller() {
        let session = new_session(Auto);
        let mut scope = request_scope();
        scope.register("orders", factory_for(session));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        scope.add_listener(Arc::new(move |e: &SessionCreated| {
            sink.lock().push(e.context.clone())
        }));

        scope.session("orders").unwrap();
        scope.session("orders").unwrap();
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_change_reaches_touched_sessions() {
        let a = new_session(Auto);
        let b = new_session(Auto);
        let mut scope = request_scope();
        scope.attach("a", a.clone()).unwrap();
        scope.attach("b", b.clone()).unwrap();

        scope.change_flush_mode_with(Manual, true).unwrap();
        assert_eq!(a.flush_mode(), Manual);
        assert_eq!(b.flush_mode(), Manual);

        scope.after_render().unwrap();
        assert_eq!(a.flush_mode(), Auto);
        assert_eq!(b.flush_mode(), Auto);
    }

    #[test]
    fn test_render_restores_on_success() {
        let mut scope = request_scope();
        let value = scope
            .render(|s| {
                assert!(s.is_rendering());
                s.change_flush_mode_with(Manual, true)?;
                Ok(7)
            })
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(scope.flush_mode(), Auto);
        assert!(!scope.is_rendering());
    }

    #[test]
    fn test_render_restores_on_error() {
        let mut scope = request_scope();
        let err = scope
            .render(|s| -> BridgeResult<()> {
                s.change_flush_mode_with(Manual, true)?;
                Err(BridgeError::propagation("render failed"))
            })
            .unwrap_err();
        assert_eq!(err, BridgeError::propagation("render failed"));
        assert_eq!(scope.flush_mode(), Auto);
        assert!(!scope.is_overridden());
    }

    #[test]
    fn test_render_guard_restores_on_drop() {
        let mut scope = request_scope();
        {
            let mut guard = scope.render_guard().unwrap();
            guard.change_flush_mode_with(Commit, true).unwrap();
            assert_eq!(guard.flush_mode(), Commit);
        }
        assert_eq!(scope.flush_mode(), Auto);
        assert!(!scope.is_rendering());
    }

    #[test]
    fn test_manual_during_render_policy() {
        let config = BridgeConfig::default().with_render_policy(RenderPolicy::ManualDuringRender);
        let mut scope = PersistenceScope::open(ScopeKind::Request, &config);
        let session = new_session(Auto);
        scope.attach("orders", session.clone()).unwrap();

        scope
            .render(|s| {
                assert_eq!(s.flush_mode(), Manual);
                Ok(())
            })
            .unwrap();
        assert_eq!(session.flush_mode(), Auto);
    }

    #[test]
    fn test_failed_attach_is_not_enlisted() {
        let open = new_session(Auto);
        let closed = new_session(Auto);
        *closed.closed.lock() = true;

        let mut scope = request_scope();
        scope.attach("open", open).unwrap();
        scope.change_flush_mode(Commit).unwrap();

        assert!(scope.attach("closed", closed).is_err());
        assert!(!scope.contexts().is_touched("closed"));
        assert_eq!(scope.flush_mode(), Commit);
    }

    #[test]
    fn test_close_restores_pending_override() {
        let session = new_session(Auto);
        let mut scope = request_scope();
        scope.attach("orders", session.clone()).unwrap();
        scope.change_flush_mode_with(Manual, true).unwrap();

        scope.close().unwrap();
        assert_eq!(session.flush_mode(), Auto);
    }

    #[test]
    fn test_drop_restores_pending_override() {
        let session = new_session(Auto);
        {
            let mut scope = request_scope();
            scope.attach("orders", session.clone()).unwrap();
            scope.change_flush_mode_with(Manual, true).unwrap();
        }
        assert_eq!(session.flush_mode(), Auto);
    }

    #[test]
    fn test_reregister_restores_replaced_session() {
        let replaced = new_session(Auto);
        let replacement = new_session(Auto);
        let mut scope = request_scope();
        scope.register("orders", factory_for(replaced.clone()));
        scope.session("orders").unwrap();

        scope.change_flush_mode_with(Manual, true).unwrap();
        assert_eq!(replaced.flush_mode(), Manual);

        assert!(scope
            .register("orders", factory_for(replacement.clone()))
            .is_some());
        assert_eq!(replaced.flush_mode(), Auto);
        assert!(!scope.contexts().is_touched("orders"));

        // The replacement joins the pending override and is restored with it
        scope.session("orders").unwrap();
        assert_eq!(replacement.flush_mode(), Manual);
        scope.after_render().unwrap();
        assert_eq!(replacement.flush_mode(), Auto);
        assert_eq!(replaced.flush_mode(), Auto);
    }

    #[test]
    fn test_reregister_keeps_permanent_mode() {
        let replaced = new_session(Auto);
        let mut scope = request_scope();
        scope.register("orders", factory_for(replaced.clone()));
        scope.session("orders").unwrap();
        scope.change_flush_mode(Commit).unwrap();

        scope.register("orders", factory_for(new_session(Auto)));
        assert_eq!(replaced.flush_mode(), Commit);
    }

    #[test]
    fn test_failed_enlist_releases_announced_session() {
        let session = new_session(Auto);
        *session.closed.lock() = true;
        let mut scope = request_scope();
        scope.register("orders", factory_for(session.clone()));
        scope.change_flush_mode(Manual).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        scope.add_listener(Arc::new(move |e: &SessionCreated| {
            sink.lock().push(e.context.clone())
        }));

        assert!(scope.session("orders").is_err());
        assert_eq!(*seen.lock(), vec!["orders"]);
        assert!(!scope.contexts().is_touched("orders"));
        assert!(scope.managed["orders"].current().is_none());

        // Next use opens and announces again
        *session.closed.lock() = false;
        scope.session("orders").unwrap();
        assert_eq!(seen.lock().len(), 2);
        assert_eq!(session.flush_mode(), Manual);
    }
}
