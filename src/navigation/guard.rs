//! Navigation guard — keeps the active root in line with the session.
//!
//! DESIGN
//! ======
//! The guard observes session snapshots synchronously. Snapshots taken while
//! the session is initializing are ignored, so the waiting root stays up.
//! Every resolved snapshot records its decision as `latest` and bumps a
//! generation counter. The transition itself is deferred by a short settle
//! delay; a newer snapshot aborts the pending task, and a task that wakes up
//! under a stale generation does nothing. When the delay fires, only the
//! latest decision is applied.
//!
//! Sign-out calls `navigate_signed_out` directly as well. It can only target
//! the sign-in root, which is the decision any signed-out session yields.
//! Both paths go through `transition`, which is a no-op when the target is
//! already active, so the redundant producer never causes a second
//! transition.
//!
//! TRADE-OFFS
//! ==========
//! A router failure is a broken route table. It is logged, published on the
//! `fatal` watch channel, and never retried. The active root stays where it
//! was.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{NavigationError, Root, Router};
use crate::session::{Phase, Session, SessionObserver};

struct GuardState {
    active: Root,
    phase: Phase,
    latest: Root,
    generation: u64,
    pending: Option<JoinHandle<()>>,
    transitions: usize,
}

struct GuardInner {
    router: Arc<dyn Router>,
    settle: Duration,
    state: Mutex<GuardState>,
    fatal: watch::Sender<Option<NavigationError>>,
}

impl GuardInner {
    fn lock(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deferred transition body. Stale generations were superseded.
    fn fire(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation {
            debug!(generation, current = state.generation, "stale navigation timer ignored");
            return;
        }
        state.pending = None;
        let target = state.latest;
        self.transition(&mut state, target);
    }

    fn transition(&self, state: &mut GuardState, target: Root) {
        if state.active == target {
            debug!(root = %target, "already at target root; transition skipped");
            return;
        }
        match self.router.replace(target) {
            Ok(()) => {
                info!(from = %state.active, to = %target, "navigated");
                state.active = target;
                state.transitions += 1;
            }
            Err(e) => {
                error!(error = %e, root = %target, "navigation failed; route table is broken");
                self.fatal.send_replace(Some(e));
            }
        }
    }

    fn cancel_pending(state: &mut GuardState) {
        if let Some(pending) = state.pending.take() {
            pending.abort();
            debug!("pending navigation superseded");
        }
    }
}

/// Applies navigation decisions to a [`Router`]. Cloning shares state.
#[derive(Clone)]
pub struct NavigationGuard {
    inner: Arc<GuardInner>,
}

impl NavigationGuard {
    /// Guard over `router`, which is assumed to start on the waiting root.
    /// A zero `settle` delay applies transitions inline.
    #[must_use]
    pub fn new(router: Arc<dyn Router>, settle: Duration) -> Self {
        let (fatal, _) = watch::channel(None);
        Self {
            inner: Arc::new(GuardInner {
                router,
                settle,
                state: Mutex::new(GuardState {
                    active: Root::Waiting,
                    phase: Phase::Initializing,
                    latest: Root::Waiting,
                    generation: 0,
                    pending: None,
                    transitions: 0,
                }),
                fatal,
            }),
        }
    }

    /// Activate the sign-in root right away after the session was ended,
    /// cancelling any deferred transition.
    ///
    /// Refused while the session is initializing: nothing may leave the
    /// waiting root before the session is known.
    pub fn navigate_signed_out(&self) {
        let root = Root::SignIn;
        let mut state = self.inner.lock();
        if state.phase == Phase::Initializing {
            warn!(%root, "direct navigation refused while session is initializing");
            return;
        }
        GuardInner::cancel_pending(&mut state);
        state.generation += 1;
        state.latest = root;
        self.inner.transition(&mut state, root);
    }

    #[must_use]
    pub fn active_root(&self) -> Root {
        self.inner.lock().active
    }

    /// Number of transitions actually performed.
    #[must_use]
    pub fn transitions(&self) -> usize {
        self.inner.lock().transitions
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.inner.lock().pending.as_ref().is_some_and(|p| !p.is_finished())
    }

    /// Set once a router failure has been observed.
    #[must_use]
    pub fn fatal(&self) -> watch::Receiver<Option<NavigationError>> {
        self.inner.fatal.subscribe()
    }

    fn schedule(&self, state: &mut GuardState, target: Root) {
        if self.inner.settle.is_zero() {
            self.inner.transition(state, target);
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.inner.transition(state, target);
            return;
        };

        let weak: Weak<GuardInner> = Arc::downgrade(&self.inner);
        let generation = state.generation;
        let settle = self.inner.settle;
        state.pending = Some(runtime.spawn(async move {
            tokio::time::sleep(settle).await;
            if let Some(inner) = weak.upgrade() {
                inner.fire(generation);
            }
        }));
        debug!(%target, generation, ?settle, "navigation scheduled");
    }
}

impl SessionObserver for NavigationGuard {
    fn on_session(&self, session: &Session) {
        if !session.is_resolved() {
            debug!("session initializing; staying on waiting root");
            return;
        }
        let target = Root::for_session(session);
        let mut state = self.inner.lock();
        state.phase = Phase::Resolved;
        state.latest = target;
        state.generation += 1;
        GuardInner::cancel_pending(&mut state);
        self.schedule(&mut state, target);
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
