//! Session holder — the single writer of session state.
//!
//! DESIGN
//! ======
//! One holder per composition root. It registers exactly one listener with
//! the credential store and applies each notification to its `Session`.
//! Every change is published synchronously, inside the notification
//! callback, first to registered observers (the navigation guard) and then
//! to a broadcast channel for any other screen that wants ordered updates.
//!
//! A dying notification channel cannot be recovered here. It is logged,
//! recorded on the `fatal` watch channel, and the last known session is kept
//! as-is.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use super::Session;
use crate::credential::{CredentialStore, ListenerHandle, SessionEvent, SessionListener};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Synchronous consumer of session snapshots.
pub trait SessionObserver: Send + Sync {
    fn on_session(&self, session: &Session);
}

struct HolderInner {
    session: Mutex<Session>,
    observers: Mutex<Vec<Arc<dyn SessionObserver>>>,
    changes: broadcast::Sender<Session>,
    fatal: watch::Sender<Option<String>>,
    subscribed: AtomicBool,
}

impl HolderInner {
    fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Changed(identity) => self.apply(identity),
            SessionEvent::ChannelFailed(reason) => {
                let last = self.session.lock().unwrap_or_else(PoisonError::into_inner).clone();
                error!(
                    reason = %reason,
                    resolved = last.is_resolved(),
                    authenticated = last.is_authenticated(),
                    "session channel failed; keeping last known session"
                );
                self.fatal.send_replace(Some(reason));
            }
        }
    }

    fn apply(&self, identity: Option<crate::session::Identity>) {
        let (snapshot, resolved_now) = {
            let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
            let resolved_now = session.apply(identity);
            (session.clone(), resolved_now)
        };

        match (resolved_now, snapshot.identity()) {
            (true, Some(identity)) => info!(uid = %identity.uid, "session resolved with restored identity"),
            (true, None) => info!("session resolved without identity"),
            (false, Some(identity)) => info!(uid = %identity.uid, "session identity active"),
            (false, None) => info!("session ended"),
        }

        let observers: Vec<Arc<dyn SessionObserver>> =
            self.observers.lock().unwrap_or_else(PoisonError::into_inner).iter().map(Arc::clone).collect();
        for observer in observers {
            observer.on_session(&snapshot);
        }
        // No receivers is fine; broadcast only errors in that case.
        let _ = self.changes.send(snapshot);
    }
}

/// Owner of the authoritative [`Session`]. Cloning shares the same state.
#[derive(Clone)]
pub struct SessionHolder {
    inner: Arc<HolderInner>,
}

impl SessionHolder {
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let (fatal, _) = watch::channel(None);
        Self {
            inner: Arc::new(HolderInner {
                session: Mutex::new(Session::initializing()),
                observers: Mutex::new(Vec::new()),
                changes,
                fatal,
                subscribed: AtomicBool::new(false),
            }),
        }
    }

    /// Register the holder's single listener with `store`.
    ///
    /// Meant to be called once at startup. While a subscription is alive, a
    /// second call logs a warning and returns an inert subscription. Dropping
    /// the returned value releases the listener.
    pub fn subscribe(&self, store: &dyn CredentialStore) -> SessionSubscription {
        if self.inner.subscribed.swap(true, Ordering::SeqCst) {
            warn!("session holder already subscribed; ignoring second subscription");
            return SessionSubscription { handle: None, holder: Weak::new() };
        }

        let weak = Arc::downgrade(&self.inner);
        let listener: SessionListener = Arc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_event(event);
            }
        });
        debug!("subscribing to session changes");
        let handle = store.on_session_change(listener);
        SessionSubscription { handle: Some(handle), holder: Arc::downgrade(&self.inner) }
    }

    /// Add a synchronous observer. It immediately receives the current
    /// snapshot, then every subsequent one.
    ///
    /// The session lock is held while the observer is registered and primed,
    /// so a concurrent change is either included in the priming snapshot or
    /// delivered after it. `on_session` must not call back into the holder.
    pub fn observe(&self, observer: Arc<dyn SessionObserver>) {
        let session = self.inner.session.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.observers.lock().unwrap_or_else(PoisonError::into_inner).push(Arc::clone(&observer));
        observer.on_session(&session);
    }

    /// Current session, cloned.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.inner.session.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Ordered stream of every published snapshot from now on.
    #[must_use]
    pub fn changes(&self) -> broadcast::Receiver<Session> {
        self.inner.changes.subscribe()
    }

    /// Set to `Some(reason)` once the notification channel has failed.
    #[must_use]
    pub fn fatal(&self) -> watch::Receiver<Option<String>> {
        self.inner.fatal.subscribe()
    }

    /// Wait until the first notification has resolved the session.
    pub async fn resolved(&self) -> Session {
        let mut changes = self.changes();
        loop {
            let current = self.snapshot();
            if current.is_resolved() {
                return current;
            }
            match changes.recv().await {
                Ok(session) if session.is_resolved() => return session,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return self.snapshot(),
            }
        }
    }
}

impl Default for SessionHolder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Teardown handle for [`SessionHolder::subscribe`]. Releasing it (or
/// dropping it) unregisters the store listener and lets the holder subscribe
/// again.
#[must_use = "dropping the subscription stops session updates"]
pub struct SessionSubscription {
    handle: Option<ListenerHandle>,
    holder: Weak<HolderInner>,
}

impl SessionSubscription {
    pub fn release(self) {}

    /// Whether this subscription holds a live store listener.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(ListenerHandle::is_active)
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            drop(handle);
            if let Some(inner) = self.holder.upgrade() {
                inner.subscribed.store(false, Ordering::SeqCst);
            }
            debug!("session subscription released");
        }
    }
}

#[cfg(test)]
#[path = "holder_test.rs"]
mod tests;
