//! Ordered listener registry shared by the store implementations.
//!
//! A listener is registered "unprimed": it receives nothing until the store
//! primes it with the restored session. After that it receives every
//! broadcast in order. Stores call `broadcast` while holding their own state
//! lock, which makes the store the single serialization point for delivery.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::debug;

use super::{SessionEvent, SessionListener};
use crate::session::Identity;

struct Entry {
    id: u64,
    listener: SessionListener,
    primed: bool,
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    entries: Vec<Entry>,
    failed: Option<String>,
}

#[derive(Clone, Default)]
pub(crate) struct ListenerRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a listener. It stays silent until [`ListenerRegistry::prime`].
    pub(crate) fn register(&self, listener: SessionListener) -> (u64, ListenerHandle) {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push(Entry { id, listener, primed: false });
        debug!(listener_id = id, total = inner.entries.len(), "session listener registered");
        (id, ListenerHandle { id, registry: Arc::downgrade(&self.inner) })
    }

    /// Deliver the initial state to listener `id` and start regular delivery.
    /// A listener registered after the channel died gets the failure instead.
    pub(crate) fn prime(&self, id: u64, current: Option<Identity>) {
        let (listener, event) = {
            let mut inner = self.lock();
            let failed = inner.failed.clone();
            let Some(entry) = inner.entries.iter_mut().find(|e| e.id == id && !e.primed) else {
                return;
            };
            entry.primed = true;
            let event = match failed {
                Some(reason) => SessionEvent::ChannelFailed(reason),
                None => SessionEvent::Changed(current),
            };
            (Arc::clone(&entry.listener), event)
        };
        listener(event);
    }

    /// Deliver `event` to every primed listener, in registration order.
    /// Nothing is delivered once the channel has failed.
    pub(crate) fn broadcast(&self, event: &SessionEvent) {
        let listeners: Vec<SessionListener> = {
            let mut inner = self.lock();
            if inner.failed.is_some() {
                return;
            }
            if let SessionEvent::ChannelFailed(reason) = event {
                inner.failed = Some(reason.clone());
            }
            inner.entries.iter().filter(|e| e.primed).map(|e| Arc::clone(&e.listener)).collect()
        };
        for listener in listeners {
            listener(event.clone());
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Registration handle returned by `CredentialStore::on_session_change`.
/// The listener is removed when the handle is dropped or released.
#[must_use = "dropping the handle unregisters the listener"]
pub struct ListenerHandle {
    id: u64,
    registry: Weak<Mutex<RegistryInner>>,
}

impl ListenerHandle {
    /// Unregister now. Equivalent to dropping the handle.
    pub fn release(self) {}

    /// Whether the listener is still registered with a live store.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registry.upgrade().is_some_and(|inner| {
            inner.lock().unwrap_or_else(PoisonError::into_inner).entries.iter().any(|e| e.id == self.id)
        })
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.entries.retain(|e| e.id != self.id);
            debug!(listener_id = self.id, remaining = inner.entries.len(), "session listener released");
        }
    }
}

#[cfg(test)]
#[path = "listeners_test.rs"]
mod tests;
