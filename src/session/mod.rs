//! Session model — who is signed in, and whether that is known yet.
//!
//! DESIGN
//! ======
//! A `Session` starts `Initializing` with no identity and flips to `Resolved`
//! on the first provider notification. The flip happens once and never
//! reverts. Fields are private: only the holder's subscription callback may
//! mutate a session, everyone else works with cloned snapshots.

pub mod holder;

pub use holder::{SessionHolder, SessionObserver, SessionSubscription};

use serde::{Deserialize, Serialize};

// =============================================================================
// IDENTITY
// =============================================================================

/// Opaque reference to an authenticated principal, as issued by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider-assigned unique id.
    pub uid: String,
    /// Email the account was registered with.
    pub email: String,
    /// Display name attached after sign-up, if any.
    pub display_name: Option<String>,
}

impl Identity {
    #[must_use]
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self { uid: uid.into(), email: email.into(), display_name: None }
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Certainty of the session: unknown at startup, known afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Resolved,
}

/// Snapshot of the authentication fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    identity: Option<Identity>,
    phase: Phase,
}

impl Session {
    /// The cold-start session: unresolved, nobody signed in.
    #[must_use]
    pub fn initializing() -> Self {
        Self { identity: None, phase: Phase::Initializing }
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.phase == Phase::Resolved
    }

    /// True only once resolved with an identity present. An initializing
    /// session is never considered authenticated.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.is_resolved() && self.identity.is_some()
    }

    /// Apply one provider notification. Returns `true` when this call moved
    /// the session out of `Initializing`.
    pub(crate) fn apply(&mut self, identity: Option<Identity>) -> bool {
        self.identity = identity;
        if self.phase == Phase::Initializing {
            self.phase = Phase::Resolved;
            return true;
        }
        false
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::initializing()
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
