//! Navigation — which root screen is active, derived from the session.
//!
//! DESIGN
//! ======
//! Three roots exist: the waiting screen shown while the session is still
//! unknown, the sign-in flow, and the main application. `Root::for_session`
//! is the whole navigation decision. `NavigationGuard` applies it through a
//! `Router`, and `RouteTable` is the router shipped with the crate.

pub mod guard;
pub mod routes;

use std::fmt;

pub use guard::NavigationGuard;
pub use routes::RouteTable;

use crate::session::Session;

/// Top-level screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Root {
    Waiting,
    SignIn,
    Main,
}

impl Root {
    /// The root a session calls for. Unresolved sessions always wait.
    #[must_use]
    pub fn for_session(session: &Session) -> Self {
        if !session.is_resolved() {
            Self::Waiting
        } else if session.is_authenticated() {
            Self::Main
        } else {
            Self::SignIn
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::SignIn => "sign-in",
            Self::Main => "main",
        }
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("no route registered for root {0}")]
    UnknownRoute(Root),
    #[error("no screen at path {0}")]
    UnknownPath(String),
}

/// Something that can make a root the only entry in navigation history.
pub trait Router: Send + Sync {
    /// Activate `root`, discarding history.
    ///
    /// # Errors
    ///
    /// Fails when `root` has no registered screen.
    fn replace(&self, root: Root) -> Result<(), NavigationError>;
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
