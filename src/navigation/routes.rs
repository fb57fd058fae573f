//! In-process route table.
//!
//! Holds one path per root plus a history stack. `replace` is what the guard
//! uses; `push` and `back` serve in-flow links such as sign-in to sign-up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use super::{NavigationError, Root, Router};

pub const WAITING_PATH: &str = "/";
pub const SIGN_IN_PATH: &str = "/signin";
pub const MAIN_PATH: &str = "/(tabs)/home";
pub const SIGN_UP_PATH: &str = "/signup";
pub const FORGOT_PASSWORD_PATH: &str = "/forgot-password";
pub const SIGN_OUT_PATH: &str = "/signout";

const FLOW_PATHS: [&str; 3] = [SIGN_UP_PATH, FORGOT_PASSWORD_PATH, SIGN_OUT_PATH];

pub struct RouteTable {
    routes: HashMap<Root, String>,
    stack: Mutex<Vec<String>>,
    transitions: AtomicUsize,
}

impl RouteTable {
    /// Table with every root registered, starting on the waiting screen.
    #[must_use]
    pub fn new() -> Self {
        Self::empty()
            .with_route(Root::Waiting, WAITING_PATH)
            .with_route(Root::SignIn, SIGN_IN_PATH)
            .with_route(Root::Main, MAIN_PATH)
    }

    /// Table with no roots registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            routes: HashMap::new(),
            stack: Mutex::new(vec![WAITING_PATH.to_owned()]),
            transitions: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_route(mut self, root: Root, path: &str) -> Self {
        self.routes.insert(root, path.to_owned());
        self
    }

    fn stack(&self) -> MutexGuard<'_, Vec<String>> {
        self.stack.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn current_path(&self) -> String {
        self.stack().last().cloned().unwrap_or_else(|| WAITING_PATH.to_owned())
    }

    /// The root whose path is at the bottom of the history stack.
    #[must_use]
    pub fn active_root(&self) -> Option<Root> {
        let stack = self.stack();
        let base = stack.first()?;
        self.routes.iter().find(|(_, path)| path.as_str() == base.as_str()).map(|(root, _)| *root)
    }

    /// Open an in-flow screen on top of the current one.
    ///
    /// # Errors
    ///
    /// Returns [`NavigationError::UnknownPath`] for paths that are neither a
    /// registered root nor a known flow screen.
    pub fn push(&self, path: &str) -> Result<(), NavigationError> {
        let known = FLOW_PATHS.contains(&path) || self.routes.values().any(|p| p == path);
        if !known {
            return Err(NavigationError::UnknownPath(path.to_owned()));
        }
        let mut stack = self.stack();
        stack.push(path.to_owned());
        debug!(path, depth = stack.len(), "screen pushed");
        Ok(())
    }

    /// Pop the top screen. Returns `false` when there is nothing to go back to.
    pub fn back(&self) -> bool {
        let mut stack = self.stack();
        if stack.len() < 2 {
            return false;
        }
        stack.pop();
        true
    }

    #[must_use]
    pub fn can_go_back(&self) -> bool {
        self.stack().len() > 1
    }

    /// Number of successful `replace` calls.
    #[must_use]
    pub fn transitions(&self) -> usize {
        self.transitions.load(Ordering::SeqCst)
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Router for RouteTable {
    fn replace(&self, root: Root) -> Result<(), NavigationError> {
        let path = self.routes.get(&root).ok_or(NavigationError::UnknownRoute(root))?;
        let mut stack = self.stack();
        stack.clear();
        stack.push(path.clone());
        self.transitions.fetch_add(1, Ordering::SeqCst);
        info!(%root, path = %path, "root replaced");
        Ok(())
    }
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
