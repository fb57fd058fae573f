//! Composition root — builds and wires the session core.
//!
//! DESIGN
//! ======
//! `App::new` constructs every component explicitly and passes shared pieces
//! down by `Arc`: the holder owns the session, the guard observes the holder,
//! and the forms talk to the store. Nothing is global, so tests can build as
//! many independent apps as they like.
//!
//! `App::start` performs the single subscription and hands back a
//! `RunningApp`, which owns the subscription for the rest of its life.
//! Dropping or shutting down the `RunningApp` releases it on every path.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::credential::CredentialStore;
use crate::error::ErrorCode;
use crate::forms::{ForgotPasswordForm, SignInForm, SignOutAction, SignUpForm};
use crate::navigation::{NavigationError, NavigationGuard, Root, Router};
use crate::session::{Session, SessionHolder, SessionSubscription};

/// Unrecoverable failure of the running app.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FatalError {
    #[error("session notification channel failed: {0}")]
    SessionChannel(String),
    #[error("navigation failed: {0}")]
    Navigation(#[from] NavigationError),
}

impl ErrorCode for FatalError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::SessionChannel(_) => "E_SESSION_CHANNEL",
            Self::Navigation(_) => "E_NAVIGATION",
        }
    }
}

pub struct App {
    store: Arc<dyn CredentialStore>,
    holder: SessionHolder,
    guard: NavigationGuard,
    sign_in: SignInForm,
    sign_up: SignUpForm,
    sign_out: SignOutAction,
    forgot_password: ForgotPasswordForm,
}

impl App {
    #[must_use]
    pub fn new(config: &AppConfig, store: Arc<dyn CredentialStore>, router: Arc<dyn Router>) -> Self {
        let holder = SessionHolder::new();
        let guard = NavigationGuard::new(router, config.settle_delay);
        holder.observe(Arc::new(guard.clone()));

        let timeout = config.credential_timeout;
        Self {
            sign_in: SignInForm::new(Arc::clone(&store), timeout),
            sign_up: SignUpForm::new(Arc::clone(&store), timeout),
            sign_out: SignOutAction::new(Arc::clone(&store), guard.clone(), timeout),
            forgot_password: ForgotPasswordForm::new(Arc::clone(&store), timeout),
            store,
            holder,
            guard,
        }
    }

    /// Subscribe the session holder and start reacting to the provider.
    #[must_use]
    pub fn start(self) -> RunningApp {
        let subscription = self.holder.subscribe(self.store.as_ref());
        info!("session core started");
        RunningApp { app: self, subscription: Some(subscription) }
    }
}

pub struct RunningApp {
    app: App,
    subscription: Option<SessionSubscription>,
}

impl RunningApp {
    /// Read-only session handle for screens.
    #[must_use]
    pub fn session(&self) -> &SessionHolder {
        &self.app.holder
    }

    #[must_use]
    pub fn guard(&self) -> &NavigationGuard {
        &self.app.guard
    }

    #[must_use]
    pub fn active_root(&self) -> Root {
        self.app.guard.active_root()
    }

    #[must_use]
    pub fn sign_in(&self) -> &SignInForm {
        &self.app.sign_in
    }

    #[must_use]
    pub fn sign_up(&self) -> &SignUpForm {
        &self.app.sign_up
    }

    #[must_use]
    pub fn sign_out(&self) -> &SignOutAction {
        &self.app.sign_out
    }

    #[must_use]
    pub fn forgot_password(&self) -> &ForgotPasswordForm {
        &self.app.forgot_password
    }

    /// Wait for the first provider notification.
    pub async fn wait_until_resolved(&self) -> Session {
        self.app.holder.resolved().await
    }

    /// Resolve with the first fatal failure reported by the notification
    /// channel or the navigation guard. Pending forever if none occurs.
    pub async fn fatal(&self) -> FatalError {
        let mut channel = self.app.holder.fatal();
        let mut navigation = self.app.guard.fatal();
        let err = tokio::select! {
            reason = wait_for(&mut channel) => FatalError::SessionChannel(reason),
            err = wait_for(&mut navigation) => FatalError::Navigation(err),
        };
        error!(code = err.error_code(), error = %err, "fatal failure");
        err
    }

    /// Release the subscription. No further session changes are applied.
    pub fn shutdown(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.release();
            info!("session core stopped");
        }
    }
}

/// Wait until `rx` holds a value. A closed channel never will.
async fn wait_for<T: Clone>(rx: &mut watch::Receiver<Option<T>>) -> T {
    let value = match rx.wait_for(Option::is_some).await {
        Ok(current) => current.clone(),
        Err(_) => None,
    };
    match value {
        Some(value) => value,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "app_test.rs"]
mod tests;
