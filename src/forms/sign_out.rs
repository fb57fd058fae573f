//! Sign-out action.
//!
//! After the provider confirms, the action navigates to the sign-in root
//! directly instead of waiting for the notification round trip. The guard
//! collapses this with the notification-driven transition, so whichever
//! lands first wins and the other is a no-op.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::{BusyFlag, FormError, with_timeout};
use crate::credential::CredentialStore;
use crate::error::ErrorCode;
use crate::navigation::NavigationGuard;

pub struct SignOutAction {
    store: Arc<dyn CredentialStore>,
    guard: NavigationGuard,
    timeout: Duration,
    busy: BusyFlag,
}

impl SignOutAction {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, guard: NavigationGuard, timeout: Duration) -> Self {
        Self { store, guard, timeout, busy: BusyFlag::default() }
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    /// End the session and show the sign-in root.
    ///
    /// # Errors
    ///
    /// `Unknown` when the provider fails (no navigation happens then), or
    /// `Busy` while a previous call is outstanding.
    pub async fn submit(&self) -> Result<(), FormError> {
        let _busy = self.busy.acquire()?;

        if let Err(e) = with_timeout(self.timeout, self.store.invalidate_session()).await {
            let err = FormError::unknown(e);
            warn!(code = err.error_code(), error = %err, "sign-out failed");
            return Err(err);
        }
        info!("signed out");
        self.guard.navigate_signed_out();
        Ok(())
    }
}

#[cfg(test)]
#[path = "sign_out_test.rs"]
mod tests;
