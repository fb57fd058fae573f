//! Sign-in form.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{BusyFlag, FormError, INVALID_EMAIL_SIGN_IN, MIN_SECRET_LEN, SECRET_TOO_SHORT, normalize_email, with_timeout};
use crate::credential::CredentialStore;
use crate::error::ErrorCode;
use crate::session::Identity;

pub struct SignInForm {
    store: Arc<dyn CredentialStore>,
    timeout: Duration,
    busy: BusyFlag,
}

impl SignInForm {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, timeout: Duration) -> Self {
        Self { store, timeout, busy: BusyFlag::default() }
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    /// Authenticate with `email` and `secret`.
    ///
    /// Performs no navigation. The resulting session change reaches the
    /// guard through the session holder.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a malformed email or short secret (checked before
    /// any provider call), `InvalidCredentials`, `RateLimited`, `Unknown`, or
    /// `Busy` while a previous submission is outstanding.
    pub async fn submit(&self, email: &str, secret: &str) -> Result<Identity, FormError> {
        let _busy = self.busy.acquire()?;

        let email = normalize_email(email).ok_or(FormError::InvalidInput(INVALID_EMAIL_SIGN_IN))?;
        if secret.trim().chars().count() < MIN_SECRET_LEN {
            return Err(FormError::InvalidInput(SECRET_TOO_SHORT));
        }

        debug!(%email, "signing in");
        match with_timeout(self.timeout, self.store.authenticate(&email, secret)).await {
            Ok(identity) => {
                info!(uid = %identity.uid, "sign-in succeeded");
                Ok(identity)
            }
            Err(e) => {
                let err = FormError::from_sign_in(e);
                warn!(code = err.error_code(), error = %err, "sign-in failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "sign_in_test.rs"]
mod tests;
