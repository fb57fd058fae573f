//! Password reset form.
//!
//! An unknown address is reported exactly like a sent message, so the form
//! cannot be used to discover which emails have accounts.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{BusyFlag, FormError, INVALID_EMAIL, normalize_email, with_timeout};
use crate::credential::{CredentialStore, codes};
use crate::error::ErrorCode;

/// Confirmation shown after a successful submission.
pub const RESET_SENT_MESSAGE: &str = "Password reset email sent. Check your inbox.";

pub struct ForgotPasswordForm {
    store: Arc<dyn CredentialStore>,
    timeout: Duration,
    busy: BusyFlag,
}

impl ForgotPasswordForm {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, timeout: Duration) -> Self {
        Self { store, timeout, busy: BusyFlag::default() }
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    /// Ask the provider to send a reset message to `email`. Does not touch
    /// the session.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a malformed email, `Unknown` for provider failures
    /// other than an unknown address, `Busy` while a previous submission is
    /// outstanding.
    pub async fn submit(&self, email: &str) -> Result<(), FormError> {
        let _busy = self.busy.acquire()?;

        let email = normalize_email(email).ok_or(FormError::InvalidInput(INVALID_EMAIL))?;
        match with_timeout(self.timeout, self.store.request_credential_reset(&email)).await {
            Ok(()) => {
                info!("reset message requested");
                Ok(())
            }
            Err(e) if e.is(codes::EMAIL_NOT_FOUND) || e.is(codes::USER_NOT_FOUND) => {
                debug!(%email, "reset requested for unknown address; reporting success");
                Ok(())
            }
            Err(e) => {
                let err = FormError::unknown(e);
                warn!(code = err.error_code(), error = %err, "reset request failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "forgot_password_test.rs"]
mod tests;
