//! Sign-up form.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{
    BusyFlag, FormError, INVALID_EMAIL, MIN_SECRET_LEN, NAME_REQUIRED, SECRET_TOO_SHORT, SECRETS_DIFFER,
    normalize_email, with_timeout,
};
use crate::credential::{CredentialStore, ProfileUpdate, ProviderError};
use crate::error::ErrorCode;
use crate::session::Identity;

pub struct SignUpForm {
    store: Arc<dyn CredentialStore>,
    timeout: Duration,
    busy: BusyFlag,
}

impl SignUpForm {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, timeout: Duration) -> Self {
        Self { store, timeout, busy: BusyFlag::default() }
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    /// Create an account, then attach `name` as its display name.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty name, malformed email, short secret, or
    /// mismatched confirmation, all checked in that order before any provider
    /// call. Any provider failure is `Unknown`. `Busy` while a previous
    /// submission is outstanding.
    pub async fn submit(&self, name: &str, email: &str, secret: &str, confirm: &str) -> Result<Identity, FormError> {
        let _busy = self.busy.acquire()?;

        let name = name.trim();
        if name.is_empty() {
            return Err(FormError::InvalidInput(NAME_REQUIRED));
        }
        let email = normalize_email(email).ok_or(FormError::InvalidInput(INVALID_EMAIL))?;
        if secret.chars().count() < MIN_SECRET_LEN {
            return Err(FormError::InvalidInput(SECRET_TOO_SHORT));
        }
        if secret != confirm {
            return Err(FormError::InvalidInput(SECRETS_DIFFER));
        }

        debug!(%email, "creating account");
        let result: Result<Identity, ProviderError> = async {
            let identity = with_timeout(self.timeout, self.store.create_account(&email, secret)).await?;
            let update = ProfileUpdate { display_name: Some(name.to_owned()) };
            with_timeout(self.timeout, self.store.update_identity_profile(&identity, update)).await
        }
        .await;

        match result {
            Ok(identity) => {
                info!(uid = %identity.uid, "sign-up succeeded");
                Ok(identity)
            }
            Err(e) => {
                let err = FormError::unknown(e);
                warn!(code = err.error_code(), error = %err, "sign-up failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "sign_up_test.rs"]
mod tests;
