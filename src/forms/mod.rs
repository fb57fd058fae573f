//! Credential action forms — sign-in, sign-up, sign-out, password reset.
//!
//! DESIGN
//! ======
//! Each form owns one primary async operation and a busy flag. The flag is
//! taken before anything else, so a second submission while one is in flight
//! fails with `FormError::Busy` and never reaches the provider. Input is
//! validated locally before the first provider call. Provider failures are
//! mapped to `FormError` here, at the form boundary, and never travel
//! further.
//!
//! Forms never touch the session. A successful sign-in or sign-up is
//! observed by the session holder through the provider's notification
//! channel. Sign-out is the single exception that also navigates directly.
//!
//! TRADE-OFFS
//! ==========
//! Every provider call is bounded by a timeout. A hung provider therefore
//! surfaces as `Unknown { code: "timeout" }` and releases the busy flag,
//! even though the provider may still complete the call afterwards.

pub mod forgot_password;
pub mod sign_in;
pub mod sign_out;
pub mod sign_up;

use std::borrow::Cow;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub use forgot_password::ForgotPasswordForm;
pub use sign_in::SignInForm;
pub use sign_out::SignOutAction;
pub use sign_up::SignUpForm;

use crate::credential::{ProviderError, codes};
use crate::error::ErrorCode;

/// Shortest secret accepted by the forms.
pub const MIN_SECRET_LEN: usize = 6;

pub const INVALID_EMAIL_SIGN_IN: &str = "Enter a valid email address.";
pub const INVALID_EMAIL: &str = "Please enter a valid email address.";
pub const SECRET_TOO_SHORT: &str = "Password must be at least 6 characters.";
pub const NAME_REQUIRED: &str = "Please enter your full name.";
pub const SECRETS_DIFFER: &str = "Passwords do not match.";

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    /// Local validation failed; the provider was not called.
    #[error("{0}")]
    InvalidInput(&'static str),
    /// The provider rejected the email/secret pair.
    #[error("invalid credentials ({code})")]
    InvalidCredentials { code: String },
    #[error("too many failed attempts")]
    RateLimited,
    /// Any other provider failure, with the provider's own code.
    #[error("request failed ({code}): {message}")]
    Unknown { code: String, message: String },
    /// A previous submission of this form is still outstanding.
    #[error("request already in progress")]
    Busy,
}

impl FormError {
    /// Map a provider failure from `authenticate`.
    #[must_use]
    pub fn from_sign_in(err: ProviderError) -> Self {
        match err.code.as_str() {
            codes::EMAIL_NOT_FOUND
            | codes::INVALID_PASSWORD
            | codes::INVALID_LOGIN_CREDENTIALS
            | codes::USER_DISABLED => Self::InvalidCredentials { code: err.code },
            codes::TOO_MANY_ATTEMPTS => Self::RateLimited,
            _ => Self::unknown(err),
        }
    }

    /// Every provider failure of the other forms is `Unknown`.
    #[must_use]
    pub fn unknown(err: ProviderError) -> Self {
        Self::Unknown { code: err.code, message: err.message }
    }

    /// Short message for inline display under the form.
    #[must_use]
    pub fn user_message(&self) -> Cow<'static, str> {
        match self {
            Self::InvalidInput(message) => Cow::Borrowed(*message),
            Self::InvalidCredentials { code } => match code.as_str() {
                codes::EMAIL_NOT_FOUND => Cow::Borrowed("No account found with this email"),
                codes::INVALID_PASSWORD => Cow::Borrowed("Incorrect password"),
                _ => Cow::Borrowed("Invalid email or password"),
            },
            Self::RateLimited => Cow::Borrowed("Too many failed attempts. Try again later"),
            Self::Unknown { code, .. } => Cow::Owned(format!("Request failed ({code})")),
            Self::Busy => Cow::Borrowed("Please wait for the current request to finish"),
        }
    }
}

impl ErrorCode for FormError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "E_INVALID_INPUT",
            Self::InvalidCredentials { .. } => "E_INVALID_CREDENTIALS",
            Self::RateLimited => "E_RATE_LIMITED",
            Self::Unknown { .. } => "E_UNKNOWN",
            Self::Busy => "E_BUSY",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Busy | Self::Unknown { .. })
    }
}

// =============================================================================
// BUSY FLAG
// =============================================================================

/// Per-form "submission in flight" flag.
#[derive(Debug, Default)]
pub struct BusyFlag(AtomicBool);

impl BusyFlag {
    /// Take the flag for the duration of the returned guard.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::Busy`] when the flag is already held.
    pub fn acquire(&self) -> Result<BusyGuard<'_>, FormError> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| BusyGuard(&self.0))
            .map_err(|_| FormError::Busy)
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Clears the busy flag on drop, on success and failure paths alike.
#[must_use]
pub struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Trim `raw` and accept it when it looks like `local@domain.tld`: exactly
/// one `@`, no whitespace, a non-empty local part, and a dot in the domain
/// with text on both sides.
#[must_use]
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim();
    if email.chars().any(char::is_whitespace) {
        return None;
    }
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.contains('@') {
        return None;
    }
    let dotted = domain.char_indices().any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len());
    dotted.then(|| email.to_owned())
}

/// Run a provider call with an upper bound on its duration.
pub(crate) async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, ProviderError>>,
) -> Result<T, ProviderError> {
    tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
        Err(ProviderError::new(codes::TIMEOUT, format!("provider did not answer within {limit:?}")))
    })
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
