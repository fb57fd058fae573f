//! Credential store — the identity provider as seen from the app.
//!
//! DESIGN
//! ======
//! The provider is an external collaborator. `CredentialStore` is the only
//! seam: forms call its async operations, and the session holder registers
//! a single listener through `on_session_change`. Two implementations ship:
//! `MemoryCredentialStore` (tests, offline demo) and `RestCredentialStore`
//! (Identity Toolkit compatible HTTP API).
//!
//! Provider failures are reported as `ProviderError` with the provider's own
//! code. Mapping codes to user-facing errors happens at the form boundary.

pub mod cache;
mod listeners;
pub mod memory;
pub mod rest;

use std::sync::Arc;

pub use listeners::ListenerHandle;
pub(crate) use listeners::ListenerRegistry;
pub use memory::MemoryCredentialStore;
pub use rest::RestCredentialStore;

use crate::session::Identity;

// =============================================================================
// PROVIDER CODES
// =============================================================================

/// Error codes shared by both store implementations.
pub mod codes {
    pub const EMAIL_NOT_FOUND: &str = "EMAIL_NOT_FOUND";
    pub const INVALID_PASSWORD: &str = "INVALID_PASSWORD";
    pub const INVALID_LOGIN_CREDENTIALS: &str = "INVALID_LOGIN_CREDENTIALS";
    pub const USER_DISABLED: &str = "USER_DISABLED";
    pub const TOO_MANY_ATTEMPTS: &str = "TOO_MANY_ATTEMPTS_TRY_LATER";
    pub const EMAIL_EXISTS: &str = "EMAIL_EXISTS";
    pub const WEAK_PASSWORD: &str = "WEAK_PASSWORD";
    pub const USER_NOT_FOUND: &str = "USER_NOT_FOUND";
    pub const NETWORK_REQUEST_FAILED: &str = "NETWORK_REQUEST_FAILED";
    pub const HTTP_CLIENT_BUILD: &str = "HTTP_CLIENT_BUILD";
    pub const MALFORMED_RESPONSE: &str = "MALFORMED_RESPONSE";
    pub const TIMEOUT: &str = "timeout";
}

// =============================================================================
// ERROR
// =============================================================================

/// Failure reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ProviderError {
    /// Provider diagnostic code, e.g. `INVALID_PASSWORD`.
    pub code: String,
    /// Human-readable detail from the provider.
    pub message: String,
}

impl ProviderError {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }

    #[must_use]
    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

/// One delivery on the provider's session-change channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The signed-in identity is now this value (`None` = signed out).
    Changed(Option<Identity>),
    /// The channel died and will deliver nothing further.
    ChannelFailed(String),
}

/// Listener invoked synchronously, in order, for every session event.
/// Listeners must not call back into the store from inside the callback.
pub type SessionListener = Arc<dyn Fn(SessionEvent) + Send + Sync>;

/// Profile attributes that can be attached to an existing identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
}

// =============================================================================
// STORE
// =============================================================================

#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Register a new account. Providers sign the new account in.
    async fn create_account(&self, email: &str, secret: &str) -> Result<Identity, ProviderError>;

    /// Verify credentials and start a session.
    async fn authenticate(&self, email: &str, secret: &str) -> Result<Identity, ProviderError>;

    /// End the current session, if any.
    async fn invalidate_session(&self) -> Result<(), ProviderError>;

    /// Ask the provider to send a credential reset message.
    async fn request_credential_reset(&self, email: &str) -> Result<(), ProviderError>;

    /// Attach profile attributes to `identity`, returning the updated identity.
    async fn update_identity_profile(
        &self,
        identity: &Identity,
        update: ProfileUpdate,
    ) -> Result<Identity, ProviderError>;

    /// Register a session-change listener.
    ///
    /// The listener receives at least one `Changed` event reflecting the
    /// restored session (or its absence), then one per subsequent change.
    /// Dropping the returned handle unregisters it.
    fn on_session_change(&self, listener: SessionListener) -> ListenerHandle;
}
