//! Identity Toolkit REST credential store.
//!
//! DESIGN
//! ======
//! Thin HTTP wrapper over the `accounts:*` endpoints of an Identity Toolkit
//! compatible service. Pure parsing lives in `parse_*` functions for
//! testability.
//!
//! The REST API has no push channel, so this store emits session
//! notifications itself: once on listener registration (with whatever the
//! session cache restored), then after every successful sign-in, sign-up,
//! profile update, and local sign-out.
//!
//! TRADE-OFFS
//! ==========
//! Sign-out is local only: the id token is dropped and the cache cleared.
//! Server-side revocation belongs to token-refresh internals, which this
//! crate leaves to the provider.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::cache::{CachedSession, SessionCache};
use super::{
    CredentialStore, ListenerHandle, ListenerRegistry, ProfileUpdate, ProviderError, SessionEvent, SessionListener,
    codes,
};
use crate::config::IdentityConfig;
use crate::session::Identity;

const CONNECT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// CLIENT
// =============================================================================

pub struct RestCredentialStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    session: Mutex<Option<CachedSession>>,
    listeners: ListenerRegistry,
    cache: Option<SessionCache>,
}

impl RestCredentialStore {
    /// Build the HTTP client and restore any cached session.
    ///
    /// # Errors
    ///
    /// Returns `HTTP_CLIENT_BUILD` if the HTTP client cannot be constructed.
    pub fn new(
        config: &IdentityConfig,
        request_timeout: Duration,
        cache: Option<SessionCache>,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::new(codes::HTTP_CLIENT_BUILD, e.to_string()))?;

        let restored = cache.as_ref().and_then(|cache| match cache.load() {
            Ok(Some(session)) => {
                info!(uid = %session.uid, "restored cached session");
                Some(session)
            }
            Ok(None) => {
                debug!("no cached session");
                None
            }
            Err(e) => {
                warn!(error = %e, path = %cache.path().display(), "ignoring unreadable session cache");
                None
            }
        });

        info!(project = %config.project_id, "identity provider configured");
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            session: Mutex::new(restored),
            listeners: ListenerRegistry::new(),
            cache,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<CachedSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        endpoint_url(&self.base_url, endpoint, &self.api_key)
    }

    async fn post<B: Serialize + Sync>(&self, endpoint: &str, body: &B) -> Result<String, ProviderError> {
        let response = self.http.post(self.endpoint_url(endpoint)).json(body).send().await.map_err(request_error)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(request_error)?;
        if !(200..300).contains(&status) {
            return Err(parse_error(status, &text));
        }
        Ok(text)
    }

    /// Install `session` as current, persist it, and notify listeners.
    fn begin_session(&self, session: CachedSession) -> Identity {
        let identity = session.identity();
        let mut current = self.lock();
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.store(&session) {
                warn!(error = %e, "failed to persist session cache");
            }
        }
        *current = Some(session);
        self.listeners.broadcast(&SessionEvent::Changed(Some(identity.clone())));
        identity
    }
}

fn request_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::new(codes::TIMEOUT, e.to_string())
    } else {
        ProviderError::new(codes::NETWORK_REQUEST_FAILED, e.to_string())
    }
}

fn endpoint_url(base_url: &str, endpoint: &str, api_key: &str) -> String {
    format!("{}/accounts:{endpoint}?key={api_key}", base_url.trim_end_matches('/'))
}

#[async_trait::async_trait]
impl CredentialStore for RestCredentialStore {
    async fn create_account(&self, email: &str, secret: &str) -> Result<Identity, ProviderError> {
        let body = PasswordRequest { email, password: secret, return_secure_token: true };
        let text = self.post("signUp", &body).await?;
        let session = parse_auth_response(&text)?;
        info!(uid = %session.uid, "account created");
        Ok(self.begin_session(session))
    }

    async fn authenticate(&self, email: &str, secret: &str) -> Result<Identity, ProviderError> {
        let body = PasswordRequest { email, password: secret, return_secure_token: true };
        let text = self.post("signInWithPassword", &body).await?;
        let session = parse_auth_response(&text)?;
        info!(uid = %session.uid, "session started");
        Ok(self.begin_session(session))
    }

    async fn invalidate_session(&self) -> Result<(), ProviderError> {
        let mut current = self.lock();
        if current.take().is_none() {
            return Ok(());
        }
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.clear() {
                warn!(error = %e, "failed to clear session cache");
            }
        }
        info!("session invalidated");
        self.listeners.broadcast(&SessionEvent::Changed(None));
        Ok(())
    }

    async fn request_credential_reset(&self, email: &str) -> Result<(), ProviderError> {
        let body = OobRequest { request_type: "PASSWORD_RESET", email };
        self.post("sendOobCode", &body).await?;
        debug!("reset message requested");
        Ok(())
    }

    async fn update_identity_profile(
        &self,
        identity: &Identity,
        update: ProfileUpdate,
    ) -> Result<Identity, ProviderError> {
        let id_token = self
            .lock()
            .as_ref()
            .filter(|s| s.uid == identity.uid)
            .map(|s| s.id_token.clone())
            .ok_or_else(|| ProviderError::new(codes::USER_NOT_FOUND, "no active session for this identity"))?;

        let body = UpdateRequest {
            id_token: &id_token,
            display_name: update.display_name.as_deref(),
            return_secure_token: false,
        };
        let text = self.post("update", &body).await?;
        let updated = parse_update_response(&text)?;

        let mut current = self.lock();
        let Some(session) = current.as_mut().filter(|s| s.uid == updated.uid) else {
            // Signed out while the update was in flight.
            return Ok(updated);
        };
        session.display_name.clone_from(&updated.display_name);
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.store(session) {
                warn!(error = %e, "failed to persist session cache");
            }
        }
        self.listeners.broadcast(&SessionEvent::Changed(Some(updated.clone())));
        Ok(updated)
    }

    fn on_session_change(&self, listener: SessionListener) -> ListenerHandle {
        let (id, handle) = self.listeners.register(listener);
        let current = self.lock();
        self.listeners.prime(id, current.as_ref().map(CachedSession::identity));
        handle
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OobRequest<'a> {
    request_type: &'static str,
    email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest<'a> {
    id_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    local_id: String,
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    id_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateResponse {
    local_id: String,
    email: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

// =============================================================================
// PARSING
// =============================================================================

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_auth_response(json: &str) -> Result<CachedSession, ProviderError> {
    let api: AuthResponse =
        serde_json::from_str(json).map_err(|e| ProviderError::new(codes::MALFORMED_RESPONSE, e.to_string()))?;
    let identity = Identity { uid: api.local_id, email: api.email, display_name: non_empty(api.display_name) };
    Ok(CachedSession::new(&identity, api.id_token))
}

fn parse_update_response(json: &str) -> Result<Identity, ProviderError> {
    let api: UpdateResponse =
        serde_json::from_str(json).map_err(|e| ProviderError::new(codes::MALFORMED_RESPONSE, e.to_string()))?;
    Ok(Identity { uid: api.local_id, email: api.email, display_name: non_empty(api.display_name) })
}

/// Error bodies look like `{"error":{"message":"CODE"}}` or
/// `{"error":{"message":"CODE : detail"}}`.
fn parse_error(status: u16, body: &str) -> ProviderError {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return ProviderError::new(format!("HTTP_{status}"), body.trim());
    };
    let message = envelope.error.message;
    match message.split_once(':') {
        Some((code, detail)) => ProviderError::new(code.trim(), detail.trim()),
        None => ProviderError::new(message.trim(), message.trim()),
    }
}

#[cfg(test)]
#[path = "rest_test.rs"]
mod tests;
