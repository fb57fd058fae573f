//! In-memory credential store.
//!
//! DESIGN
//! ======
//! Behaves like a hosted identity provider without the network: accounts are
//! keyed by normalized email, secrets are kept as SHA-256 digests, and at
//! most one session is current. Every state change is broadcast to listeners
//! while the state lock is held, so delivery order always matches the order
//! in which state changed.
//!
//! Failed sign-ins are kept as per-email timestamps in a sliding window.
//! Stamps older than the window are pruned on every attempt, and emails with
//! no recent failures are forgotten, so lockout is temporary and the map
//! stays bounded.
//!
//! Knobs for tests and demos: a restore delay (models the cold-start session
//! restore), per-call latency (models a slow provider), a seeded session
//! (models a session persisted across restarts), and `fail_channel`.

use std::collections::{HashMap, VecDeque};
use std::fmt::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::{
    CredentialStore, ListenerHandle, ListenerRegistry, ProfileUpdate, ProviderError, SessionEvent, SessionListener,
    codes,
};
use crate::session::Identity;

/// Failed sign-ins for one email within [`FAILURE_WINDOW`] before the
/// provider refuses.
pub const MAX_FAILED_ATTEMPTS: usize = 5;
pub const FAILURE_WINDOW: Duration = Duration::from_secs(5 * 60);
const MIN_PROVIDER_SECRET_LEN: usize = 6;

// =============================================================================
// HELPERS
// =============================================================================

fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    bytes_to_hex(&hasher.finalize())
}

/// Random 28-character hex uid.
fn generate_uid() -> String {
    let bytes: [u8; 14] = rand::rng().random();
    bytes_to_hex(&bytes)
}

fn account_key(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

// =============================================================================
// STATE
// =============================================================================

struct Account {
    uid: String,
    email: String,
    secret_hash: String,
    display_name: Option<String>,
}

impl Account {
    fn identity(&self) -> Identity {
        Identity { uid: self.uid.clone(), email: self.email.clone(), display_name: self.display_name.clone() }
    }
}

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    /// Account key of the signed-in account.
    current: Option<String>,
    failed_attempts: HashMap<String, VecDeque<Instant>>,
    reset_requests: Vec<String>,
}

impl MemoryState {
    fn current_identity(&self) -> Option<Identity> {
        self.current.as_ref().and_then(|key| self.accounts.get(key)).map(Account::identity)
    }

    /// Drop failures outside the window and forget emails with none left.
    fn prune_failures(&mut self, now: Instant) {
        self.failed_attempts.retain(|_, stamps| {
            while stamps.front().is_some_and(|t| now.duration_since(*t) >= FAILURE_WINDOW) {
                stamps.pop_front();
            }
            !stamps.is_empty()
        });
    }

    fn recent_failures(&self, key: &str) -> usize {
        self.failed_attempts.get(key).map_or(0, VecDeque::len)
    }
}

// =============================================================================
// STORE
// =============================================================================

pub struct MemoryCredentialStore {
    state: Arc<Mutex<MemoryState>>,
    listeners: ListenerRegistry,
    restore_delay: Option<Duration>,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            listeners: ListenerRegistry::new(),
            restore_delay: None,
            latency: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Seed an existing account.
    #[must_use]
    pub fn with_account(self, email: &str, secret: &str, display_name: Option<&str>) -> Self {
        {
            let mut state = self.lock();
            let key = account_key(email);
            state.accounts.insert(
                key,
                Account {
                    uid: generate_uid(),
                    email: email.trim().to_owned(),
                    secret_hash: hash_secret(secret),
                    display_name: display_name.map(str::to_owned),
                },
            );
        }
        self
    }

    /// Start with `email` signed in, as if a session had been persisted by a
    /// previous run. Ignored when no such account was seeded.
    #[must_use]
    pub fn with_restored_session(self, email: &str) -> Self {
        {
            let mut state = self.lock();
            let key = account_key(email);
            if state.accounts.contains_key(&key) {
                state.current = Some(key);
            }
        }
        self
    }

    /// Delay the first notification to each new listener.
    #[must_use]
    pub fn with_restore_delay(mut self, delay: Duration) -> Self {
        self.restore_delay = Some(delay);
        self
    }

    /// Suspend every provider call for `latency` before it runs.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn begin_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Number of provider operations invoked so far (listener registration
    /// excluded).
    #[must_use]
    pub fn provider_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn current_identity(&self) -> Option<Identity> {
        self.lock().current_identity()
    }

    #[must_use]
    pub fn account(&self, email: &str) -> Option<Identity> {
        self.lock().accounts.get(&account_key(email)).map(Account::identity)
    }

    /// Emails for which a reset message was sent.
    #[must_use]
    pub fn reset_requests(&self) -> Vec<String> {
        self.lock().reset_requests.clone()
    }

    /// Emails with failed sign-ins inside the window as of the last attempt.
    #[must_use]
    pub fn tracked_failure_emails(&self) -> usize {
        self.lock().failed_attempts.len()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver the current state again without changing it. Hosted providers
    /// do this on token refresh.
    pub fn renotify(&self) {
        let state = self.lock();
        self.listeners.broadcast(&SessionEvent::Changed(state.current_identity()));
    }

    /// Kill the notification channel. Listeners get one `ChannelFailed`
    /// event and nothing afterwards.
    pub fn fail_channel(&self, reason: &str) {
        let _state = self.lock();
        warn!(reason, "session channel failing");
        self.listeners.broadcast(&SessionEvent::ChannelFailed(reason.to_owned()));
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create_account(&self, email: &str, secret: &str) -> Result<Identity, ProviderError> {
        self.begin_call().await;
        let key = account_key(email);
        let mut state = self.lock();
        if state.accounts.contains_key(&key) {
            return Err(ProviderError::new(codes::EMAIL_EXISTS, "the email address is already in use"));
        }
        if secret.chars().count() < MIN_PROVIDER_SECRET_LEN {
            return Err(ProviderError::new(codes::WEAK_PASSWORD, "password should be at least 6 characters"));
        }

        let account =
            Account { uid: generate_uid(), email: email.trim().to_owned(), secret_hash: hash_secret(secret), display_name: None };
        let identity = account.identity();
        state.accounts.insert(key.clone(), account);
        state.current = Some(key);
        info!(uid = %identity.uid, "account created");
        self.listeners.broadcast(&SessionEvent::Changed(Some(identity.clone())));
        Ok(identity)
    }

    async fn authenticate(&self, email: &str, secret: &str) -> Result<Identity, ProviderError> {
        self.begin_call().await;
        let key = account_key(email);
        let mut state = self.lock();

        let now = Instant::now();
        state.prune_failures(now);
        let failures = state.recent_failures(&key);
        if failures >= MAX_FAILED_ATTEMPTS {
            warn!(failures, "sign-in refused after repeated failures");
            return Err(ProviderError::new(codes::TOO_MANY_ATTEMPTS, "access temporarily disabled"));
        }

        let outcome = match state.accounts.get(&key) {
            None => Err(ProviderError::new(codes::EMAIL_NOT_FOUND, "no account for this email")),
            Some(account) if account.secret_hash != hash_secret(secret) => {
                Err(ProviderError::new(codes::INVALID_PASSWORD, "the password is invalid"))
            }
            Some(account) => Ok(account.identity()),
        };

        match outcome {
            Ok(identity) => {
                state.failed_attempts.remove(&key);
                state.current = Some(key);
                info!(uid = %identity.uid, "session started");
                self.listeners.broadcast(&SessionEvent::Changed(Some(identity.clone())));
                Ok(identity)
            }
            Err(err) => {
                state.failed_attempts.entry(key).or_default().push_back(now);
                Err(err)
            }
        }
    }

    async fn invalidate_session(&self) -> Result<(), ProviderError> {
        self.begin_call().await;
        let mut state = self.lock();
        if state.current.take().is_some() {
            info!("session invalidated");
            self.listeners.broadcast(&SessionEvent::Changed(None));
        }
        Ok(())
    }

    async fn request_credential_reset(&self, email: &str) -> Result<(), ProviderError> {
        self.begin_call().await;
        let key = account_key(email);
        let mut state = self.lock();
        if !state.accounts.contains_key(&key) {
            return Err(ProviderError::new(codes::EMAIL_NOT_FOUND, "no account for this email"));
        }
        state.reset_requests.push(key);
        debug!("reset message queued");
        Ok(())
    }

    async fn update_identity_profile(
        &self,
        identity: &Identity,
        update: ProfileUpdate,
    ) -> Result<Identity, ProviderError> {
        self.begin_call().await;
        let mut state = self.lock();
        let Some((key, account)) = state.accounts.iter_mut().find(|(_, a)| a.uid == identity.uid) else {
            return Err(ProviderError::new(codes::USER_NOT_FOUND, "no account for this uid"));
        };
        if let Some(name) = update.display_name {
            account.display_name = Some(name);
        }
        let updated = account.identity();
        let key = key.clone();

        if state.current.as_deref() == Some(key.as_str()) {
            self.listeners.broadcast(&SessionEvent::Changed(Some(updated.clone())));
        }
        Ok(updated)
    }

    fn on_session_change(&self, listener: SessionListener) -> ListenerHandle {
        let (id, handle) = self.listeners.register(listener);

        match (self.restore_delay, tokio::runtime::Handle::try_current()) {
            (Some(delay), Ok(runtime)) => {
                let state = Arc::clone(&self.state);
                let listeners = self.listeners.clone();
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let state = state.lock().unwrap_or_else(PoisonError::into_inner);
                    listeners.prime(id, state.current_identity());
                });
            }
            _ => {
                let state = self.lock();
                self.listeners.prime(id, state.current_identity());
            }
        }
        handle
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
