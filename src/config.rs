//! Configuration parsed from environment variables.
//!
//! All settings are read through [`AppConfig::from_lookup`], so tests can feed
//! a map instead of mutating the process environment.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_NAV_SETTLE_MS: u64 = 100;
pub const DEFAULT_CREDENTIAL_TIMEOUT_SECS: u64 = 30;

pub const API_KEY_VAR: &str = "DM_IDENTITY_API_KEY";
pub const PROJECT_ID_VAR: &str = "DM_IDENTITY_PROJECT_ID";
pub const BASE_URL_VAR: &str = "DM_IDENTITY_BASE_URL";
pub const SETTLE_VAR: &str = "DM_NAV_SETTLE_MS";
pub const TIMEOUT_VAR: &str = "DM_CREDENTIAL_TIMEOUT_SECS";
pub const CACHE_PATH_VAR: &str = "DM_SESSION_CACHE_PATH";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("identity provider configuration is incomplete: {missing} is not set")]
    Incomplete { missing: &'static str },
    #[error("identity provider is not configured; set DM_IDENTITY_API_KEY and DM_IDENTITY_PROJECT_ID")]
    MissingIdentity,
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Connection settings for the hosted identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    pub api_key: String,
    pub project_id: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// `None` when neither provider variable is set (in-memory provider only).
    pub identity: Option<IdentityConfig>,
    /// Cosmetic deferral applied to guard transitions. Zero = immediate.
    pub settle_delay: Duration,
    /// Upper bound on each credential call made by a form.
    pub credential_timeout: Duration,
    pub session_cache_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            identity: None,
            settle_delay: Duration::from_millis(DEFAULT_NAV_SETTLE_MS),
            credential_timeout: Duration::from_secs(DEFAULT_CREDENTIAL_TIMEOUT_SECS),
            session_cache_path: None,
        }
    }
}

impl AppConfig {
    /// Build config from process environment variables.
    ///
    /// - `DM_IDENTITY_API_KEY`, `DM_IDENTITY_PROJECT_ID`: provider credentials;
    ///   both or neither
    /// - `DM_IDENTITY_BASE_URL`: default Identity Toolkit v1 endpoint
    /// - `DM_NAV_SETTLE_MS`: default 100
    /// - `DM_CREDENTIAL_TIMEOUT_SECS`: default 30, must be non-zero
    /// - `DM_SESSION_CACHE_PATH`: optional
    ///
    /// # Errors
    ///
    /// Returns an error if only one provider variable is set or a numeric
    /// value does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let identity = match (get(API_KEY_VAR), get(PROJECT_ID_VAR)) {
            (Some(api_key), Some(project_id)) => {
                let base_url = get(BASE_URL_VAR)
                    .unwrap_or_else(|| DEFAULT_IDENTITY_BASE_URL.to_owned())
                    .trim_end_matches('/')
                    .to_owned();
                Some(IdentityConfig { api_key, project_id, base_url })
            }
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Incomplete { missing: PROJECT_ID_VAR }),
            (None, Some(_)) => return Err(ConfigError::Incomplete { missing: API_KEY_VAR }),
        };

        let settle_ms = parse_u64(SETTLE_VAR, get(SETTLE_VAR), DEFAULT_NAV_SETTLE_MS)?;
        let timeout_secs = parse_u64(TIMEOUT_VAR, get(TIMEOUT_VAR), DEFAULT_CREDENTIAL_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue { var: TIMEOUT_VAR, value: "0".into() });
        }

        Ok(Self {
            identity,
            settle_delay: Duration::from_millis(settle_ms),
            credential_timeout: Duration::from_secs(timeout_secs),
            session_cache_path: get(CACHE_PATH_VAR).map(PathBuf::from),
        })
    }

    /// Provider settings, required when talking to the hosted provider.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingIdentity`] when none were configured.
    pub fn identity(&self) -> Result<&IdentityConfig, ConfigError> {
        self.identity.as_ref().ok_or(ConfigError::MissingIdentity)
    }
}

fn parse_u64(var: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { var, value }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
