use std::collections::HashMap;

use super::*;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    move |key| map.get(key).cloned()
}

// =============================================================================
// Defaults
// =============================================================================

#[test]
fn empty_environment_uses_defaults() {
    let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
    assert_eq!(config, AppConfig::default());
    assert_eq!(config.settle_delay, Duration::from_millis(100));
    assert_eq!(config.credential_timeout, Duration::from_secs(30));
    assert!(config.identity.is_none());
}

#[test]
fn identity_accessor_requires_configuration() {
    let config = AppConfig::default();
    assert_eq!(config.identity().unwrap_err(), ConfigError::MissingIdentity);
}

// =============================================================================
// Identity provider
// =============================================================================

#[test]
fn complete_identity_config_is_parsed() {
    let config = AppConfig::from_lookup(lookup_from(&[
        ("DM_IDENTITY_API_KEY", "key-1"),
        ("DM_IDENTITY_PROJECT_ID", "daily-message"),
        ("DM_IDENTITY_BASE_URL", "http://localhost:9099/identitytoolkit.googleapis.com/v1/"),
    ]))
    .unwrap();
    let identity = config.identity().unwrap();
    assert_eq!(identity.api_key, "key-1");
    assert_eq!(identity.project_id, "daily-message");
    assert_eq!(identity.base_url, "http://localhost:9099/identitytoolkit.googleapis.com/v1");
}

#[test]
fn base_url_defaults_to_hosted_endpoint() {
    let config =
        AppConfig::from_lookup(lookup_from(&[("DM_IDENTITY_API_KEY", "k"), ("DM_IDENTITY_PROJECT_ID", "p")])).unwrap();
    assert_eq!(config.identity().unwrap().base_url, DEFAULT_IDENTITY_BASE_URL);
}

#[test]
fn api_key_without_project_is_incomplete() {
    let err = AppConfig::from_lookup(lookup_from(&[("DM_IDENTITY_API_KEY", "k")])).unwrap_err();
    assert_eq!(err, ConfigError::Incomplete { missing: "DM_IDENTITY_PROJECT_ID" });
}

#[test]
fn project_without_api_key_is_incomplete() {
    let err = AppConfig::from_lookup(lookup_from(&[("DM_IDENTITY_PROJECT_ID", "p")])).unwrap_err();
    assert_eq!(err, ConfigError::Incomplete { missing: "DM_IDENTITY_API_KEY" });
}

#[test]
fn blank_values_count_as_unset() {
    let err =
        AppConfig::from_lookup(lookup_from(&[("DM_IDENTITY_API_KEY", "k"), ("DM_IDENTITY_PROJECT_ID", "   ")]))
            .unwrap_err();
    assert!(matches!(err, ConfigError::Incomplete { .. }));
}

// =============================================================================
// Timing and cache
// =============================================================================

#[test]
fn settle_and_timeout_overrides() {
    let config = AppConfig::from_lookup(lookup_from(&[
        ("DM_NAV_SETTLE_MS", "0"),
        ("DM_CREDENTIAL_TIMEOUT_SECS", "5"),
        ("DM_SESSION_CACHE_PATH", "/tmp/dm/session.json"),
    ]))
    .unwrap();
    assert!(config.settle_delay.is_zero());
    assert_eq!(config.credential_timeout, Duration::from_secs(5));
    assert_eq!(config.session_cache_path, Some(PathBuf::from("/tmp/dm/session.json")));
}

#[test]
fn non_numeric_settle_is_rejected() {
    let err = AppConfig::from_lookup(lookup_from(&[("DM_NAV_SETTLE_MS", "fast")])).unwrap_err();
    assert_eq!(err, ConfigError::InvalidValue { var: "DM_NAV_SETTLE_MS", value: "fast".into() });
}

#[test]
fn zero_timeout_is_rejected() {
    let err = AppConfig::from_lookup(lookup_from(&[("DM_CREDENTIAL_TIMEOUT_SECS", "0")])).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { var: "DM_CREDENTIAL_TIMEOUT_SECS", .. }));
}
