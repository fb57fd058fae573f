use std::sync::Mutex;

use super::*;

fn recording_listener() -> (SessionListener, Arc<Mutex<Vec<SessionEvent>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let listener: SessionListener = Arc::new(move |event| sink.lock().unwrap().push(event));
    (listener, seen)
}

fn seeded() -> MemoryCredentialStore {
    MemoryCredentialStore::new().with_account("jane@example.com", "secret1", Some("Jane Doe"))
}

// =============================================================================
// Helpers
// =============================================================================

#[test]
fn hash_secret_is_stable_and_distinct() {
    assert_eq!(hash_secret("secret1"), hash_secret("secret1"));
    assert_ne!(hash_secret("secret1"), hash_secret("secret2"));
    assert_eq!(hash_secret("x").len(), 64);
}

#[test]
fn generate_uid_shape() {
    let uid = generate_uid();
    assert_eq!(uid.len(), 28);
    assert!(uid.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(uid, generate_uid());
}

#[test]
fn account_key_normalizes_case_and_whitespace() {
    assert_eq!(account_key("  Jane@Example.COM "), "jane@example.com");
}

// =============================================================================
// Listener delivery
// =============================================================================

#[tokio::test]
async fn registration_delivers_absent_session_immediately() {
    let store = seeded();
    let (listener, seen) = recording_listener();
    let _handle = store.on_session_change(listener);
    assert_eq!(*seen.lock().unwrap(), vec![SessionEvent::Changed(None)]);
    assert_eq!(store.provider_calls(), 0);
}

#[tokio::test]
async fn registration_delivers_restored_session() {
    let store = seeded().with_restored_session("jane@example.com");
    let (listener, seen) = recording_listener();
    let _handle = store.on_session_change(listener);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(matches!(&seen[0], SessionEvent::Changed(Some(id)) if id.email == "jane@example.com"));
}

#[tokio::test(start_paused = true)]
async fn restore_delay_defers_first_delivery() {
    let store = seeded().with_restore_delay(Duration::from_millis(50));
    let (listener, seen) = recording_listener();
    let _handle = store.on_session_change(listener);
    assert!(seen.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(*seen.lock().unwrap(), vec![SessionEvent::Changed(None)]);
}

#[tokio::test(start_paused = true)]
async fn changes_before_restore_are_folded_into_the_restore() {
    let store = seeded().with_restore_delay(Duration::from_millis(50));
    let (listener, seen) = recording_listener();
    let _handle = store.on_session_change(listener);

    store.authenticate("jane@example.com", "secret1").await.unwrap();
    assert!(seen.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(60)).await;
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(matches!(&seen[0], SessionEvent::Changed(Some(_))));
}

#[tokio::test]
async fn dropped_handle_stops_delivery() {
    let store = seeded();
    let (listener, seen) = recording_listener();
    let handle = store.on_session_change(listener);
    assert_eq!(store.listener_count(), 1);
    drop(handle);
    assert_eq!(store.listener_count(), 0);

    store.authenticate("jane@example.com", "secret1").await.unwrap();
    assert_eq!(seen.lock().unwrap().len(), 1);
}

// =============================================================================
// authenticate
// =============================================================================

#[tokio::test]
async fn authenticate_success_notifies_listeners() {
    let store = seeded();
    let (listener, seen) = recording_listener();
    let _handle = store.on_session_change(listener);

    let identity = store.authenticate("JANE@example.com", "secret1").await.unwrap();
    assert_eq!(identity.display_name.as_deref(), Some("Jane Doe"));
    assert_eq!(store.current_identity(), Some(identity.clone()));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.last(), Some(&SessionEvent::Changed(Some(identity))));
}

#[tokio::test]
async fn authenticate_unknown_email() {
    let store = seeded();
    let err = store.authenticate("nobody@example.com", "secret1").await.unwrap_err();
    assert!(err.is(codes::EMAIL_NOT_FOUND));
}

#[tokio::test]
async fn authenticate_wrong_secret() {
    let store = seeded();
    let err = store.authenticate("jane@example.com", "wrong-secret").await.unwrap_err();
    assert!(err.is(codes::INVALID_PASSWORD));
    assert!(store.current_identity().is_none());
}

#[tokio::test]
async fn repeated_failures_trigger_rate_limit() {
    let store = seeded();
    for _ in 0..MAX_FAILED_ATTEMPTS {
        let err = store.authenticate("jane@example.com", "nope-nope").await.unwrap_err();
        assert!(err.is(codes::INVALID_PASSWORD));
    }
    let err = store.authenticate("jane@example.com", "secret1").await.unwrap_err();
    assert!(err.is(codes::TOO_MANY_ATTEMPTS));
}

#[tokio::test]
async fn success_clears_failure_counter() {
    let store = seeded();
    for _ in 0..MAX_FAILED_ATTEMPTS - 1 {
        let _ = store.authenticate("jane@example.com", "nope-nope").await;
    }
    store.authenticate("jane@example.com", "secret1").await.unwrap();
    let err = store.authenticate("jane@example.com", "nope-nope").await.unwrap_err();
    assert!(err.is(codes::INVALID_PASSWORD));
}

#[tokio::test(start_paused = true)]
async fn lockout_expires_after_failure_window() {
    let store = seeded();
    for _ in 0..MAX_FAILED_ATTEMPTS {
        let _ = store.authenticate("jane@example.com", "nope-nope").await;
    }
    let err = store.authenticate("jane@example.com", "secret1").await.unwrap_err();
    assert!(err.is(codes::TOO_MANY_ATTEMPTS));

    tokio::time::advance(FAILURE_WINDOW).await;
    store.authenticate("jane@example.com", "secret1").await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failures_spread_beyond_window_never_lock_out() {
    let store = seeded();
    for _ in 0..MAX_FAILED_ATTEMPTS * 2 {
        let err = store.authenticate("jane@example.com", "nope-nope").await.unwrap_err();
        assert!(err.is(codes::INVALID_PASSWORD));
        tokio::time::advance(FAILURE_WINDOW / 2).await;
    }
}

#[tokio::test(start_paused = true)]
async fn stale_failure_entries_are_forgotten() {
    let store = seeded();
    for n in 0..20 {
        let _ = store.authenticate(&format!("stranger{n}@example.com"), "nope-nope").await;
    }
    assert_eq!(store.tracked_failure_emails(), 20);

    tokio::time::advance(FAILURE_WINDOW).await;
    let _ = store.authenticate("jane@example.com", "nope-nope").await;
    assert_eq!(store.tracked_failure_emails(), 1);
}

// =============================================================================
// create_account / update_identity_profile
// =============================================================================

#[tokio::test]
async fn create_account_signs_in_new_account() {
    let store = MemoryCredentialStore::new();
    let (listener, seen) = recording_listener();
    let _handle = store.on_session_change(listener);

    let identity = store.create_account("new@example.com", "secret1").await.unwrap();
    assert_eq!(identity.email, "new@example.com");
    assert!(identity.display_name.is_none());
    assert_eq!(seen.lock().unwrap().last(), Some(&SessionEvent::Changed(Some(identity))));
}

#[tokio::test]
async fn create_account_rejects_duplicate_email() {
    let store = seeded();
    let err = store.create_account("Jane@Example.com", "secret1").await.unwrap_err();
    assert!(err.is(codes::EMAIL_EXISTS));
}

#[tokio::test]
async fn create_account_rejects_weak_secret() {
    let store = MemoryCredentialStore::new();
    let err = store.create_account("new@example.com", "abc").await.unwrap_err();
    assert!(err.is(codes::WEAK_PASSWORD));
    assert!(store.account("new@example.com").is_none());
}

#[tokio::test]
async fn profile_update_on_current_identity_is_broadcast() {
    let store = MemoryCredentialStore::new();
    let (listener, seen) = recording_listener();
    let _handle = store.on_session_change(listener);

    let identity = store.create_account("new@example.com", "secret1").await.unwrap();
    let update = ProfileUpdate { display_name: Some("New Person".into()) };
    let updated = store.update_identity_profile(&identity, update).await.unwrap();

    assert_eq!(updated.display_name.as_deref(), Some("New Person"));
    assert_eq!(seen.lock().unwrap().last(), Some(&SessionEvent::Changed(Some(updated))));
}

#[tokio::test]
async fn profile_update_for_unknown_uid_fails() {
    let store = MemoryCredentialStore::new();
    let ghost = Identity::new("ghost", "ghost@example.com");
    let err = store.update_identity_profile(&ghost, ProfileUpdate::default()).await.unwrap_err();
    assert!(err.is(codes::USER_NOT_FOUND));
}

// =============================================================================
// invalidate_session / reset / channel failure
// =============================================================================

#[tokio::test]
async fn invalidate_notifies_only_when_a_session_existed() {
    let store = seeded().with_restored_session("jane@example.com");
    let (listener, seen) = recording_listener();
    let _handle = store.on_session_change(listener);

    store.invalidate_session().await.unwrap();
    store.invalidate_session().await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1], SessionEvent::Changed(None));
}

#[tokio::test]
async fn reset_for_known_and_unknown_email() {
    let store = seeded();
    store.request_credential_reset(" Jane@example.com").await.unwrap();
    let err = store.request_credential_reset("nobody@example.com").await.unwrap_err();
    assert!(err.is(codes::EMAIL_NOT_FOUND));
    assert_eq!(store.reset_requests(), vec!["jane@example.com".to_owned()]);
}

#[tokio::test]
async fn renotify_repeats_current_state() {
    let store = seeded().with_restored_session("jane@example.com");
    let (listener, seen) = recording_listener();
    let _handle = store.on_session_change(listener);
    store.renotify();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], seen[1]);
}

#[tokio::test]
async fn failed_channel_delivers_failure_once() {
    let store = seeded();
    let (listener, seen) = recording_listener();
    let _handle = store.on_session_change(listener);

    store.fail_channel("listener socket closed");
    store.authenticate("jane@example.com", "secret1").await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![SessionEvent::Changed(None), SessionEvent::ChannelFailed("listener socket closed".into())]
    );
}

#[tokio::test(start_paused = true)]
async fn latency_counts_calls_before_running() {
    let store = Arc::new(seeded().with_latency(Duration::from_millis(100)));
    let task = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.authenticate("jane@example.com", "secret1").await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(store.provider_calls(), 1);
    assert!(store.current_identity().is_none());

    task.await.unwrap().unwrap();
    assert!(store.current_identity().is_some());
}
