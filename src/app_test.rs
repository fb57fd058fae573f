use std::time::Duration;

use super::*;
use crate::credential::MemoryCredentialStore;
use crate::navigation::RouteTable;
use crate::navigation::routes::SIGN_IN_PATH;

fn config() -> AppConfig {
    AppConfig { settle_delay: Duration::from_millis(100), ..AppConfig::default() }
}

fn seeded() -> MemoryCredentialStore {
    MemoryCredentialStore::new().with_account("jane@example.com", "secret1", Some("Jane Doe"))
}

// =============================================================================
// Startup
// =============================================================================

#[tokio::test(start_paused = true)]
async fn cold_start_waits_then_lands_on_sign_in() {
    let store = Arc::new(seeded().with_restore_delay(Duration::from_millis(300)));
    let table = Arc::new(RouteTable::new());
    let app = App::new(&config(), store, table.clone()).start();

    assert_eq!(app.active_root(), Root::Waiting);
    let session = app.wait_until_resolved().await;
    assert!(!session.is_authenticated());
    assert_eq!(app.active_root(), Root::Waiting);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(app.active_root(), Root::SignIn);
    assert_eq!(table.current_path(), SIGN_IN_PATH);
}

#[tokio::test(start_paused = true)]
async fn restored_session_lands_on_main() {
    let store = Arc::new(seeded().with_restored_session("jane@example.com"));
    let app = App::new(&config(), store, Arc::new(RouteTable::new())).start();

    let session = app.wait_until_resolved().await;
    assert_eq!(session.identity().and_then(|i| i.display_name.as_deref()), Some("Jane Doe"));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(app.active_root(), Root::Main);
}

// =============================================================================
// Forms through the app
// =============================================================================

#[tokio::test(start_paused = true)]
async fn sign_in_then_sign_out_round_trip() {
    let store = Arc::new(seeded());
    let table = Arc::new(RouteTable::new());
    let app = App::new(&config(), store, table.clone()).start();
    app.wait_until_resolved().await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    app.sign_in().submit("jane@example.com", "secret1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(app.active_root(), Root::Main);

    app.sign_out().submit().await.unwrap();
    assert_eq!(app.active_root(), Root::SignIn);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(table.transitions(), 3);
}

// =============================================================================
// Fatal conditions and shutdown
// =============================================================================

#[tokio::test]
async fn channel_failure_resolves_fatal() {
    let store = Arc::new(seeded());
    let app = App::new(&config(), store.clone(), Arc::new(RouteTable::new())).start();
    app.wait_until_resolved().await;

    store.fail_channel("socket closed");
    let err = app.fatal().await;
    assert_eq!(err, FatalError::SessionChannel("socket closed".into()));
    assert_eq!(err.error_code(), "E_SESSION_CHANNEL");
}

#[tokio::test]
async fn broken_route_table_resolves_fatal() {
    let store = Arc::new(seeded().with_restored_session("jane@example.com"));
    let table = Arc::new(RouteTable::empty().with_route(Root::SignIn, SIGN_IN_PATH));
    let config = AppConfig { settle_delay: Duration::ZERO, ..AppConfig::default() };
    let app = App::new(&config, store, table).start();

    let err = app.fatal().await;
    assert_eq!(err, FatalError::Navigation(NavigationError::UnknownRoute(Root::Main)));
    assert_eq!(app.active_root(), Root::Waiting);
}

#[tokio::test]
async fn shutdown_releases_the_listener() {
    let store = Arc::new(seeded());
    let app = App::new(&config(), store.clone(), Arc::new(RouteTable::new())).start();
    assert_eq!(store.listener_count(), 1);

    app.shutdown();
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn dropping_running_app_releases_the_listener() {
    let store = Arc::new(seeded());
    {
        let _app = App::new(&config(), store.clone(), Arc::new(RouteTable::new())).start();
        assert_eq!(store.listener_count(), 1);
    }
    assert_eq!(store.listener_count(), 0);
}
