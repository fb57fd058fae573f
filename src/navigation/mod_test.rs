use super::*;
use crate::session::Identity;

fn resolved(identity: Option<Identity>) -> Session {
    let mut session = Session::initializing();
    session.apply(identity);
    session
}

#[test]
fn initializing_session_waits() {
    assert_eq!(Root::for_session(&Session::initializing()), Root::Waiting);
}

#[test]
fn resolved_without_identity_goes_to_sign_in() {
    assert_eq!(Root::for_session(&resolved(None)), Root::SignIn);
}

#[test]
fn resolved_with_identity_goes_to_main() {
    let session = resolved(Some(Identity::new("u1", "jane@example.com")));
    assert_eq!(Root::for_session(&session), Root::Main);
}

#[test]
fn root_display_names() {
    assert_eq!(Root::Waiting.to_string(), "waiting");
    assert_eq!(Root::SignIn.to_string(), "sign-in");
    assert_eq!(Root::Main.to_string(), "main");
}

#[test]
fn unknown_route_message_names_root() {
    assert_eq!(NavigationError::UnknownRoute(Root::Main).to_string(), "no route registered for root main");
}
