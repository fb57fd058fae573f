//! Authentication session lifecycle for the Daily Message app.
//!
//! The core keeps one authoritative `Session`, drives the active root screen
//! from it, and exposes the four credential forms. The identity provider sits
//! behind the `CredentialStore` trait.

pub mod app;
pub mod config;
pub mod credential;
pub mod error;
pub mod forms;
pub mod navigation;
pub mod session;

pub use app::{App, FatalError, RunningApp};
pub use config::{AppConfig, ConfigError, IdentityConfig};
pub use credential::{CredentialStore, MemoryCredentialStore, ProviderError, RestCredentialStore};
pub use error::ErrorCode;
pub use forms::FormError;
pub use navigation::{NavigationError, NavigationGuard, Root, RouteTable, Router};
pub use session::{Identity, Phase, Session, SessionHolder};
