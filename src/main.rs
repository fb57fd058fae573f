use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use dm_session::config;
use dm_session::credential::cache::SessionCache;
use dm_session::forms::forgot_password::RESET_SENT_MESSAGE;
use dm_session::{
    App, AppConfig, ConfigError, CredentialStore, FatalError, FormError, MemoryCredentialStore, ProviderError,
    RestCredentialStore, RouteTable, RunningApp,
};
use tracing::info;

/// Extra wait after the settle delay so a deferred transition has landed
/// before the active root is printed.
const SETTLE_MARGIN: Duration = Duration::from_millis(10);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("identity provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("{}", .0.user_message())]
    Form(#[from] FormError),
    #[error("fatal: {0}")]
    Fatal(#[from] FatalError),
}

#[derive(Parser, Debug)]
#[command(name = "dm-session", about = "Daily Message session CLI")]
struct Cli {
    /// Use the in-memory provider instead of the hosted one. Its accounts and
    /// session last for this invocation only.
    #[arg(long)]
    memory: bool,

    #[command(flatten)]
    demo: DemoArgs,

    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

/// Account seeded into the in-memory provider. Ignored without `--memory`.
#[derive(Args, Debug)]
struct DemoArgs {
    #[arg(long, env = "DM_DEMO_EMAIL")]
    demo_email: Option<String>,

    #[arg(long, env = "DM_DEMO_PASSWORD", hide_env_values = true)]
    demo_password: Option<String>,

    /// Start with the demo account already signed in.
    #[arg(long, default_value_t = false)]
    demo_signed_in: bool,
}

/// Settings read by `AppConfig`. Each flag falls back to its variable.
#[derive(Args, Debug)]
struct ConfigArgs {
    #[arg(long, env = "DM_IDENTITY_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "DM_IDENTITY_PROJECT_ID")]
    project_id: Option<String>,

    #[arg(long, env = "DM_IDENTITY_BASE_URL")]
    base_url: Option<String>,

    /// Delay in milliseconds before a navigation decision is applied.
    #[arg(long, env = "DM_NAV_SETTLE_MS")]
    settle_ms: Option<String>,

    /// Upper bound in seconds on each provider call.
    #[arg(long, env = "DM_CREDENTIAL_TIMEOUT_SECS")]
    timeout_secs: Option<String>,

    #[arg(long, env = "DM_SESSION_CACHE_PATH")]
    cache: Option<PathBuf>,
}

impl ConfigArgs {
    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            config::API_KEY_VAR => self.api_key.clone(),
            config::PROJECT_ID_VAR => self.project_id.clone(),
            config::BASE_URL_VAR => self.base_url.clone(),
            config::SETTLE_VAR => self.settle_ms.clone(),
            config::TIMEOUT_VAR => self.timeout_secs.clone(),
            config::CACHE_PATH_VAR => self.cache.as_ref().map(|p| p.display().to_string()),
            _ => None,
        }
    }

    fn load(&self) -> Result<AppConfig, ConfigError> {
        AppConfig::from_lookup(|key| self.lookup(key))
    }
}

impl DemoArgs {
    fn memory_store(&self) -> MemoryCredentialStore {
        let store = MemoryCredentialStore::new();
        let (Some(email), Some(password)) = (&self.demo_email, &self.demo_password) else {
            return store;
        };
        info!(email = %email, "seeding demo account");
        let store = store.with_account(email, password, None);
        if self.demo_signed_in { store.with_restored_session(email) } else { store }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show who is signed in.
    Status,
    SignIn {
        email: String,
        #[arg(long, env = "DM_PASSWORD", hide_env_values = true)]
        password: String,
    },
    SignUp {
        #[arg(long)]
        name: String,
        email: String,
        #[arg(long, env = "DM_PASSWORD", hide_env_values = true)]
        password: String,
        /// Defaults to `--password`.
        #[arg(long)]
        confirm: Option<String>,
    },
    SignOut,
    /// Request a password reset email.
    Reset {
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    run(Cli::parse()).await
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = cli.config.load()?;

    let store: Arc<dyn CredentialStore> = if cli.memory {
        info!("using in-memory credential store");
        Arc::new(cli.demo.memory_store())
    } else {
        let cache = config.session_cache_path.clone().map(SessionCache::new);
        Arc::new(RestCredentialStore::new(config.identity()?, config.credential_timeout, cache)?)
    };

    let routes = Arc::new(RouteTable::new());
    let app = App::new(&config, store, routes.clone()).start();

    let outcome = tokio::select! {
        result = execute(&app, cli.command) => result,
        err = app.fatal() => Err(err.into()),
    };

    tokio::time::sleep(config.settle_delay + SETTLE_MARGIN).await;
    println!("root: {} ({})", app.active_root(), routes.current_path());
    app.shutdown();
    outcome
}

async fn execute(app: &RunningApp, command: Command) -> Result<(), CliError> {
    let session = app.wait_until_resolved().await;

    match command {
        Command::Status => match session.identity() {
            Some(identity) => println!("signed in as {} ({})", identity.email, identity.uid),
            None => println!("signed out"),
        },
        Command::SignIn { email, password } => {
            let identity = app.sign_in().submit(&email, &password).await?;
            println!("signed in as {}", identity.email);
        }
        Command::SignUp { name, email, password, confirm } => {
            let confirm = confirm.unwrap_or_else(|| password.clone());
            let identity = app.sign_up().submit(&name, &email, &password, &confirm).await?;
            println!("account created for {}", identity.email);
        }
        Command::SignOut => {
            app.sign_out().submit().await?;
            println!("signed out");
        }
        Command::Reset { email } => {
            app.forgot_password().submit(&email).await?;
            println!("{RESET_SENT_MESSAGE}");
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
