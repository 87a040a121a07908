//! sessionkeeper - log in to a backend and keep the session alive locally.
//!
//! Usage:
//!
//! ```text
//! sessionkeeper login [USERNAME] [--remember]
//! sessionkeeper logoff [--forget]
//! sessionkeeper status
//! sessionkeeper reset
//! sessionkeeper watch
//! ```

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Local;
use sessionkeeper_core::{
    Config, CredentialStore, FileMirror, HttpTransport, LoginController, SessionProvider,
    SessionRecord,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "usage: sessionkeeper <login [USERNAME] [--remember] | logoff [--forget] | status | reset | watch>";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let flag = |name: &str| args.iter().any(|a| a == name);
    let positional: Vec<&str> = args
        .iter()
        .filter(|a| !a.starts_with("--"))
        .map(String::as_str)
        .collect();

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };

    let provider = SessionProvider::new();
    let mirror = Arc::new(FileMirror::new(config.cache_dir()?));
    let transport = Arc::new(HttpTransport::new()?);
    let controller = LoginController::start(provider.store(), mirror, transport, &config);
    info!(url = controller.login_url(), "sessionkeeper starting");

    match positional.first().copied() {
        Some("login") => {
            let username = match positional.get(1) {
                Some(name) => name.to_string(),
                None => prompt_username(config.last_username.as_deref())?,
            };
            login(&controller, &mut config, &username, flag("--remember")).await?;
        }
        Some("logoff") => {
            controller.logoff();
            if flag("--forget") {
                if let Some(ref name) = config.last_username {
                    let keychain = CredentialStore::for_endpoint(controller.login_url());
                    if let Err(e) = keychain.forget(name) {
                        warn!(error = %e, "Failed to forget stored password");
                    }
                }
            }
            println!("Logged off.");
        }
        Some("status") => print_status(&provider.user(), &controller),
        Some("reset") => {
            if provider.user().is_logged_in() {
                controller.reset_logoff_timeout(None);
            }
            print_status(&provider.user(), &controller);
        }
        Some("watch") => watch(&provider, &controller).await?,
        _ => bail!(USAGE),
    }

    controller.shutdown();
    drop(controller);
    provider.close();
    Ok(())
}

async fn login(
    controller: &LoginController,
    config: &mut Config,
    username: &str,
    remember: bool,
) -> Result<()> {
    let keychain = CredentialStore::for_endpoint(controller.login_url());
    let stored = keychain.recall(username).unwrap_or_else(|e| {
        warn!(error = %e, "Keychain unavailable");
        None
    });
    let password = match stored {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ")?,
    };

    println!("Authenticating...");
    let user = controller.login(username, &password).await;
    if let Some(ref error) = user.last_error {
        bail!("{}", error);
    }

    if remember {
        if let Err(e) = keychain.remember(username, &password) {
            warn!(error = %e, "Failed to store password");
        }
    }
    config.last_username = Some(username.to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }

    println!("Logged in as {} (id {}).", user.user_name, user.user_id);
    Ok(())
}

fn prompt_username(last: Option<&str>) -> Result<String> {
    match last {
        Some(last) => print!("Username [{}]: ", last),
        None => print!("Username: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    match (input.is_empty(), last) {
        (true, Some(last)) => Ok(last.to_string()),
        (true, None) => bail!("Username required"),
        (false, _) => Ok(input.to_string()),
    }
}

fn print_status(user: &SessionRecord, controller: &LoginController) {
    if !user.is_logged_in() {
        println!("Logged out.");
        if let Some(ref error) = user.last_error {
            println!("Last error: {}", error);
        }
        return;
    }

    println!("Logged in as {} (id {}).", user.user_name, user.user_id);
    if let Some(at) = user.last_authed {
        println!("Authenticated at {}", at.with_timezone(&Local).format("%b %d, %Y %H:%M"));
    }
    if let Some(left) = controller.expiry_remaining() {
        println!("Session expires in {}h {}m", left.num_hours(), left.num_minutes() % 60);
    }
}

/// Keep the session alive in the foreground, reporting every change.
/// Reads `reset`, `logoff`, `status` and `quit` from stdin.
async fn watch(provider: &SessionProvider, controller: &LoginController) -> Result<()> {
    let mut changes = provider.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_status(&provider.user(), controller);
    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let user = changes.borrow_and_update().clone();
                print_status(&user, controller);
            }
            line = lines.next_line() => {
                match line?.as_deref().map(str::trim) {
                    Some("reset") => controller.reset_logoff_timeout(None),
                    Some("logoff") => controller.logoff(),
                    Some("status") => print_status(&provider.user(), controller),
                    Some("quit") | None => break,
                    Some("") => {}
                    Some(other) => println!("unknown command: {} (reset, logoff, status, quit)", other),
                }
            }
        }
    }
    Ok(())
}
