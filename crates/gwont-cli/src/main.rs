//! gwont - command line companion for the Gwont backend.
//!
//! Saves the administrator credential, selects the avatar to act as,
//! prints bearer tokens for scripting and exports captured game pages.

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gwont_core::{
    AdminApi, AdminSecret, AuthError, Config, ExportError, ExportOutcome, IdentitySelector,
    MissingCredential, PageCapture, PageExporter, SessionManager, SkipReason, Tier, TierState,
    TokenResolution,
};

/// Log file name prefix inside the configured log directory
const LOG_FILE_PREFIX: &str = "gwont.log";

/// Exit code when the user has to configure something first
const EXIT_NEEDS_CONFIGURATION: u8 = 2;

#[derive(Parser)]
#[command(name = "gwont", version, about = "Export game pages to Gwont")]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the API host from the config file
    #[arg(long, global = true, env = "GWONT_API_HOST")]
    api_host: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Save the administrator credential (API key, or username and password)
    Configure {
        /// API key; prompted for when neither this nor --username is given
        #[arg(long, env = "GWONT_API_KEY", conflicts_with = "username")]
        api_key: Option<String>,

        /// Admin username; the password is prompted for
        #[arg(long)]
        username: Option<String>,
    },

    /// Select the avatar to act as
    Select {
        #[arg(required_unless_present = "clear")]
        name: Option<String>,

        #[arg(required_unless_present = "clear")]
        host: Option<String>,

        /// Clear the current selection
        #[arg(long, conflicts_with_all = ["name", "host"])]
        clear: bool,
    },

    /// Resolve and print a bearer token
    Token {
        #[arg(value_enum)]
        tier: TierArg,
    },

    /// Show token and identity state
    Status,

    /// Export a saved game page
    Export {
        /// URL the page was captured from
        #[arg(long)]
        url: String,

        /// File containing the page HTML
        #[arg(long)]
        html: PathBuf,

        /// Avatar name shown on the page
        #[arg(long)]
        name: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TierArg {
    Admin,
    Refresh,
    User,
}

impl From<TierArg> for Tier {
    fn from(arg: TierArg) -> Self {
        match arg {
            TierArg::Admin => Tier::AdminAccess,
            TierArg::Refresh => Tier::AdminRefresh,
            TierArg::User => Tier::DelegatedUser,
        }
    }
}

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr, and also to a daily file when `log_dir` is set. The
/// returned guard flushes the file writer and must live until exit.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(host) = cli.api_host {
        config.api_host = host;
    }

    let _log_guard = init_tracing(config.log_dir.as_deref());
    info!(api_host = %config.api_host, "gwont starting");

    let client = config.api_client()?;
    let store = config.credential_store()?;
    let session = Arc::new(
        SessionManager::restored(client.clone(), store)
            .await
            .context("Failed to restore session")?,
    );

    let code = match cli.command {
        Command::Configure { api_key, username } => {
            let secret = match (api_key, username) {
                (_, Some(username)) => {
                    let password = rpassword::prompt_password("Password: ")?;
                    AdminSecret::Password { username, password }
                }
                (Some(key), None) => AdminSecret::ApiKey(key),
                (None, None) => AdminSecret::ApiKey(rpassword::prompt_password("API key: ")?),
            };
            session
                .save_admin_secret(&secret)
                .await
                .context("Failed to save credential")?;
            eprintln!("Credential saved.");
            ExitCode::SUCCESS
        }

        Command::Select { name, host, clear } => {
            let selector = match (name, host) {
                (Some(name), Some(host)) if !clear => Some(IdentitySelector::new(name, host)),
                _ => None,
            };
            session.select_identity(selector.clone()).await?;
            match selector {
                Some(identity) => eprintln!("Selected {}.", identity),
                None => eprintln!("Selection cleared."),
            }
            ExitCode::SUCCESS
        }

        Command::Token { tier } => match session.resolve_token(tier.into()).await {
            Ok(TokenResolution::Token(token)) => {
                println!("{}", token);
                ExitCode::SUCCESS
            }
            Ok(TokenResolution::NoTokenAvailable(missing)) => needs_configuration(missing),
            Err(AuthError::NoTokenAvailable(missing)) => needs_configuration(missing),
            Err(e) => return Err(e.into()),
        },

        Command::Status => {
            print_status(&session).await?;
            ExitCode::SUCCESS
        }

        Command::Export { url, html, name } => {
            let html = std::fs::read_to_string(&html)
                .with_context(|| format!("Failed to read {}", html.display()))?;
            let admin = AdminApi::new(
                client,
                Arc::clone(&session),
                config.send_unauthenticated_if_no_token,
            );
            let exporter = PageExporter::new(admin, Arc::clone(&session), &config.site_domain);

            match exporter.export(PageCapture { html, url }, Some(&name)).await {
                Ok(ExportOutcome::Submitted { status }) if (200..300).contains(&status) => {
                    eprintln!("Page exported.");
                    ExitCode::SUCCESS
                }
                Ok(ExportOutcome::Submitted { status }) => {
                    anyhow::bail!("Export rejected by server (status {})", status);
                }
                Ok(ExportOutcome::Skipped(SkipReason::EmptyPage)) => {
                    eprintln!("Nothing to export: the page is empty.");
                    ExitCode::SUCCESS
                }
                Ok(ExportOutcome::Skipped(SkipReason::ForeignSite)) => {
                    eprintln!("Not a {} page, nothing exported.", config.site_domain);
                    ExitCode::SUCCESS
                }
                Ok(ExportOutcome::NeedsConfiguration) => {
                    needs_configuration(MissingCredential::AdminSecret)
                }
                Err(ExportError::Auth(AuthError::NoTokenAvailable(missing))) => {
                    needs_configuration(missing)
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    info!("gwont finished");
    Ok(code)
}

/// Point the user at the command that fixes `missing`.
fn needs_configuration(missing: MissingCredential) -> ExitCode {
    let hint = match missing {
        MissingCredential::AdminSecret => "run `gwont configure` to save an API key",
        MissingCredential::IdentitySelection => "run `gwont select NAME HOST` to pick an avatar",
    };
    eprintln!("No token available: {}; {}.", missing, hint);
    ExitCode::from(EXIT_NEEDS_CONFIGURATION)
}

async fn print_status(session: &SessionManager) -> Result<()> {
    let configured = session.has_admin_secret().await?;
    eprintln!(
        "Admin credential: {}",
        if configured { "configured" } else { "missing" }
    );
    eprintln!(
        "Avatar:           {}",
        session
            .current_identity()
            .await
            .map(|i| i.to_string())
            .unwrap_or_else(|| "none".to_string())
    );

    for (label, tier) in [
        ("Admin access", Tier::AdminAccess),
        ("Admin refresh", Tier::AdminRefresh),
        ("Avatar access", Tier::DelegatedUser),
    ] {
        eprintln!("{:<17} {}", format!("{}:", label), describe(session.tier_state(tier).await));
    }
    Ok(())
}

fn describe(state: TierState) -> String {
    match state {
        TierState::Absent => "absent".to_string(),
        TierState::Expired {
            expired_at: Some(at),
        } => format!("expired {}", at.with_timezone(&Local).format("%Y-%m-%d %H:%M")),
        TierState::Expired { expired_at: None } => "invalid (no expiry)".to_string(),
        TierState::Valid { expires_at } => format!(
            "valid until {}",
            expires_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        ),
    }
}
