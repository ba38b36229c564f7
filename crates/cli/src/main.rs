//! SwiftDrop CLI - browse, order and deliver from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (password from SWIFTDROP_PASSWORD or --password)
//! swiftdrop auth sign-in -e ada@example.ng
//!
//! # Browse and fill the cart
//! swiftdrop products list
//! swiftdrop cart add <product-id> --quantity 2
//!
//! # Pay, then confirm with the gateway's callback values
//! swiftdrop checkout --provider paystack --address "12 Allen Avenue, Ikeja"
//! swiftdrop checkout confirm --reference PSK_... --status success
//! ```
//!
//! # Commands
//!
//! - `auth` - Sign in, sign up, sign out, show the current user
//! - `products` - List products or watch them change live
//! - `cart` - Add, remove, change quantities, show, clear
//! - `checkout` - Start, confirm or cancel a payment
//! - `orders` - List your orders
//! - `wallet` - Balance and top-ups
//! - `rider` - Bank details, documents and delivery jobs
//! - `subscribe` - Student delivery plans
//! - `admin` - Admin sign-in, orders and document review
//!
//! Every command runs inside the error boundary; pass `--soft-retry` to run a
//! failed command once more before giving up.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use clap::Parser;
use sentry::integrations::tracing as sentry_tracing;
use swiftdrop_client::storage::FileStore;
use swiftdrop_client::{AppState, ClientConfig, Failure};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::Command;

#[derive(Parser)]
#[command(name = "swiftdrop")]
#[command(author, version, about = "SwiftDrop delivery marketplace")]
struct Cli {
    /// Run a failed command once more before giving up
    #[arg(long, global = true)]
    soft_retry: bool,

    #[command(subcommand)]
    command: Command,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Errors and warnings become Sentry events; info and debug become breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Logs go to stderr so command output on stdout stays clean.
///
/// `SWIFTDROP_LOG_FORMAT=json` switches to one JSON object per line.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "swiftdrop=info".into());

    let json = std::env::var("SWIFTDROP_LOG_FORMAT").is_ok_and(|format| format == "json");
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!(error = %e, "Invalid configuration");
            return std::process::ExitCode::FAILURE;
        }
    };

    // Sentry must be initialized before the tracing layer that feeds it
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    let store = Arc::new(FileStore::new(config.storage_path.clone()));
    let state = match AppState::new(config, store) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start client");
            return std::process::ExitCode::FAILURE;
        }
    };

    let boundary = state.boundary().clone();
    let result = if cli.soft_retry {
        boundary
            .guard_with_soft_retry(|| commands::run(&state, &cli.command))
            .await
    } else {
        boundary.guard(commands::run(&state, &cli.command)).await
    };

    commands::show_toasts(&state);
    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(failure) => {
            report_failure(&failure);
            std::process::ExitCode::FAILURE
        }
    }
}

#[allow(clippy::print_stderr)]
fn report_failure(failure: &Failure) {
    let actions: Vec<&str> = failure.actions.iter().map(|a| a.label()).collect();
    eprintln!("  {}", actions.join(" | "));
    eprintln!("  Reload: run the command again. Try again: add --soft-retry.");
    if let Some(event_id) = failure.sentry_event_id {
        eprintln!("  Reference: {event_id}");
    }
}
