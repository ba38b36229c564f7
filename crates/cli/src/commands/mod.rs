//! CLI subcommands.
//!
//! Commands print their results to stdout; logs go to stderr.

#![allow(clippy::print_stdout)]

pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod products;
pub mod rider;
pub mod subscribe;
pub mod wallet;

use clap::Subcommand;
use secrecy::SecretString;
use swiftdrop_client::backend::{AuthError, AuthSession};
use swiftdrop_client::notify::ToastLevel;
use swiftdrop_client::{AppState, ClientError};
use swiftdrop_core::Email;

#[derive(Subcommand)]
pub enum Command {
    /// Sign in, sign up and sign out
    Auth {
        #[command(subcommand)]
        action: auth::AuthAction,
    },
    /// Browse products
    Products {
        #[command(subcommand)]
        action: products::ProductsAction,
    },
    /// Manage the shopping cart
    Cart {
        #[command(subcommand)]
        action: cart::CartAction,
    },
    /// Pay for the cart
    Checkout(checkout::CheckoutArgs),
    /// Your orders
    Orders {
        #[command(subcommand)]
        action: orders::OrdersAction,
    },
    /// Wallet balance and top-ups
    Wallet {
        #[command(subcommand)]
        action: wallet::WalletAction,
    },
    /// Rider payouts, documents and jobs
    Rider {
        #[command(subcommand)]
        action: rider::RiderAction,
    },
    /// Buy a student delivery plan
    Subscribe(subscribe::SubscribeArgs),
    /// Admin area
    Admin {
        #[command(subcommand)]
        action: admin::AdminAction,
    },
}

/// Run one command.
///
/// # Errors
///
/// Returns whatever the command failed with; the caller's error boundary
/// turns it into a message.
pub async fn run(state: &AppState, command: &Command) -> Result<(), ClientError> {
    match command {
        Command::Auth { action } => auth::run(state, action).await,
        Command::Products { action } => products::run(state, action).await,
        Command::Cart { action } => cart::run(state, action).await,
        Command::Checkout(args) => checkout::run(state, args).await,
        Command::Orders { action } => orders::run(state, action).await,
        Command::Wallet { action } => wallet::run(state, action).await,
        Command::Rider { action } => rider::run(state, action).await,
        Command::Subscribe(args) => subscribe::run(state, args).await,
        Command::Admin { action } => admin::run(state, action).await,
    }
}

/// Print and discard the queued notifications.
pub fn show_toasts(state: &AppState) {
    for toast in state.toasts().drain() {
        let marker = match toast.level {
            ToastLevel::Info => "i",
            ToastLevel::Success => "✓",
            ToastLevel::Error => "✗",
        };
        println!("{marker} {}", toast.message);
    }
}

/// The signed-in user's session.
async fn session(state: &AppState) -> Result<AuthSession, ClientError> {
    Ok(state.auth().require_session().await?)
}

fn parse_email(raw: &str) -> Result<Email, ClientError> {
    Ok(Email::parse(raw).map_err(AuthError::from)?)
}

fn password(raw: &str) -> SecretString {
    SecretString::from(raw.to_string())
}

/// Cut `s` to `max` characters for table output.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut cut: String = s.chars().take(max.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}
