//! Wallet commands.

use clap::Subcommand;
use rust_decimal::Decimal;
use swiftdrop_client::payments::PaymentProvider;
use swiftdrop_client::{AppState, ClientError};
use swiftdrop_core::{Naira, TransactionKind};

use super::checkout::{Purpose, remember};
use super::{session, truncate};

const HISTORY_LINES: usize = 10;

#[derive(Subcommand)]
pub enum WalletAction {
    /// Show the balance and recent transactions
    Balance,
    /// Top up the wallet
    Fund {
        /// Amount in naira
        amount: Decimal,
        /// paystack or squad
        #[arg(long, default_value = "paystack")]
        provider: PaymentProvider,
    },
}

pub async fn run(state: &AppState, action: &WalletAction) -> Result<(), ClientError> {
    let session = session(state).await?;
    match action {
        WalletAction::Balance => {
            let history = state.wallet().history(&session).await?;
            println!(
                "Balance: {}",
                swiftdrop_client::models::balance(&history)
            );
            for tx in history.iter().take(HISTORY_LINES) {
                let sign = match tx.kind {
                    TransactionKind::Credit => '+',
                    TransactionKind::Debit => '-',
                };
                println!(
                    "  {}  {sign}{:>12}  {}",
                    tx.created_at.format("%d %b %Y"),
                    tx.amount.to_string(),
                    truncate(tx.description.as_deref().unwrap_or(""), 40)
                );
            }
        }
        WalletAction::Fund { amount, provider } => {
            let checkout = state
                .wallet()
                .begin_funding(*provider, &session, Naira::new(*amount))?;
            remember(state, &checkout, Purpose::WalletFunding)?;
        }
    }
    Ok(())
}
