//! Checkout commands.
//!
//! A terminal cannot host the gateway's inline popup, so checkout is split
//! across two invocations: `checkout` prints the inline config and remembers
//! the open payment, and `checkout confirm` feeds the gateway's callback
//! values back in.

use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};
use swiftdrop_client::payments::{
    CheckoutSession, GatewayResponse, PaymentProvider, PaymentReceipt, PendingCheckout,
};
use swiftdrop_client::storage::{JsonStoreExt, keys};
use swiftdrop_client::{AppState, ClientError};
use swiftdrop_core::StudentPlan;

use super::session;

#[derive(Args)]
#[command(args_conflicts_with_subcommands = true)]
pub struct CheckoutArgs {
    #[command(subcommand)]
    action: Option<CheckoutAction>,

    /// paystack or squad
    #[arg(long, default_value = "paystack")]
    provider: PaymentProvider,

    /// Delivery address; defaults to the one used last time
    #[arg(long)]
    address: Option<String>,
}

#[derive(Subcommand)]
pub enum CheckoutAction {
    /// Finish the open payment with the gateway's callback
    Confirm {
        #[arg(long)]
        reference: String,
        /// Status reported by the gateway, e.g. `success`
        #[arg(long)]
        status: String,
        /// Gateway transaction id, if it gave one
        #[arg(long)]
        transaction: Option<String>,
    },
    /// Abandon the open payment
    Cancel,
}

/// What an open payment is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Purpose {
    Order { address: String },
    WalletFunding,
    Subscription { plan: StudentPlan },
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenPayment {
    checkout: PendingCheckout,
    purpose: Purpose,
}

pub async fn run(state: &AppState, args: &CheckoutArgs) -> Result<(), ClientError> {
    match &args.action {
        None => start(state, args).await,
        Some(CheckoutAction::Confirm {
            reference,
            status,
            transaction,
        }) => {
            let mut response = GatewayResponse::new(reference.clone(), status.clone());
            response.transaction.clone_from(transaction);
            confirm(state, &response).await
        }
        Some(CheckoutAction::Cancel) => {
            let Some(open) = load(state)? else {
                state.toasts().info("No payment in progress");
                return Ok(());
            };
            CheckoutSession::resume(open.checkout).close();
            state.store().remove(keys::PENDING_CHECKOUT)?;
            state.toasts().info("Payment cancelled");
            Ok(())
        }
    }
}

async fn start(state: &AppState, args: &CheckoutArgs) -> Result<(), ClientError> {
    let session = session(state).await?;
    let address = match &args.address {
        Some(address) => address.trim().to_string(),
        None => state.address_book().load(&session.user.id).unwrap_or_default(),
    };
    if address.is_empty() {
        return Err(ClientError::BadRequest(
            "Pass --address; there is no saved delivery address yet".to_string(),
        ));
    }

    let cart = state.cart();
    let checkout = state.checkout().begin(args.provider, &cart, &session)?;
    remember(state, &checkout, Purpose::Order { address })?;
    Ok(())
}

/// Save the open payment and print what the gateway needs.
///
/// # Errors
///
/// Returns a storage error if the payment cannot be saved.
pub fn remember(
    state: &AppState,
    checkout: &CheckoutSession,
    purpose: Purpose,
) -> Result<(), ClientError> {
    state.store().set_json(
        keys::PENDING_CHECKOUT,
        &OpenPayment {
            checkout: checkout.pending(),
            purpose,
        },
    )?;

    println!("Pay {} with {}", checkout.amount(), checkout.provider());
    println!(
        "{}",
        serde_json::to_string_pretty(checkout.config()).unwrap_or_default()
    );
    println!();
    println!(
        "Then run: swiftdrop checkout confirm --reference {} --status <status>",
        checkout.reference()
    );
    Ok(())
}

fn load(state: &AppState) -> Result<Option<OpenPayment>, ClientError> {
    Ok(state.store().get_json::<OpenPayment>(keys::PENDING_CHECKOUT)?)
}

async fn confirm(state: &AppState, response: &GatewayResponse) -> Result<(), ClientError> {
    let open = load(state)?
        .ok_or_else(|| ClientError::BadRequest("No payment in progress".to_string()))?;
    // the open payment stays saved until fulfilment succeeds
    let receipt = CheckoutSession::resume(open.checkout).complete(response)?;
    fulfil(state, &receipt, &open.purpose).await?;
    state.store().remove(keys::PENDING_CHECKOUT)?;
    Ok(())
}

async fn fulfil(
    state: &AppState,
    receipt: &PaymentReceipt,
    purpose: &Purpose,
) -> Result<(), ClientError> {
    let session = session(state).await?;
    match purpose {
        Purpose::Order { address } => {
            let mut cart = state.cart();
            let orders = state
                .checkout()
                .finalize(receipt, &mut cart, &session, address)
                .await?;
            for order in &orders {
                println!("{}  {}  {}", order.id, order.status.badge(), order.total);
            }
        }
        Purpose::WalletFunding => {
            state.wallet().complete_funding(receipt, &session).await?;
        }
        Purpose::Subscription { plan } => {
            state
                .subscriptions()
                .activate(receipt, *plan, &session)
                .await?;
        }
    }
    Ok(())
}
