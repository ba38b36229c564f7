//! Flows that span the backend, the payment gateways and local state.
//!
//! Each service is a thin handle over [`AppState`]. A payment flow is split
//! in two: `begin` hands back a [`CheckoutSession`](crate::payments::CheckoutSession)
//! for the presentation layer to open, and a second call turns the gateway's
//! [`PaymentReceipt`](crate::payments::PaymentReceipt) into backend rows.

mod admin;
mod checkout;
mod subscription;
mod wallet;

pub use admin::AdminService;
pub use checkout::{CheckoutQuote, CheckoutService};
pub use subscription::SubscriptionService;
pub use wallet::WalletService;

use swiftdrop_core::Email;

use crate::backend::{AuthError, AuthSession};
use crate::error::ClientError;
use crate::payments::{CheckoutRequest, CheckoutSession, PaymentProvider, checkout_provider};
use crate::state::AppState;

/// The address receipts are sent to.
fn customer_email(session: &AuthSession) -> Result<Email, ClientError> {
    let raw = session
        .user
        .email
        .as_deref()
        .ok_or_else(|| ClientError::BadRequest("Your account has no email address".to_string()))?;
    Ok(Email::parse(raw).map_err(AuthError::from)?)
}

/// Open a checkout for `amount` with the configured gateway.
fn open_checkout(
    state: &AppState,
    provider: PaymentProvider,
    session: &AuthSession,
    amount: swiftdrop_core::Naira,
    metadata: serde_json::Value,
) -> Result<CheckoutSession, ClientError> {
    let gateway = checkout_provider(provider, &state.config().payments)?;
    let mut request = CheckoutRequest::new(customer_email(session)?, amount).with_metadata(metadata);
    if let Some(name) = session.user.full_name.as_deref() {
        request = request.with_customer_name(name);
    }
    Ok(CheckoutSession::new(gateway.as_ref(), &request)?)
}
