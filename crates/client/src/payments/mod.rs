//! Hosted payment checkouts.
//!
//! The client never handles card data. It builds the configuration a gateway's
//! inline checkout needs, hands it to the presentation layer, and waits for
//! the gateway's callback. Both gateways bill in kobo.
//!
//! # Flow
//!
//! 1. [`CheckoutSession::new`] generates a reference and the inline config
//! 2. The presentation layer opens the gateway with that config
//! 3. The gateway's callback arrives as a [`GatewayResponse`]
//! 4. [`CheckoutSession::complete`] checks it and fires `on_success` once,
//!    or [`CheckoutSession::close`] fires `on_close` if the user gave up
//!
//! Payments are not verified server-side here; the gateway's callback is the
//! confirmation.

mod paystack;
mod squad;

pub use paystack::PaystackCheckout;
pub use squad::SquadCheckout;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use swiftdrop_core::{Email, MoneyError, Naira};
use thiserror::Error;

use crate::config::PaymentsConfig;

/// Length of the random part of a payment reference.
const REFERENCE_SUFFIX_LEN: usize = 8;

/// Errors from building or completing a checkout.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("{0} is not configured")]
    NotConfigured(PaymentProvider),

    #[error("Amount must be positive, got {0}")]
    InvalidAmount(Naira),

    #[error(transparent)]
    Money(#[from] MoneyError),

    #[error("Gateway reference {got} does not match {expected}")]
    ReferenceMismatch { expected: String, got: String },

    #[error("Payment was not successful (status: {0})")]
    Declined(String),

    #[error("Paid {paid} but {due} is due")]
    Underpaid { paid: Naira, due: Naira },

    #[error("Checkout already finished")]
    AlreadyFinished,
}

/// Supported payment gateways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    Paystack,
    Squad,
}

impl PaymentProvider {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Paystack => "paystack",
            Self::Squad => "squad",
        }
    }

    /// Prefix of references generated for this gateway.
    #[must_use]
    pub const fn reference_prefix(&self) -> &'static str {
        match self {
            Self::Paystack => "PSK",
            Self::Squad => "SQD",
        }
    }
}

impl std::fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Paystack => "Paystack",
            Self::Squad => "Squad",
        })
    }
}

impl std::str::FromStr for PaymentProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "paystack" => Ok(Self::Paystack),
            "squad" => Ok(Self::Squad),
            other => Err(format!("unknown payment provider: {other}")),
        }
    }
}

/// A fresh payment reference: `<PREFIX>_<unix millis>_<8 alphanumerics>`.
#[must_use]
pub fn generate_reference(provider: PaymentProvider) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(REFERENCE_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!(
        "{}_{}_{suffix}",
        provider.reference_prefix(),
        Utc::now().timestamp_millis()
    )
}

/// What the customer is paying for.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub email: Email,
    pub amount: Naira,
    pub customer_name: Option<String>,
    /// Passed through to the gateway and echoed on its dashboard.
    pub metadata: serde_json::Value,
}

impl CheckoutRequest {
    #[must_use]
    pub fn new(email: Email, amount: Naira) -> Self {
        Self {
            email,
            amount,
            customer_name: None,
            metadata: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn with_customer_name(mut self, name: impl Into<String>) -> Self {
        self.customer_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A gateway that can be opened inline.
pub trait CheckoutProvider: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    /// The object passed to the gateway's inline checkout.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not positive or cannot be billed in kobo.
    fn inline_config(
        &self,
        request: &CheckoutRequest,
        reference: &str,
    ) -> Result<serde_json::Value, PaymentError>;
}

/// Build the checkout for a configured gateway.
///
/// # Errors
///
/// Returns [`PaymentError::NotConfigured`] if the gateway has no public key.
pub fn checkout_provider(
    provider: PaymentProvider,
    config: &PaymentsConfig,
) -> Result<Box<dyn CheckoutProvider>, PaymentError> {
    match provider {
        PaymentProvider::Paystack => config
            .paystack_public_key
            .as_deref()
            .map(|key| Box::new(PaystackCheckout::new(key)) as Box<dyn CheckoutProvider>)
            .ok_or(PaymentError::NotConfigured(provider)),
        PaymentProvider::Squad => config
            .squad_public_key
            .as_deref()
            .map(|key| Box::new(SquadCheckout::new(key)) as Box<dyn CheckoutProvider>)
            .ok_or(PaymentError::NotConfigured(provider)),
    }
}

/// Positive amount in kobo, shared by both gateways.
pub(crate) fn billable_kobo(amount: Naira) -> Result<i64, PaymentError> {
    if !amount.is_positive() {
        return Err(PaymentError::InvalidAmount(amount));
    }
    Ok(amount.to_kobo()?.as_i64())
}

/// The callback payload from a gateway.
///
/// Paystack reports the reference as `reference` (and `trxref`), Squad as
/// `transaction_ref`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trxref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_ref: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GatewayResponse {
    #[must_use]
    pub fn new(reference: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            reference: Some(reference.into()),
            status: status.into(),
            ..Self::default()
        }
    }

    /// The reference, whichever field the gateway used.
    #[must_use]
    pub fn reference(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .or(self.trxref.as_deref())
            .or(self.transaction_ref.as_deref())
    }

    #[must_use]
    pub fn is_successful(&self) -> bool {
        matches!(
            self.status.to_ascii_lowercase().as_str(),
            "success" | "successful"
        )
    }
}

/// Proof of a completed payment, handed to whatever the payment was for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub provider: PaymentProvider,
    pub reference: String,
    pub amount: Naira,
    pub paid_at: DateTime<Utc>,
    #[serde(default)]
    pub gateway_transaction: Option<String>,
}

/// The parts of an open checkout needed to finish it later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCheckout {
    pub provider: PaymentProvider,
    pub reference: String,
    pub amount: Naira,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Open,
    Succeeded,
    Closed,
}

type SuccessCallback = Box<dyn FnOnce(&PaymentReceipt) + Send>;
type CloseCallback = Box<dyn FnOnce() + Send>;

/// One attempt to pay through a gateway.
pub struct CheckoutSession {
    provider: PaymentProvider,
    reference: String,
    amount: Naira,
    config: serde_json::Value,
    state: SessionState,
    on_success: Option<SuccessCallback>,
    on_close: Option<CloseCallback>,
}

impl CheckoutSession {
    /// Start a checkout with a fresh reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway rejects the request (non-positive amount).
    pub fn new(
        checkout: &dyn CheckoutProvider,
        request: &CheckoutRequest,
    ) -> Result<Self, PaymentError> {
        let provider = checkout.provider();
        let reference = generate_reference(provider);
        let config = checkout.inline_config(request, &reference)?;
        tracing::info!(%provider, reference = %reference, amount = %request.amount, "Checkout started");
        Ok(Self {
            provider,
            reference,
            amount: request.amount,
            config,
            state: SessionState::Open,
            on_success: None,
            on_close: None,
        })
    }

    /// Reopen a checkout started elsewhere, e.g. by an earlier process.
    ///
    /// The inline config is not kept, so [`CheckoutSession::config`] is null.
    #[must_use]
    pub fn resume(pending: PendingCheckout) -> Self {
        Self {
            provider: pending.provider,
            reference: pending.reference,
            amount: pending.amount,
            config: serde_json::Value::Null,
            state: SessionState::Open,
            on_success: None,
            on_close: None,
        }
    }

    /// What to keep to [`resume`](Self::resume) this checkout.
    #[must_use]
    pub fn pending(&self) -> PendingCheckout {
        PendingCheckout {
            provider: self.provider,
            reference: self.reference.clone(),
            amount: self.amount,
        }
    }

    /// Register the success callback.
    #[must_use]
    pub fn on_success(mut self, f: impl FnOnce(&PaymentReceipt) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    /// Register the callback for a checkout the user dismissed.
    #[must_use]
    pub fn on_close(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(f));
        self
    }

    #[must_use]
    pub const fn provider(&self) -> PaymentProvider {
        self.provider
    }

    #[must_use]
    pub fn reference(&self) -> &str {
        &self.reference
    }

    #[must_use]
    pub const fn amount(&self) -> Naira {
        self.amount
    }

    /// The inline checkout config for the presentation layer.
    #[must_use]
    pub const fn config(&self) -> &serde_json::Value {
        &self.config
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Handle the gateway's callback.
    ///
    /// A mismatched reference or unsuccessful status leaves the session open
    /// so the customer can try again.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::AlreadyFinished`] after success or close,
    /// [`PaymentError::ReferenceMismatch`] for another checkout's callback, or
    /// [`PaymentError::Declined`] for an unsuccessful payment.
    pub fn complete(&mut self, response: &GatewayResponse) -> Result<PaymentReceipt, PaymentError> {
        if self.state != SessionState::Open {
            return Err(PaymentError::AlreadyFinished);
        }

        let got = response.reference().unwrap_or_default();
        if got != self.reference {
            tracing::warn!(expected = %self.reference, got, "Gateway reference mismatch");
            return Err(PaymentError::ReferenceMismatch {
                expected: self.reference.clone(),
                got: got.to_string(),
            });
        }
        if !response.is_successful() {
            tracing::warn!(reference = %self.reference, status = %response.status, "Payment not successful");
            return Err(PaymentError::Declined(response.status.clone()));
        }

        self.state = SessionState::Succeeded;
        let receipt = PaymentReceipt {
            provider: self.provider,
            reference: self.reference.clone(),
            amount: self.amount,
            paid_at: Utc::now(),
            gateway_transaction: response.transaction.clone(),
        };
        tracing::info!(provider = %self.provider, reference = %self.reference, "Payment succeeded");

        self.on_close = None;
        if let Some(callback) = self.on_success.take() {
            callback(&receipt);
        }
        Ok(receipt)
    }

    /// The customer dismissed the checkout. Returns whether this closed it.
    pub fn close(&mut self) -> bool {
        if self.state != SessionState::Open {
            return false;
        }
        self.state = SessionState::Closed;
        self.on_success = None;
        tracing::info!(reference = %self.reference, "Checkout closed");
        if let Some(callback) = self.on_close.take() {
            callback();
        }
        true
    }
}

impl std::fmt::Debug for CheckoutSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutSession")
            .field("provider", &self.provider)
            .field("reference", &self.reference)
            .field("amount", &self.amount)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn request(amount: i64) -> CheckoutRequest {
        CheckoutRequest::new(Email::parse("ada@example.ng").unwrap(), Naira::from_whole(amount))
    }

    fn session() -> (CheckoutSession, Arc<AtomicU32>, Arc<AtomicU32>) {
        let successes = Arc::new(AtomicU32::new(0));
        let closes = Arc::new(AtomicU32::new(0));
        let s = Arc::clone(&successes);
        let c = Arc::clone(&closes);
        let session = CheckoutSession::new(&PaystackCheckout::new("pk_test_abc"), &request(5_000))
            .unwrap()
            .on_success(move |_| {
                s.fetch_add(1, Ordering::SeqCst);
            })
            .on_close(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        (session, successes, closes)
    }

    #[test]
    fn test_references_are_prefixed_and_unique() {
        let refs: HashSet<String> = (0..200)
            .map(|_| generate_reference(PaymentProvider::Squad))
            .collect();
        assert_eq!(refs.len(), 200);

        let reference = generate_reference(PaymentProvider::Paystack);
        let parts: Vec<&str> = reference.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "PSK");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), REFERENCE_SUFFIX_LEN);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_success_fires_once() {
        let (mut session, successes, closes) = session();
        let response = GatewayResponse::new(session.reference(), "success");

        let receipt = session.complete(&response).unwrap();
        assert_eq!(receipt.amount, Naira::from_whole(5_000));
        assert_eq!(receipt.provider, PaymentProvider::Paystack);

        assert!(matches!(
            session.complete(&response),
            Err(PaymentError::AlreadyFinished)
        ));
        assert!(!session.close());
        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_mismatch_and_decline_keep_session_open() {
        let (mut session, successes, _) = session();

        let wrong = GatewayResponse::new("PSK_0_other", "success");
        assert!(matches!(
            session.complete(&wrong),
            Err(PaymentError::ReferenceMismatch { .. })
        ));

        let declined = GatewayResponse::new(session.reference(), "failed");
        assert!(matches!(
            session.complete(&declined),
            Err(PaymentError::Declined(ref s)) if s == "failed"
        ));

        assert!(session.is_open());
        assert_eq!(successes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_close_fires_once() {
        let (mut session, successes, closes) = session();
        assert!(session.close());
        assert!(!session.close());

        let response = GatewayResponse::new(session.reference(), "success");
        assert!(session.complete(&response).is_err());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(successes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_resumed_session_completes() {
        let (session, _, _) = session();
        let pending = session.pending();
        let stored = serde_json::to_string(&pending).unwrap();

        let mut resumed = CheckoutSession::resume(serde_json::from_str(&stored).unwrap());
        assert!(resumed.config().is_null());
        let receipt = resumed
            .complete(&GatewayResponse::new(&pending.reference, "success"))
            .unwrap();
        assert_eq!(receipt.reference, pending.reference);
        assert_eq!(receipt.amount, Naira::from_whole(5_000));
    }

    #[test]
    fn test_gateway_callback_shapes() {
        let paystack: GatewayResponse = serde_json::from_str(
            r#"{"reference":"PSK_1_a","trans":"4099","status":"success","message":"Approved","transaction":"4099","trxref":"PSK_1_a"}"#,
        )
        .unwrap();
        assert_eq!(paystack.reference(), Some("PSK_1_a"));
        assert!(paystack.is_successful());

        let squad: GatewayResponse =
            serde_json::from_str(r#"{"transaction_ref":"SQD_1_b","status":"Successful"}"#).unwrap();
        assert_eq!(squad.reference(), Some("SQD_1_b"));
        assert!(squad.is_successful());
    }

    #[test]
    fn test_checkout_provider_requires_key() {
        let config = PaymentsConfig {
            paystack_public_key: Some("pk_test_abc".to_string()),
            squad_public_key: None,
        };
        assert_eq!(
            checkout_provider(PaymentProvider::Paystack, &config)
                .unwrap()
                .provider(),
            PaymentProvider::Paystack
        );
        assert!(matches!(
            checkout_provider(PaymentProvider::Squad, &config),
            Err(PaymentError::NotConfigured(PaymentProvider::Squad))
        ));
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("Squad".parse::<PaymentProvider>().unwrap(), PaymentProvider::Squad);
        assert!("flutterwave".parse::<PaymentProvider>().is_err());
    }
}
