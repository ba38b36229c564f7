//! Wallet balance and top-ups.

use serde_json::json;
use swiftdrop_core::{Naira, TransactionKind};
use tracing::instrument;

use super::open_checkout;
use crate::backend::AuthSession;
use crate::db::WalletRepository;
use crate::error::ClientError;
use crate::models::{NewWalletTransaction, WalletTransaction, balance};
use crate::payments::{CheckoutSession, PaymentProvider, PaymentReceipt};
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct WalletService {
    state: AppState,
}

impl WalletService {
    #[must_use]
    pub const fn new(state: AppState) -> Self {
        Self { state }
    }

    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub async fn history(&self, session: &AuthSession) -> Result<Vec<WalletTransaction>, ClientError> {
        let backend = self.state.backend_for(session);
        Ok(WalletRepository::new(&backend).list(session.user.id).await?)
    }

    /// Credits minus debits over the whole ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub async fn balance(&self, session: &AuthSession) -> Result<Naira, ClientError> {
        Ok(balance(&self.history(session).await?))
    }

    /// Start a top-up.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::BadRequest` for a non-positive amount, or a
    /// payment error if the gateway is not configured.
    #[instrument(skip(self, session), fields(user_id = %session.user.id, %provider, %amount))]
    pub fn begin_funding(
        &self,
        provider: PaymentProvider,
        session: &AuthSession,
        amount: Naira,
    ) -> Result<CheckoutSession, ClientError> {
        if !amount.is_positive() {
            return Err(ClientError::BadRequest(
                "Enter an amount greater than zero".to_string(),
            ));
        }
        open_checkout(
            &self.state,
            provider,
            session,
            amount,
            json!({ "purpose": "wallet_funding" }),
        )
    }

    /// Credit a completed top-up to the wallet.
    ///
    /// # Errors
    ///
    /// Returns an error if the credit cannot be recorded. A reference that
    /// was already credited comes back as a repository conflict.
    #[instrument(skip(self, receipt, session), fields(user_id = %session.user.id, reference = %receipt.reference))]
    pub async fn complete_funding(
        &self,
        receipt: &PaymentReceipt,
        session: &AuthSession,
    ) -> Result<WalletTransaction, ClientError> {
        let backend = self.state.backend_for(session);
        let tx = WalletRepository::new(&backend)
            .record(&NewWalletTransaction {
                user_id: session.user.id,
                amount: receipt.amount,
                kind: TransactionKind::Credit,
                description: Some(format!("Wallet funding via {}", receipt.provider)),
                reference: Some(receipt.reference.clone()),
            })
            .await?;
        self.state
            .toasts()
            .success(format!("{} added to your wallet", receipt.amount));
        Ok(tx)
    }
}
