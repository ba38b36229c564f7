//! Wallet ledger repository.

use swiftdrop_core::ProfileId;
use tracing::instrument;

use super::RepositoryError;
use crate::backend::{BackendClient, Direction, Query};
use crate::models::{NewWalletTransaction, WalletTransaction};

const TABLE: &str = "wallet_transactions";

/// Repository for wallet transactions. The ledger is append-only.
pub struct WalletRepository<'a> {
    client: &'a BackendClient,
}

impl<'a> WalletRepository<'a> {
    #[must_use]
    pub const fn new(client: &'a BackendClient) -> Self {
        Self { client }
    }

    /// A user's transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the request fails.
    pub async fn list(&self, user: ProfileId) -> Result<Vec<WalletTransaction>, RepositoryError> {
        Ok(self
            .client
            .select(
                &Query::table(TABLE)
                    .eq("user_id", user)
                    .order("created_at", Direction::Desc),
            )
            .await?)
    }

    /// Append a transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` for a non-positive amount and
    /// `RepositoryError::Conflict` if the reference was already recorded.
    #[instrument(skip(self, tx), fields(user_id = %tx.user_id, kind = %tx.kind, amount = %tx.amount))]
    pub async fn record(
        &self,
        tx: &NewWalletTransaction,
    ) -> Result<WalletTransaction, RepositoryError> {
        if !tx.amount.is_positive() {
            return Err(RepositoryError::Invalid(format!(
                "transaction amount must be positive, got {}",
                tx.amount
            )));
        }
        Ok(self.client.insert_one(TABLE, tx).await?)
    }
}
