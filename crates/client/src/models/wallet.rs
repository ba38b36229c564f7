//! Wallet ledger (`wallet_transactions` table).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swiftdrop_core::{Naira, ProfileId, TransactionId, TransactionKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: TransactionId,
    pub user_id: ProfileId,
    /// Always non-negative; `kind` gives the direction.
    pub amount: Naira,
    pub kind: TransactionKind,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    /// Amount with its sign applied.
    #[must_use]
    pub fn signed_amount(&self) -> Naira {
        match self.kind {
            TransactionKind::Credit => self.amount,
            TransactionKind::Debit => Naira::ZERO - self.amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewWalletTransaction {
    pub user_id: ProfileId,
    pub amount: Naira,
    pub kind: TransactionKind,
    pub description: Option<String>,
    pub reference: Option<String>,
}

/// Credits minus debits.
#[must_use]
pub fn balance(transactions: &[WalletTransaction]) -> Naira {
    transactions.iter().map(WalletTransaction::signed_amount).sum()
}
