//! Rider payout details and verification documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swiftdrop_core::{DocumentId, DocumentKind, DocumentStatus, ProfileId};
use thiserror::Error;

/// Errors that can occur when parsing an [`AccountNumber`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountNumberError {
    #[error("account number must be exactly 10 digits, got {0}")]
    WrongLength(usize),
    #[error("account number must contain only digits")]
    NotNumeric,
}

/// A ten-digit NUBAN bank account number.
///
/// Spaces are stripped; leading zeros are significant, so the value is kept
/// as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountNumber(String);

impl AccountNumber {
    pub const LENGTH: usize = 10;

    /// Parse an account number.
    ///
    /// # Errors
    ///
    /// Returns an error unless the input is ten digits once spaces are removed.
    pub fn parse(s: &str) -> Result<Self, AccountNumberError> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        if !compact.chars().all(|c| c.is_ascii_digit()) {
            return Err(AccountNumberError::NotNumeric);
        }
        if compact.len() != Self::LENGTH {
            return Err(AccountNumberError::WrongLength(compact.len()));
        }
        Ok(Self(compact))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last four digits, for display.
    #[must_use]
    pub fn masked(&self) -> String {
        let tail = self.0.get(Self::LENGTH - 4..).unwrap_or_default();
        format!("******{tail}")
    }
}

impl std::fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AccountNumber {
    type Error = AccountNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AccountNumber> for String {
    fn from(account: AccountNumber) -> Self {
        account.0
    }
}

/// Where a rider's earnings are paid out. One row per rider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiderBankDetails {
    pub rider_id: ProfileId,
    pub bank_name: String,
    pub account_number: AccountNumber,
    pub account_name: String,
}

/// A verification document uploaded by a rider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiderDocument {
    pub id: DocumentId,
    pub rider_id: ProfileId,
    pub kind: DocumentKind,
    pub file_url: String,
    pub status: DocumentStatus,
    /// Reviewer's note, usually the reason for a rejection.
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRiderDocument {
    pub rider_id: ProfileId,
    pub kind: DocumentKind,
    pub file_url: String,
    pub status: DocumentStatus,
}
