//! Table repositories over the hosted backend.
//!
//! The backend is the source of truth and enforces access with row-level
//! policies, so every repository borrows a [`BackendClient`] that is either
//! anonymous or bound to the signed-in user.
//!
//! ## Tables
//!
//! - `profiles` - One row per auth user, with their role
//! - `products` - Vendor listings
//! - `orders` - One row per customer order per vendor
//! - `deliveries` - Rider jobs
//! - `wallet_transactions` - Credit/debit ledger
//! - `rider_bank_details` / `rider_documents` - Rider payouts and verification
//! - `student_subscriptions` - Student delivery plans

pub mod deliveries;
pub mod orders;
pub mod products;
pub mod profiles;
pub mod riders;
pub mod subscriptions;
pub mod wallet;

pub use deliveries::DeliveryRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use profiles::ProfileRepository;
pub use riders::RiderRepository;
pub use subscriptions::SubscriptionRepository;
pub use wallet::WalletRepository;

use thiserror::Error;

use crate::backend::BackendError;

/// Postgres unique-violation code, as reported in REST error bodies.
const UNIQUE_VIOLATION: &str = "23505";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Backend request failed.
    #[error("backend error: {0}")]
    Backend(BackendError),

    /// A row came back in an unexpected shape.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested row was not found (or is hidden by a policy).
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate payment reference).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Rejected before reaching the backend.
    #[error("invalid input: {0}")]
    Invalid(String),
}

impl From<BackendError> for RepositoryError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Api {
                code: Some(ref code),
                ref message,
                ..
            } if code == UNIQUE_VIOLATION => Self::Conflict(message.clone()),
            BackendError::Parse(message) => Self::DataCorruption(message),
            other => Self::Backend(other),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    #![allow(clippy::unwrap_used)]

    use std::time::Duration;

    use httpmock::MockServer;

    use crate::backend::BackendClient;
    use crate::config::{BackendConfig, ClientConfig};

    pub(crate) fn backend(server: &MockServer) -> BackendClient {
        let mut config = ClientConfig::new(BackendConfig::new(
            url::Url::parse(&server.base_url()).unwrap(),
            "anon-key",
        ));
        config.retry_delay = Duration::from_millis(1);
        BackendClient::new(&config).unwrap()
    }

    pub(crate) const VENDOR_ID: &str = "0b7f6a52-8f4e-4c57-9d7e-2f0d3b8c1a01";
    pub(crate) const CUSTOMER_ID: &str = "5f0c7c1e-2d7a-4c1b-9a51-0c3f1e9b6a11";
    pub(crate) const RIDER_ID: &str = "9d2e4b7a-1c3f-4e5a-8b6d-7f0a1b2c3d4e";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_is_conflict() {
        let err = RepositoryError::from(BackendError::Api {
            status: 409,
            code: Some("23505".to_string()),
            message: "duplicate key".to_string(),
        });
        assert!(matches!(err, RepositoryError::Conflict(ref m) if m == "duplicate key"));
    }

    #[test]
    fn test_parse_error_is_corruption() {
        let err = RepositoryError::from(BackendError::Parse("bad row".to_string()));
        assert!(matches!(err, RepositoryError::DataCorruption(_)));

        let err = RepositoryError::from(BackendError::RateLimited(5));
        assert!(matches!(err, RepositoryError::Backend(BackendError::RateLimited(5))));
    }
}
