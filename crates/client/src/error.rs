//! Unified error handling with Sentry integration.
//!
//! Provides a unified `ClientError` type. Every user-facing operation returns
//! `Result<T, ClientError>`; the error boundary turns failures into a short
//! notification and reports the unexpected ones to Sentry.

use swiftdrop_core::MoneyError;
use thiserror::Error;

use crate::backend::{AuthError, BackendError};
use crate::config::ConfigError;
use crate::db::RepositoryError;
use crate::payments::PaymentError;
use crate::session::AddressError;
use crate::storage::StorageError;

/// Client-level error type.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Hosted backend request failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Repository operation failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Local storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Checkout failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Configuration is missing or invalid.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Amount could not be converted.
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    /// Delivery address rejected.
    #[error("Address error: {0}")]
    Address(#[from] AddressError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not signed in or lacks the role.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad input from the user.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An operation panicked.
    #[error("Panic: {0}")]
    Panic(String),
}

impl ClientError {
    /// Whether this is our fault (or the backend's) rather than the user's.
    ///
    /// These are the errors worth a Sentry event.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        match self {
            Self::Backend(err) | Self::Auth(AuthError::Backend(err)) => !matches!(
                err,
                BackendError::Unauthorized(_) | BackendError::NotFound(_) | BackendError::RateLimited(_)
            ),
            Self::Repository(err) => matches!(
                err,
                RepositoryError::Backend(_) | RepositoryError::DataCorruption(_)
            ),
            Self::Storage(_) | Self::Config(_) | Self::Money(_) | Self::Auth(AuthError::Storage(_)) => {
                true
            }
            _ => false,
        }
    }

    /// Capture to Sentry if this is an internal error.
    ///
    /// Panics are left to the panic integration, which has already seen them.
    pub fn report(&self) -> Option<sentry::types::Uuid> {
        if !self.is_internal() {
            return None;
        }
        let event_id = sentry::capture_error(self);
        tracing::error!(
            error = %self,
            sentry_event_id = %event_id,
            "Operation failed"
        );
        Some(event_id)
    }

    /// Short text for a notification.
    ///
    /// Don't expose internal error details to users.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Backend(BackendError::RateLimited(secs)) => {
                format!("Too many requests, try again in {secs} seconds")
            }
            Self::Backend(BackendError::Unauthorized(_)) => {
                "You don't have access to that. Try signing in again".to_string()
            }
            Self::Backend(BackendError::NotFound(_)) => "Not found".to_string(),
            Self::Backend(_) => "Couldn't reach SwiftDrop. Check your connection".to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid email or password".to_string(),
                AuthError::SessionExpired => "Your session expired. Please sign in again".to_string(),
                AuthError::NotSignedIn => "Please sign in first".to_string(),
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::Email(_) => "Invalid email address".to_string(),
                _ => "Authentication error".to_string(),
            },
            Self::Repository(err) => match err {
                RepositoryError::NotFound => "Not found".to_string(),
                RepositoryError::Conflict(_) => "That has already been done".to_string(),
                RepositoryError::Invalid(msg) => msg.clone(),
                RepositoryError::Backend(BackendError::Unauthorized(_)) => {
                    "You don't have access to that".to_string()
                }
                _ => "Something went wrong. Please try again".to_string(),
            },
            Self::Payment(err) => match err {
                PaymentError::NotConfigured(provider) => {
                    format!("{provider} payments are not available right now")
                }
                PaymentError::InvalidAmount(_) => "Nothing to pay for".to_string(),
                PaymentError::Declined(_) => "Payment was not successful".to_string(),
                PaymentError::Underpaid { .. } => {
                    "Your cart changed after payment. Check out again".to_string()
                }
                PaymentError::ReferenceMismatch { .. } => {
                    "Payment could not be matched to this checkout".to_string()
                }
                PaymentError::AlreadyFinished => "This checkout is already finished".to_string(),
                PaymentError::Money(_) => "Amount is too large".to_string(),
            },
            Self::Address(AddressError::Blank) => "Please enter a delivery address".to_string(),
            Self::Storage(_) | Self::Address(_) => "Couldn't save your changes locally".to_string(),
            Self::Config(_) | Self::Money(_) | Self::Panic(_) => {
                "Something went wrong. Please try again".to_string()
            }
            Self::NotFound(what) => format!("{what} not found"),
            Self::Unauthorized(msg) | Self::BadRequest(msg) => msg.clone(),
        }
    }
}

/// Result type alias for `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added product", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
