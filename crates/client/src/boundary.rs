//! Top-level error boundary.
//!
//! Every user-triggered operation runs through [`ErrorBoundary::guard`]. A
//! returned error or a panic becomes a [`Failure`]: the user sees a short
//! message and can either reload or retry the operation in place.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::backend::AuthError;
use crate::error::ClientError;
use crate::notify::Toasts;
use crate::session::SessionFlags;

/// What the user can do after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Start over from a clean screen.
    Reload,
    /// Run the same operation again without resetting anything.
    SoftRetry,
}

impl RecoveryAction {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Reload => "Reload",
            Self::SoftRetry => "Try again",
        }
    }
}

/// A caught failure, ready to show.
#[derive(Debug)]
pub struct Failure {
    pub message: String,
    pub actions: [RecoveryAction; 2],
    pub sentry_event_id: Option<sentry::types::Uuid>,
    pub error: ClientError,
}

#[derive(Debug, Clone)]
pub struct ErrorBoundary {
    flags: SessionFlags,
    toasts: Toasts,
}

impl ErrorBoundary {
    #[must_use]
    pub const fn new(flags: SessionFlags, toasts: Toasts) -> Self {
        Self { flags, toasts }
    }

    /// Run `op`, turning an error or a panic into a [`Failure`].
    ///
    /// # Errors
    ///
    /// Returns the [`Failure`] when `op` fails or panics.
    pub async fn guard<T, F>(&self, op: F) -> Result<T, Failure>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        match AssertUnwindSafe(op).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(self.fail(err)),
            Err(payload) => Err(self.fail(ClientError::Panic(panic_message(payload.as_ref())))),
        }
    }

    /// Like [`guard`](Self::guard), but runs the operation once more if the
    /// first attempt fails.
    ///
    /// # Errors
    ///
    /// Returns the [`Failure`] of the second attempt.
    pub async fn guard_with_soft_retry<T, F, Fut>(&self, mut op: F) -> Result<T, Failure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        match self.guard(op()).await {
            Ok(value) => Ok(value),
            Err(first) => {
                tracing::info!(error = %first.error, "Soft retry after failure");
                self.guard(op()).await
            }
        }
    }

    fn fail(&self, error: ClientError) -> Failure {
        let session_expired = self.flags.has_auth_error();
        self.flags.clear_auth_error();

        let sentry_event_id = match &error {
            // the panic integration has already captured it
            ClientError::Panic(msg) => {
                tracing::error!(panic = %msg, "Operation panicked");
                sentry::last_event_id()
            }
            other => other.report(),
        };

        // a rejected refresh dropped the session earlier in this run
        let message = if session_expired
            && matches!(error, ClientError::Auth(AuthError::NotSignedIn))
        {
            ClientError::Auth(AuthError::SessionExpired).user_message()
        } else {
            error.user_message()
        };
        self.toasts.error(message.clone());

        Failure {
            message,
            actions: [RecoveryAction::Reload, RecoveryAction::SoftRetry],
            sentry_event_id,
            error,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
