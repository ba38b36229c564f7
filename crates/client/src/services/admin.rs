//! Admin sign-in and the admin-only views.

use secrecy::SecretString;
use swiftdrop_core::{DocumentId, DocumentStatus, Email, Role};
use tracing::instrument;

use crate::backend::AuthSession;
use crate::db::{OrderRepository, RiderRepository};
use crate::error::{ClientError, clear_sentry_user, set_sentry_user};
use crate::models::{Order, RiderDocument};
use crate::state::AppState;

const ADMIN_ORDER_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct AdminService {
    state: AppState,
}

impl AdminService {
    #[must_use]
    pub const fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Sign in to the admin area.
    ///
    /// A valid login without the admin role is signed straight back out.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Unauthorized` if the account is not an admin,
    /// or the sign-in error.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, ClientError> {
        let session = self.state.auth().sign_in(email, password).await?;

        if session.role() != Some(Role::Admin) {
            tracing::warn!(user_id = %session.user.id, "Non-admin attempted admin sign-in");
            if let Err(e) = self.state.auth().sign_out().await {
                tracing::warn!(error = %e, "Failed to sign out non-admin");
            }
            return Err(ClientError::Unauthorized(
                "This account does not have admin access".to_string(),
            ));
        }

        self.state.flags().set_admin_session();
        set_sentry_user(&session.user.id, session.user.email.as_deref());
        tracing::info!(user_id = %session.user.id, "Admin signed in");
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns an error if the stored session cannot be removed.
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        self.state.flags().clear_admin_session();
        clear_sentry_user();
        self.state.auth().sign_out().await?;
        Ok(())
    }

    /// The admin session, if this device signed in through the admin area.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Unauthorized` without an admin session.
    pub async fn require_admin(&self) -> Result<AuthSession, ClientError> {
        if !self.state.flags().is_admin_session() {
            return Err(ClientError::Unauthorized(
                "Sign in to the admin area first".to_string(),
            ));
        }
        let session = self.state.auth().require_session().await?;
        if session.role() != Some(Role::Admin) {
            self.state.flags().clear_admin_session();
            return Err(ClientError::Unauthorized(
                "This account does not have admin access".to_string(),
            ));
        }
        Ok(session)
    }

    /// The most recent orders across all customers.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Unauthorized` without an admin session.
    pub async fn recent_orders(&self) -> Result<Vec<Order>, ClientError> {
        let session = self.require_admin().await?;
        let backend = self.state.backend_for(&session);
        Ok(OrderRepository::new(&backend)
            .list_all(ADMIN_ORDER_LIMIT)
            .await?)
    }

    /// Rider documents waiting for review.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Unauthorized` without an admin session.
    pub async fn pending_documents(&self) -> Result<Vec<RiderDocument>, ClientError> {
        let session = self.require_admin().await?;
        let backend = self.state.backend_for(&session);
        Ok(RiderRepository::new(&backend).pending_documents().await?)
    }

    /// # Errors
    ///
    /// Returns `ClientError::Unauthorized` without an admin session, or the
    /// repository error.
    pub async fn review_document(
        &self,
        id: DocumentId,
        status: DocumentStatus,
        notes: Option<&str>,
    ) -> Result<RiderDocument, ClientError> {
        let session = self.require_admin().await?;
        let backend = self.state.backend_for(&session);
        Ok(RiderRepository::new(&backend)
            .review_document(id, status, notes)
            .await?)
    }
}
