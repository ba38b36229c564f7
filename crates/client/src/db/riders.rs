//! Rider bank details and verification documents.

use serde::Serialize;
use swiftdrop_core::{DocumentId, DocumentKind, DocumentStatus, ProfileId};
use tracing::instrument;

use super::RepositoryError;
use crate::backend::{BackendClient, Direction, Query};
use crate::models::{NewRiderDocument, RiderBankDetails, RiderDocument};

const BANK_TABLE: &str = "rider_bank_details";
const DOCUMENT_TABLE: &str = "rider_documents";

#[derive(Serialize)]
struct ReviewPatch<'a> {
    status: DocumentStatus,
    notes: Option<&'a str>,
}

/// Repository for rider payout and verification rows.
pub struct RiderRepository<'a> {
    client: &'a BackendClient,
}

impl<'a> RiderRepository<'a> {
    #[must_use]
    pub const fn new(client: &'a BackendClient) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the request fails.
    pub async fn bank_details(
        &self,
        rider: ProfileId,
    ) -> Result<Option<RiderBankDetails>, RepositoryError> {
        Ok(self
            .client
            .select_one(&Query::table(BANK_TABLE).eq("rider_id", rider))
            .await?)
    }

    /// Create or replace the rider's payout account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` for blank bank or account names.
    #[instrument(skip(self, details), fields(rider_id = %details.rider_id, account = %details.account_number.masked()))]
    pub async fn save_bank_details(
        &self,
        details: &RiderBankDetails,
    ) -> Result<RiderBankDetails, RepositoryError> {
        if details.bank_name.trim().is_empty() || details.account_name.trim().is_empty() {
            return Err(RepositoryError::Invalid(
                "bank name and account name are required".to_string(),
            ));
        }
        self.client
            .upsert::<RiderBankDetails, _>(BANK_TABLE, details, "rider_id")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RepositoryError::DataCorruption("upsert returned no row".to_string()))
    }

    /// The rider's documents, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the request fails.
    pub async fn documents(&self, rider: ProfileId) -> Result<Vec<RiderDocument>, RepositoryError> {
        Ok(self
            .client
            .select(
                &Query::table(DOCUMENT_TABLE)
                    .eq("rider_id", rider)
                    .order("created_at", Direction::Desc),
            )
            .await?)
    }

    /// Every document awaiting review, oldest first. Admin only.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the request fails.
    pub async fn pending_documents(&self) -> Result<Vec<RiderDocument>, RepositoryError> {
        Ok(self
            .client
            .select(
                &Query::table(DOCUMENT_TABLE)
                    .eq("status", DocumentStatus::Pending)
                    .order("created_at", Direction::Asc),
            )
            .await?)
    }

    /// Submit an uploaded document for review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the file URL is not http(s).
    #[instrument(skip(self, file_url), fields(rider_id = %rider, kind = %kind))]
    pub async fn submit_document(
        &self,
        rider: ProfileId,
        kind: DocumentKind,
        file_url: &str,
    ) -> Result<RiderDocument, RepositoryError> {
        let parsed = url::Url::parse(file_url)
            .map_err(|e| RepositoryError::Invalid(format!("invalid document URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RepositoryError::Invalid(
                "document URL must be http(s)".to_string(),
            ));
        }

        Ok(self
            .client
            .insert_one(
                DOCUMENT_TABLE,
                &NewRiderDocument {
                    rider_id: rider,
                    kind,
                    file_url: parsed.to_string(),
                    status: DocumentStatus::Pending,
                },
            )
            .await?)
    }

    /// Approve or reject a document. Admin only.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` when asked to set a document back
    /// to pending, and `RepositoryError::NotFound` if no row was updated.
    #[instrument(skip(self, notes), fields(document_id = %id, status = %status))]
    pub async fn review_document(
        &self,
        id: DocumentId,
        status: DocumentStatus,
        notes: Option<&str>,
    ) -> Result<RiderDocument, RepositoryError> {
        if status == DocumentStatus::Pending {
            return Err(RepositoryError::Invalid(
                "a review must approve or reject".to_string(),
            ));
        }
        let rows: Vec<RiderDocument> = self
            .client
            .update(
                &Query::table(DOCUMENT_TABLE).eq("id", id),
                &ReviewPatch { status, notes },
            )
            .await?;
        rows.into_iter().next().ok_or(RepositoryError::NotFound)
    }
}
