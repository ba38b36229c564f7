//! Delivery repository.

use serde::Serialize;
use swiftdrop_core::{DeliveryId, DeliveryStatus, ProfileId};
use tracing::instrument;

use super::RepositoryError;
use crate::backend::{BackendClient, Direction, Query};
use crate::models::Delivery;

const TABLE: &str = "deliveries";

#[derive(Serialize)]
struct AssignPatch {
    rider_id: ProfileId,
    status: DeliveryStatus,
}

#[derive(Serialize)]
struct StatusPatch {
    status: DeliveryStatus,
}

/// Repository for delivery jobs.
pub struct DeliveryRepository<'a> {
    client: &'a BackendClient,
}

impl<'a> DeliveryRepository<'a> {
    #[must_use]
    pub const fn new(client: &'a BackendClient) -> Self {
        Self { client }
    }

    /// Jobs no rider has taken yet, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the request fails.
    pub async fn list_open(&self) -> Result<Vec<Delivery>, RepositoryError> {
        Ok(self
            .client
            .select(
                &Query::table(TABLE)
                    .is_null("rider_id")
                    .eq("status", DeliveryStatus::Pending)
                    .order("created_at", Direction::Asc),
            )
            .await?)
    }

    /// A rider's jobs, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the request fails.
    pub async fn list_for_rider(&self, rider: ProfileId) -> Result<Vec<Delivery>, RepositoryError> {
        Ok(self
            .client
            .select(
                &Query::table(TABLE)
                    .eq("rider_id", rider)
                    .order("created_at", Direction::Desc),
            )
            .await?)
    }

    /// Take an open job.
    ///
    /// The update only matches while the job is still unassigned, so two
    /// riders racing for the same job cannot both win.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the job was already taken.
    #[instrument(skip(self), fields(delivery_id = %id, rider_id = %rider))]
    pub async fn assign(&self, id: DeliveryId, rider: ProfileId) -> Result<Delivery, RepositoryError> {
        let rows: Vec<Delivery> = self
            .client
            .update(
                &Query::table(TABLE).eq("id", id).is_null("rider_id"),
                &AssignPatch {
                    rider_id: rider,
                    status: DeliveryStatus::Assigned,
                },
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| RepositoryError::Conflict("delivery is no longer available".to_string()))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no row was updated.
    #[instrument(skip(self), fields(delivery_id = %id, status = %status))]
    pub async fn update_status(
        &self,
        id: DeliveryId,
        status: DeliveryStatus,
    ) -> Result<Delivery, RepositoryError> {
        let rows: Vec<Delivery> = self
            .client
            .update(&Query::table(TABLE).eq("id", id), &StatusPatch { status })
            .await?;
        rows.into_iter().next().ok_or(RepositoryError::NotFound)
    }
}
