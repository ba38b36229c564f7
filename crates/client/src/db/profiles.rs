//! Profile repository.

use swiftdrop_core::{ProfileId, Role};
use tracing::instrument;

use super::RepositoryError;
use crate::backend::{BackendClient, Direction, Query};
use crate::models::{Profile, ProfileUpdate};

const TABLE: &str = "profiles";

/// Repository for profile rows. Lookups by id go through the profile cache.
pub struct ProfileRepository<'a> {
    client: &'a BackendClient,
}

impl<'a> ProfileRepository<'a> {
    #[must_use]
    pub const fn new(client: &'a BackendClient) -> Self {
        Self { client }
    }

    /// Get a profile by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the request fails.
    #[instrument(skip(self), fields(profile_id = %id))]
    pub async fn get(&self, id: ProfileId) -> Result<Option<Profile>, RepositoryError> {
        if let Some(profile) = self.client.profile_cache().get(&id).await {
            tracing::debug!("Profile cache hit");
            return Ok(Some(profile));
        }

        let profile: Option<Profile> = self
            .client
            .select_one(&Query::table(TABLE).eq("id", id))
            .await?;
        if let Some(profile) = &profile {
            self.client.profile_cache().insert(id, profile.clone()).await;
        }
        Ok(profile)
    }

    /// Update the editable fields of a profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` for an empty update and
    /// `RepositoryError::NotFound` if no row was updated.
    #[instrument(skip(self, update), fields(profile_id = %id))]
    pub async fn update(
        &self,
        id: ProfileId,
        update: &ProfileUpdate,
    ) -> Result<Profile, RepositoryError> {
        if update.is_empty() {
            return Err(RepositoryError::Invalid("nothing to update".to_string()));
        }

        let rows: Vec<Profile> = self
            .client
            .update(&Query::table(TABLE).eq("id", id), update)
            .await?;
        self.client.profile_cache().invalidate(&id).await;
        rows.into_iter().next().ok_or(RepositoryError::NotFound)
    }

    /// Every profile with the given role, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the request fails.
    pub async fn list_by_role(&self, role: Role) -> Result<Vec<Profile>, RepositoryError> {
        Ok(self
            .client
            .select(
                &Query::table(TABLE)
                    .eq("role", role)
                    .order("created_at", Direction::Desc),
            )
            .await?)
    }
}
