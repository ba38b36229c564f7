//! Student subscription repository.

use chrono::{DateTime, SecondsFormat, Utc};
use swiftdrop_core::{ProfileId, SubscriptionStatus};
use tracing::instrument;

use super::RepositoryError;
use crate::backend::{BackendClient, Direction, Query};
use crate::models::{NewStudentSubscription, StudentSubscription};

const TABLE: &str = "student_subscriptions";

pub struct SubscriptionRepository<'a> {
    client: &'a BackendClient,
}

impl<'a> SubscriptionRepository<'a> {
    #[must_use]
    pub const fn new(client: &'a BackendClient) -> Self {
        Self { client }
    }

    /// The user's subscription covering `now`, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the request fails.
    pub async fn active_for(
        &self,
        user: ProfileId,
        now: DateTime<Utc>,
    ) -> Result<Option<StudentSubscription>, RepositoryError> {
        let rows: Vec<StudentSubscription> = self
            .client
            .select(
                &Query::table(TABLE)
                    .eq("user_id", user)
                    .eq("status", SubscriptionStatus::Active)
                    .gte("expires_at", now.to_rfc3339_opts(SecondsFormat::Secs, true))
                    .order("expires_at", Direction::Desc),
            )
            .await?;
        Ok(rows.into_iter().find(|sub| sub.is_active(now)))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the payment reference was
    /// already used for a subscription.
    #[instrument(skip(self, subscription), fields(user_id = %subscription.user_id, plan = %subscription.plan))]
    pub async fn create(
        &self,
        subscription: &NewStudentSubscription,
    ) -> Result<StudentSubscription, RepositoryError> {
        Ok(self.client.insert_one(TABLE, subscription).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::db::test_support::{CUSTOMER_ID, backend};

    #[tokio::test]
    async fn test_active_for_filters_by_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/student_subscriptions")
                    .query_param("user_id", format!("eq.{CUSTOMER_ID}"))
                    .query_param("status", "eq.active")
                    .query_param("expires_at", "gte.2024-03-10T12:00:00Z");
                then.status(200).json_body(json!([{
                    "id": "1a2b3c4d-5e6f-4a7b-8c9d-0e1f2a3b4c5d",
                    "user_id": CUSTOMER_ID,
                    "plan": "monthly",
                    "status": "active",
                    "amount": 2000,
                    "payment_reference": "SQD_1_abc",
                    "starts_at": "2024-03-01T00:00:00Z",
                    "expires_at": "2024-03-31T00:00:00Z"
                }]));
            })
            .await;

        let client = backend(&server);
        let sub = SubscriptionRepository::new(&client)
            .active_for(CUSTOMER_ID.parse().unwrap(), now)
            .await
            .unwrap()
            .unwrap();

        mock.assert_async().await;
        assert_eq!(sub.days_remaining(now), 20);
    }
}
