//! Student delivery plans.

use chrono::Utc;
use serde_json::json;
use swiftdrop_core::{Naira, StudentPlan};
use tracing::instrument;

use super::open_checkout;
use crate::backend::AuthSession;
use crate::db::SubscriptionRepository;
use crate::error::ClientError;
use crate::models::{NewStudentSubscription, StudentSubscription};
use crate::payments::{CheckoutSession, PaymentProvider, PaymentReceipt};
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct SubscriptionService {
    state: AppState,
}

impl SubscriptionService {
    #[must_use]
    pub const fn new(state: AppState) -> Self {
        Self { state }
    }

    #[must_use]
    pub fn price(&self, plan: StudentPlan) -> Naira {
        let prices = self.state.config().student_plans;
        match plan {
            StudentPlan::Monthly => prices.monthly,
            StudentPlan::Semester => prices.semester,
        }
    }

    /// The user's running subscription, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be read.
    pub async fn current(
        &self,
        session: &AuthSession,
    ) -> Result<Option<StudentSubscription>, ClientError> {
        let backend = self.state.backend_for(session);
        Ok(SubscriptionRepository::new(&backend)
            .active_for(session.user.id, Utc::now())
            .await?)
    }

    /// Start paying for a plan.
    ///
    /// # Errors
    ///
    /// Returns a payment error if the gateway is not configured.
    #[instrument(skip(self, session), fields(user_id = %session.user.id, %plan, %provider))]
    pub fn begin(
        &self,
        provider: PaymentProvider,
        plan: StudentPlan,
        session: &AuthSession,
    ) -> Result<CheckoutSession, ClientError> {
        open_checkout(
            &self.state,
            provider,
            session,
            self.price(plan),
            json!({ "purpose": "student_subscription", "plan": plan }),
        )
    }

    /// Record a paid plan.
    ///
    /// A plan bought while another is running starts when the running one
    /// ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be recorded.
    #[instrument(skip(self, receipt, session), fields(user_id = %session.user.id, %plan, reference = %receipt.reference))]
    pub async fn activate(
        &self,
        receipt: &PaymentReceipt,
        plan: StudentPlan,
        session: &AuthSession,
    ) -> Result<StudentSubscription, ClientError> {
        let starts_at = match self.current(session).await? {
            Some(running) => running.expires_at.max(receipt.paid_at),
            None => receipt.paid_at,
        };

        let backend = self.state.backend_for(session);
        let subscription = SubscriptionRepository::new(&backend)
            .create(&NewStudentSubscription::starting(
                session.user.id,
                plan,
                receipt.amount,
                &receipt.reference,
                starts_at,
            ))
            .await?;

        self.state.toasts().success(format!(
            "Student plan active until {}",
            subscription.expires_at.format("%d %b %Y")
        ));
        Ok(subscription)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, TimeZone};
    use httpmock::prelude::*;
    use serde_json::json;
    use swiftdrop_core::Role;

    use super::*;
    use crate::services::test_support::{CUSTOMER_ID, session, state};

    fn receipt(paid_at: DateTime<Utc>) -> PaymentReceipt {
        PaymentReceipt {
            provider: PaymentProvider::Paystack,
            reference: "PSK_1_sem".to_string(),
            amount: Naira::from_whole(7_000),
            paid_at,
            gateway_transaction: None,
        }
    }

    fn subscription_row(starts_at: &str, expires_at: &str) -> serde_json::Value {
        json!({
            "id": "1a2b3c4d-5e6f-4a7b-8c9d-0e1f2a3b4c5d",
            "user_id": CUSTOMER_ID,
            "plan": "semester",
            "status": "active",
            "amount": 7000,
            "payment_reference": "PSK_1_sem",
            "starts_at": starts_at,
            "expires_at": expires_at
        })
    }

    #[tokio::test]
    async fn test_prices_come_from_config() {
        let server = MockServer::start_async().await;
        let service = state(&server).subscriptions();
        assert_eq!(service.price(StudentPlan::Monthly), Naira::from_whole(2_000));
        assert_eq!(service.price(StudentPlan::Semester), Naira::from_whole(7_000));
    }

    #[tokio::test]
    async fn test_begin_charges_plan_price() {
        let server = MockServer::start_async().await;
        let checkout = state(&server)
            .subscriptions()
            .begin(PaymentProvider::Squad, StudentPlan::Monthly, &session(Role::Customer))
            .unwrap();
        assert_eq!(checkout.amount(), Naira::from_whole(2_000));
        assert_eq!(checkout.config()["metadata"]["plan"], "monthly");
    }

    #[tokio::test]
    async fn test_activate_semester_runs_120_days() {
        let paid_at = Utc::now();
        let expires_at = paid_at + chrono::Duration::days(120);
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/student_subscriptions");
                then.status(200).json_body(json!([]));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/rest/v1/student_subscriptions")
                    .json_body_partial(
                        json!({
                            "plan": "semester",
                            "status": "active",
                            "expires_at": expires_at,
                        })
                        .to_string(),
                    );
                then.status(201).json_body(json!([subscription_row(
                    &paid_at.to_rfc3339(),
                    &expires_at.to_rfc3339()
                )]));
            })
            .await;

        let sub = state(&server)
            .subscriptions()
            .activate(&receipt(paid_at), StudentPlan::Semester, &session(Role::Customer))
            .await
            .unwrap();

        create.assert_async().await;
        assert_eq!(sub.days_remaining(paid_at), 120);
    }

    #[tokio::test]
    async fn test_activate_extends_running_plan() {
        let paid_at = Utc.with_ymd_and_hms(2030, 3, 10, 12, 0, 0).unwrap();
        let running_ends = Utc.with_ymd_and_hms(2030, 3, 31, 0, 0, 0).unwrap();
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/student_subscriptions");
                then.status(200).json_body(json!([subscription_row(
                    "2026-03-01T00:00:00Z",
                    "2030-03-31T00:00:00Z"
                )]));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/rest/v1/student_subscriptions")
                    .json_body_partial(json!({ "starts_at": running_ends }).to_string());
                then.status(201).json_body(json!([subscription_row(
                    "2030-03-31T00:00:00Z",
                    "2030-07-29T00:00:00Z"
                )]));
            })
            .await;

        state(&server)
            .subscriptions()
            .activate(&receipt(paid_at), StudentPlan::Semester, &session(Role::Customer))
            .await
            .unwrap();

        create.assert_async().await;
    }
}
