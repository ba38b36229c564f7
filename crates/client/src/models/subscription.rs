//! Student delivery plans (`student_subscriptions` table).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use swiftdrop_core::{Naira, ProfileId, StudentPlan, SubscriptionId, SubscriptionStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentSubscription {
    pub id: SubscriptionId,
    pub user_id: ProfileId,
    pub plan: StudentPlan,
    pub status: SubscriptionStatus,
    pub amount: Naira,
    pub payment_reference: String,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl StudentSubscription {
    /// Active and within its paid window at `now`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.starts_at <= now && now < self.expires_at
    }

    /// Whole days left, or zero once expired.
    #[must_use]
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_days().max(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewStudentSubscription {
    pub user_id: ProfileId,
    pub plan: StudentPlan,
    pub status: SubscriptionStatus,
    pub amount: Naira,
    pub payment_reference: String,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NewStudentSubscription {
    /// An active subscription starting at `starts_at` for the plan's duration.
    #[must_use]
    pub fn starting(
        user_id: ProfileId,
        plan: StudentPlan,
        amount: Naira,
        payment_reference: &str,
        starts_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            plan,
            status: SubscriptionStatus::Active,
            amount,
            payment_reference: payment_reference.to_string(),
            starts_at,
            expires_at: starts_at + Duration::days(plan.duration_days()),
        }
    }
}
