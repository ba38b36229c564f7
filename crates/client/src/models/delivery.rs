//! Delivery jobs (`deliveries` table).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swiftdrop_core::{DeliveryId, DeliveryStatus, Naira, OrderId, ProfileId};

/// A pickup-to-dropoff job for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: DeliveryId,
    pub order_id: OrderId,
    /// Unset until a rider accepts the job.
    #[serde(default)]
    pub rider_id: Option<ProfileId>,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub status: DeliveryStatus,
    /// Rider's payout for the job.
    pub fee: Naira,
    pub created_at: DateTime<Utc>,
}

impl Delivery {
    /// Open for any rider to accept.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.rider_id.is_none() && self.status == DeliveryStatus::Pending
    }
}
