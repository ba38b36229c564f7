//! Status enums for marketplace rows, plus the badges used to display them.
//!
//! All values serialize in `snake_case` to match the hosted tables.

use serde::{Deserialize, Serialize};

/// Visual tone of a status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BadgeTone {
    Neutral,
    Info,
    Warning,
    Success,
    Danger,
}

/// A short label and tone for rendering a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusBadge {
    pub label: &'static str,
    pub tone: BadgeTone,
}

impl StatusBadge {
    const fn new(label: &'static str, tone: BadgeTone) -> Self {
        Self { label, tone }
    }
}

impl std::fmt::Display for StatusBadge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.label)
    }
}

/// Implements `Display`/`FromStr` over the `snake_case` wire names.
macro_rules! wire_names {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// The `snake_case` name used on the wire.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", stringify!($ty), ": {}"), s)),
                }
            }
        }
    };
}

/// Marketplace role attached to a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Places orders and pays for them.
    #[default]
    Customer,
    /// Picks up and delivers orders.
    Rider,
    /// Lists products and prepares orders.
    Vendor,
    /// Reviews riders and sees every order.
    Admin,
}

wire_names!(Role {
    Customer => "customer",
    Rider => "rider",
    Vendor => "vendor",
    Admin => "admin",
});

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    ReadyForPickup,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
}

wire_names!(OrderStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Preparing => "preparing",
    ReadyForPickup => "ready_for_pickup",
    PickedUp => "picked_up",
    InTransit => "in_transit",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Whether no further updates are expected.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    #[must_use]
    pub const fn badge(&self) -> StatusBadge {
        match self {
            Self::Pending => StatusBadge::new("Pending", BadgeTone::Warning),
            Self::Confirmed => StatusBadge::new("Confirmed", BadgeTone::Info),
            Self::Preparing => StatusBadge::new("Preparing", BadgeTone::Info),
            Self::ReadyForPickup => StatusBadge::new("Ready for pickup", BadgeTone::Info),
            Self::PickedUp => StatusBadge::new("Picked up", BadgeTone::Info),
            Self::InTransit => StatusBadge::new("In transit", BadgeTone::Info),
            Self::Delivered => StatusBadge::new("Delivered", BadgeTone::Success),
            Self::Cancelled => StatusBadge::new("Cancelled", BadgeTone::Danger),
        }
    }
}

/// Payment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

wire_names!(PaymentStatus {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
});

impl PaymentStatus {
    #[must_use]
    pub const fn badge(&self) -> StatusBadge {
        match self {
            Self::Pending => StatusBadge::new("Awaiting payment", BadgeTone::Warning),
            Self::Paid => StatusBadge::new("Paid", BadgeTone::Success),
            Self::Failed => StatusBadge::new("Payment failed", BadgeTone::Danger),
            Self::Refunded => StatusBadge::new("Refunded", BadgeTone::Neutral),
        }
    }
}

/// Delivery job status, as seen by riders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Assigned,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
}

wire_names!(DeliveryStatus {
    Pending => "pending",
    Assigned => "assigned",
    PickedUp => "picked_up",
    InTransit => "in_transit",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl DeliveryStatus {
    /// Whether no further updates are expected.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    #[must_use]
    pub const fn badge(&self) -> StatusBadge {
        match self {
            Self::Pending => StatusBadge::new("Awaiting rider", BadgeTone::Warning),
            Self::Assigned => StatusBadge::new("Assigned", BadgeTone::Info),
            Self::PickedUp => StatusBadge::new("Picked up", BadgeTone::Info),
            Self::InTransit => StatusBadge::new("In transit", BadgeTone::Info),
            Self::Delivered => StatusBadge::new("Delivered", BadgeTone::Success),
            Self::Cancelled => StatusBadge::new("Cancelled", BadgeTone::Danger),
        }
    }
}

/// Review status of a rider's uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

wire_names!(DocumentStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

impl DocumentStatus {
    #[must_use]
    pub const fn badge(&self) -> StatusBadge {
        match self {
            Self::Pending => StatusBadge::new("Under review", BadgeTone::Warning),
            Self::Approved => StatusBadge::new("Approved", BadgeTone::Success),
            Self::Rejected => StatusBadge::new("Rejected", BadgeTone::Danger),
        }
    }
}

/// Student subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    Active,
    Expired,
    Cancelled,
}

wire_names!(SubscriptionStatus {
    Active => "active",
    Expired => "expired",
    Cancelled => "cancelled",
});

impl SubscriptionStatus {
    #[must_use]
    pub const fn badge(&self) -> StatusBadge {
        match self {
            Self::Active => StatusBadge::new("Active", BadgeTone::Success),
            Self::Expired => StatusBadge::new("Expired", BadgeTone::Neutral),
            Self::Cancelled => StatusBadge::new("Cancelled", BadgeTone::Danger),
        }
    }
}

/// Direction of a wallet transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Money into the wallet (funding, rider earnings).
    Credit,
    /// Money out of the wallet (payments, withdrawals).
    Debit,
}

wire_names!(TransactionKind {
    Credit => "credit",
    Debit => "debit",
});

/// Student delivery plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentPlan {
    Monthly,
    Semester,
}

wire_names!(StudentPlan {
    Monthly => "monthly",
    Semester => "semester",
});

impl StudentPlan {
    /// How long one purchase of the plan lasts.
    #[must_use]
    pub const fn duration_days(&self) -> i64 {
        match self {
            Self::Monthly => 30,
            Self::Semester => 120,
        }
    }
}

/// Kind of document a rider uploads for verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    DriversLicense,
    NationalId,
    VehicleRegistration,
    ProofOfAddress,
}

wire_names!(DocumentKind {
    DriversLicense => "drivers_license",
    NationalId => "national_id",
    VehicleRegistration => "vehicle_registration",
    ProofOfAddress => "proof_of_address",
});
