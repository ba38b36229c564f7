//! Customer orders (`orders` table).
//!
//! One order covers one vendor. A checkout across several vendors produces
//! one order per vendor, each carrying its own delivery fee.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swiftdrop_core::{Naira, OrderId, OrderStatus, PaymentStatus, ProductId, ProfileId};

use crate::cart::{CartItem, VendorGroup};
use crate::payments::PaymentProvider;

/// Snapshot of a cart line stored on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    pub price: Naira,
    pub quantity: u32,
}

impl OrderLine {
    #[must_use]
    pub fn line_total(&self) -> Naira {
        self.price * self.quantity
    }
}

impl From<&CartItem> for OrderLine {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.id,
            name: item.name.clone(),
            price: item.price,
            quantity: item.quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: ProfileId,
    pub vendor_id: ProfileId,
    #[serde(default)]
    pub rider_id: Option<ProfileId>,
    pub items: Vec<OrderLine>,
    pub subtotal: Naira,
    pub delivery_fee: Naira,
    pub total: Naira,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_provider: Option<PaymentProvider>,
    #[serde(default)]
    pub payment_reference: Option<String>,
    pub delivery_address: String,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Total quantity across lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|line| u64::from(line.quantity)).sum()
    }
}

/// An order to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOrder {
    pub customer_id: ProfileId,
    pub vendor_id: ProfileId,
    pub items: Vec<OrderLine>,
    pub subtotal: Naira,
    pub delivery_fee: Naira,
    pub total: Naira,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_provider: Option<PaymentProvider>,
    pub payment_reference: Option<String>,
    pub delivery_address: String,
}

impl NewOrder {
    /// A paid order for one vendor's share of the cart.
    #[must_use]
    pub fn paid(
        customer_id: ProfileId,
        group: &VendorGroup,
        delivery_fee: Naira,
        provider: PaymentProvider,
        reference: &str,
        delivery_address: &str,
    ) -> Self {
        let subtotal = group.subtotal();
        Self {
            customer_id,
            vendor_id: group.vendor_id,
            items: group.items.iter().map(OrderLine::from).collect(),
            subtotal,
            delivery_fee,
            total: subtotal + delivery_fee,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Paid,
            payment_provider: Some(provider),
            payment_reference: Some(reference.to_string()),
            delivery_address: delivery_address.to_string(),
        }
    }
}
