//! Vendor products (`products` table).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swiftdrop_core::{Naira, ProductId, ProfileId};

use crate::cart::CartItem;

/// Columns requested for product listings, embedding the vendor's name.
pub const PRODUCT_COLUMNS: &str = "*,vendor:profiles(full_name)";

/// Vendor fields embedded in a product row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorSummary {
    #[serde(default)]
    pub full_name: Option<String>,
}

/// A product listed by a vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub vendor_id: ProfileId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Naira,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub in_stock: bool,
    pub created_at: DateTime<Utc>,
    /// Present when fetched with [`PRODUCT_COLUMNS`].
    #[serde(default, skip_serializing)]
    pub vendor: Option<VendorSummary>,
}

impl Product {
    /// Vendor name from the embedded profile, if it was fetched.
    #[must_use]
    pub fn vendor_name(&self) -> Option<&str> {
        self.vendor
            .as_ref()
            .and_then(|v| v.full_name.as_deref())
            .filter(|name| !name.trim().is_empty())
    }

    /// A single-unit cart line for this product.
    #[must_use]
    pub fn to_cart_item(&self, vendor_name: &str) -> CartItem {
        CartItem {
            id: self.id,
            name: self.name.clone(),
            price: self.price,
            quantity: 1,
            vendor_id: self.vendor_id,
            vendor_name: vendor_name.to_string(),
        }
    }
}

/// A product to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProduct {
    pub vendor_id: ProfileId,
    pub name: String,
    pub description: Option<String>,
    pub price: Naira,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub in_stock: bool,
}

/// Editable product fields. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProductUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Naira>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,
}
