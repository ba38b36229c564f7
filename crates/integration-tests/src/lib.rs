//! End-to-end flows for the SwiftDrop client.
//!
//! Every test runs the real [`AppState`] against an [`httpmock`] server that
//! plays the hosted backend, so no network or credentials are needed:
//!
//! ```bash
//! cargo test -p swiftdrop-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `shopping` - browse, cart, checkout and order history
//! - `auth` - sign in, refresh, sign out
//! - `wallet` - wallet top-ups and student plans

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use httpmock::MockServer;
use serde_json::{Value, json};
use swiftdrop_client::config::BackendConfig;
use swiftdrop_client::storage::MemoryStore;
use swiftdrop_client::{AppState, ClientConfig};

pub const CUSTOMER_ID: &str = "5f0c7c1e-2d7a-4c1b-9a51-0c3f1e9b6a11";
pub const VENDOR_A: &str = "0b6f8a2e-3c1d-4e5f-9a7b-1c2d3e4f5a6b";
pub const VENDOR_B: &str = "9d8c7b6a-5f4e-4d3c-8b2a-1f0e9d8c7b6a";
pub const JOLLOF: &str = "3a4b5c6d-7e8f-4a0b-9c1d-2e3f4a5b6c7d";
pub const ZOBO: &str = "8f7e6d5c-4b3a-4f1e-8d0c-9b8a7f6e5d4c";

pub const EMAIL: &str = "ada@example.ng";
pub const PASSWORD: &str = "correct-horse-42";

/// Client state wired to the mock backend, with fast retries and test
/// gateway keys.
#[must_use]
pub fn state(server: &MockServer) -> AppState {
    let mut config = ClientConfig::new(BackendConfig::new(
        url::Url::parse(&server.base_url()).unwrap(),
        "anon-key",
    ));
    config.retry_delay = Duration::from_millis(1);
    config.payments.paystack_public_key = Some("pk_test_0a1b2c3d4e5f".to_string());
    config.payments.squad_public_key = Some("sandbox_pk_9f8e7d6c".to_string());
    AppState::new(config, Arc::new(MemoryStore::new())).unwrap()
}

/// A GoTrue token response for the test customer.
#[must_use]
pub fn token_body(access_token: &str, refresh_token: &str, expires_in: i64) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": expires_in,
        "refresh_token": refresh_token,
        "user": {
            "id": CUSTOMER_ID,
            "email": EMAIL,
            "user_metadata": { "full_name": "Ada Obi", "role": "customer" }
        }
    })
}

/// A product row with its vendor embedded.
#[must_use]
pub fn product_row(id: &str, vendor_id: &str, vendor: &str, name: &str, price: &str) -> Value {
    json!({
        "id": id,
        "vendor_id": vendor_id,
        "name": name,
        "description": null,
        "price": price,
        "image_url": null,
        "category": "food",
        "in_stock": true,
        "created_at": "2024-03-01T10:00:00Z",
        "vendor": { "full_name": vendor }
    })
}

/// A paid order row as the backend returns it after insert.
#[must_use]
pub fn order_row(id: &str, vendor_id: &str, subtotal: i64, reference: &str) -> Value {
    json!({
        "id": id,
        "customer_id": CUSTOMER_ID,
        "vendor_id": vendor_id,
        "items": [],
        "subtotal": subtotal,
        "delivery_fee": 1000,
        "total": subtotal + 1000,
        "status": "pending",
        "payment_status": "paid",
        "payment_provider": "paystack",
        "payment_reference": reference,
        "delivery_address": "12 Allen Avenue, Ikeja",
        "created_at": "2024-03-01T10:00:00Z"
    })
}

/// A wallet ledger row.
#[must_use]
pub fn wallet_row(id: &str, amount: i64, kind: &str, reference: Option<&str>) -> Value {
    json!({
        "id": id,
        "user_id": CUSTOMER_ID,
        "amount": amount,
        "kind": kind,
        "description": "Wallet funding",
        "reference": reference,
        "created_at": "2024-03-01T10:00:00Z"
    })
}
