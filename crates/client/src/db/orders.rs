//! Order repository.

use serde::Serialize;
use swiftdrop_core::{OrderId, OrderStatus, ProfileId};
use tracing::instrument;

use super::RepositoryError;
use crate::backend::{BackendClient, Direction, Query};
use crate::models::{NewOrder, Order};

const TABLE: &str = "orders";

#[derive(Serialize)]
struct StatusPatch {
    status: OrderStatus,
}

/// Repository for order rows.
pub struct OrderRepository<'a> {
    client: &'a BackendClient,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(client: &'a BackendClient) -> Self {
        Self { client }
    }

    /// Create one order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` for an order without lines, or
    /// `RepositoryError::Conflict` if the payment reference was already used.
    pub async fn create(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        self.create_many(std::slice::from_ref(order))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RepositoryError::DataCorruption("insert returned no order".to_string()))
    }

    /// Create several orders in one request, so a multi-vendor checkout
    /// lands all-or-nothing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if any order has no lines.
    #[instrument(skip(self, orders), fields(count = orders.len()))]
    pub async fn create_many(&self, orders: &[NewOrder]) -> Result<Vec<Order>, RepositoryError> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }
        if orders.iter().any(|order| order.items.is_empty()) {
            return Err(RepositoryError::Invalid("order has no items".to_string()));
        }
        Ok(self.client.insert(TABLE, orders).await?)
    }

    /// A customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the request fails.
    pub async fn list_for_customer(&self, customer: ProfileId) -> Result<Vec<Order>, RepositoryError> {
        self.list(Query::table(TABLE).eq("customer_id", customer)).await
    }

    /// A vendor's incoming orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the request fails.
    pub async fn list_for_vendor(&self, vendor: ProfileId) -> Result<Vec<Order>, RepositoryError> {
        self.list(Query::table(TABLE).eq("vendor_id", vendor)).await
    }

    /// Every order, newest first. Only admins see rows here.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the request fails.
    pub async fn list_all(&self, limit: usize) -> Result<Vec<Order>, RepositoryError> {
        self.list(Query::table(TABLE).limit(limit)).await
    }

    async fn list(&self, query: Query) -> Result<Vec<Order>, RepositoryError> {
        Ok(self
            .client
            .select(&query.order("created_at", Direction::Desc))
            .await?)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the request fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .client
            .select_one(&Query::table(TABLE).eq("id", id))
            .await?)
    }

    /// Move an order to a new status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist or is
    /// not visible to the caller.
    #[instrument(skip(self), fields(order_id = %id, status = %status))]
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let rows: Vec<Order> = self
            .client
            .update(&Query::table(TABLE).eq("id", id), &StatusPatch { status })
            .await?;
        rows.into_iter().next().ok_or(RepositoryError::NotFound)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use httpmock::Method::PATCH;
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::db::test_support::{CUSTOMER_ID, VENDOR_ID, backend};

    const ORDER_ID: &str = "2a4b6c8d-0e1f-4a2b-9c3d-4e5f6a7b8c9d";

    fn order_row(status: &str) -> serde_json::Value {
        json!({
            "id": ORDER_ID,
            "customer_id": CUSTOMER_ID,
            "vendor_id": VENDOR_ID,
            "rider_id": null,
            "items": [
                { "product_id": "6c1d1c0e-37a8-4d8e-a4b1-5e9f3f0f2a10", "name": "Suya", "price": 1500, "quantity": 2 }
            ],
            "subtotal": 3000,
            "delivery_fee": 1000,
            "total": 4000,
            "status": status,
            "payment_status": "paid",
            "payment_provider": "squad",
            "payment_reference": "SQD_1_abc",
            "delivery_address": "Unilag, Akoka",
            "created_at": "2024-03-01T10:00:00Z"
        })
    }

    #[tokio::test]
    async fn test_list_for_customer() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/orders")
                    .query_param("customer_id", format!("eq.{CUSTOMER_ID}"))
                    .query_param("order", "created_at.desc");
                then.status(200).json_body(json!([order_row("pending")]));
            })
            .await;

        let client = backend(&server);
        let orders = OrderRepository::new(&client)
            .list_for_customer(CUSTOMER_ID.parse().unwrap())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(orders[0].item_count(), 2);
        assert_eq!(orders[0].status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_status() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PATCH)
                    .path("/rest/v1/orders")
                    .query_param("id", format!("eq.{ORDER_ID}"))
                    .json_body(json!({ "status": "ready_for_pickup" }));
                then.status(200).json_body(json!([order_row("ready_for_pickup")]));
            })
            .await;

        let client = backend(&server);
        let order = OrderRepository::new(&client)
            .update_status(ORDER_ID.parse().unwrap(), OrderStatus::ReadyForPickup)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(order.status, OrderStatus::ReadyForPickup);
    }

    #[tokio::test]
    async fn test_duplicate_reference_is_conflict() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/rest/v1/orders");
                then.status(409).json_body(json!({
                    "code": "23505",
                    "message": "duplicate key value violates unique constraint \"orders_payment_reference_vendor_key\""
                }));
            })
            .await;

        let client = backend(&server);
        let order: NewOrder = NewOrder {
            customer_id: CUSTOMER_ID.parse().unwrap(),
            vendor_id: VENDOR_ID.parse().unwrap(),
            items: serde_json::from_value(order_row("pending")["items"].clone()).unwrap(),
            subtotal: swiftdrop_core::Naira::from_whole(3_000),
            delivery_fee: swiftdrop_core::Naira::from_whole(1_000),
            total: swiftdrop_core::Naira::from_whole(4_000),
            status: OrderStatus::Pending,
            payment_status: swiftdrop_core::PaymentStatus::Paid,
            payment_provider: None,
            payment_reference: Some("SQD_1_abc".to_string()),
            delivery_address: "Unilag, Akoka".to_string(),
        };

        let result = OrderRepository::new(&client).create(&order).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_create_many_rejects_empty_order() {
        let server = MockServer::start_async().await;
        let client = backend(&server);
        let order = NewOrder {
            customer_id: ProfileId::generate(),
            vendor_id: ProfileId::generate(),
            items: Vec::new(),
            subtotal: swiftdrop_core::Naira::ZERO,
            delivery_fee: swiftdrop_core::Naira::ZERO,
            total: swiftdrop_core::Naira::ZERO,
            status: OrderStatus::Pending,
            payment_status: swiftdrop_core::PaymentStatus::Pending,
            payment_provider: None,
            payment_reference: None,
            delivery_address: String::new(),
        };
        assert!(matches!(
            OrderRepository::new(&client).create_many(&[order]).await,
            Err(RepositoryError::Invalid(_))
        ));
    }
}
