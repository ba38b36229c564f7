//! Product repository.

use swiftdrop_core::{ProductId, ProfileId};
use tracing::instrument;

use super::RepositoryError;
use crate::backend::{BackendClient, Direction, Query};
use crate::models::product::PRODUCT_COLUMNS;
use crate::models::{NewProduct, Product, ProductUpdate};

pub(crate) const TABLE: &str = "products";

/// Repository for product rows.
pub struct ProductRepository<'a> {
    client: &'a BackendClient,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(client: &'a BackendClient) -> Self {
        Self { client }
    }

    /// In-stock products from every vendor, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the request fails.
    #[instrument(skip(self))]
    pub async fn list_available(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self
            .client
            .select(
                &Query::table(TABLE)
                    .select(PRODUCT_COLUMNS)
                    .eq("in_stock", true)
                    .order("created_at", Direction::Desc),
            )
            .await?)
    }

    /// Every product of one vendor, including out-of-stock ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the request fails.
    #[instrument(skip(self), fields(vendor_id = %vendor))]
    pub async fn list_by_vendor(&self, vendor: ProfileId) -> Result<Vec<Product>, RepositoryError> {
        Ok(self
            .client
            .select(
                &Query::table(TABLE)
                    .select(PRODUCT_COLUMNS)
                    .eq("vendor_id", vendor)
                    .order("name", Direction::Asc),
            )
            .await?)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the request fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self
            .client
            .select_one(&Query::table(TABLE).select(PRODUCT_COLUMNS).eq("id", id))
            .await?)
    }

    /// List a new product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` for a blank name or a non-positive
    /// price, or `RepositoryError::Backend` if the insert fails.
    #[instrument(skip(self, product), fields(vendor_id = %product.vendor_id, name = %product.name))]
    pub async fn create(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        if product.name.trim().is_empty() {
            return Err(RepositoryError::Invalid("product name is required".to_string()));
        }
        if !product.price.is_positive() {
            return Err(RepositoryError::Invalid(format!(
                "price must be positive, got {}",
                product.price
            )));
        }
        Ok(self.client.insert_one(TABLE, product).await?)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` for a non-positive price and
    /// `RepositoryError::NotFound` if no row was updated.
    #[instrument(skip(self, update), fields(product_id = %id))]
    pub async fn update(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        if update.price.is_some_and(|price| !price.is_positive()) {
            return Err(RepositoryError::Invalid("price must be positive".to_string()));
        }
        let rows: Vec<Product> = self
            .client
            .update(&Query::table(TABLE).eq("id", id), update)
            .await?;
        rows.into_iter().next().ok_or(RepositoryError::NotFound)
    }

    /// Mark a product in or out of stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no row was updated.
    pub async fn set_stock(&self, id: ProductId, in_stock: bool) -> Result<Product, RepositoryError> {
        self.update(
            id,
            &ProductUpdate {
                in_stock: Some(in_stock),
                ..ProductUpdate::default()
            },
        )
        .await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        self.client.delete(&Query::table(TABLE).eq("id", id)).await?;
        Ok(())
    }
}
