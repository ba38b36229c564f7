//! Cart checkout: pay once, then one order per vendor.

use serde_json::json;
use swiftdrop_core::Naira;
use tracing::instrument;

use super::open_checkout;
use crate::backend::AuthSession;
use crate::cart::Cart;
use crate::db::OrderRepository;
use crate::error::{ClientError, add_breadcrumb};
use crate::models::{NewOrder, Order};
use crate::payments::{CheckoutSession, PaymentError, PaymentProvider, PaymentReceipt};
use crate::session::AddressError;
use crate::state::AppState;

/// What the customer will be charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutQuote {
    pub subtotal: Naira,
    pub delivery_fee: Naira,
    pub total: Naira,
    pub vendor_count: usize,
}

#[derive(Debug, Clone)]
pub struct CheckoutService {
    state: AppState,
}

impl CheckoutService {
    #[must_use]
    pub const fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Price the cart. Delivery is charged once per vendor.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::BadRequest` for an empty cart, or a payment
    /// error if the amounts are out of range.
    pub fn quote(&self, cart: &Cart) -> Result<CheckoutQuote, ClientError> {
        if cart.is_empty() {
            return Err(ClientError::BadRequest("Your cart is empty".to_string()));
        }
        let vendor_count = cart.vendor_groups().len();
        let per_vendor = u32::try_from(vendor_count)
            .map_err(|_| ClientError::BadRequest("Too many vendors in one order".to_string()))?;
        let subtotal = cart.items().iter().try_fold(Naira::ZERO, |acc, item| {
            item.price
                .checked_mul(item.quantity)
                .and_then(|line| acc.checked_add(line))
        });
        let subtotal = subtotal.map_err(PaymentError::from)?;
        let delivery_fee = self
            .state
            .config()
            .delivery_fee
            .checked_mul(per_vendor)
            .map_err(PaymentError::from)?;
        Ok(CheckoutQuote {
            subtotal,
            delivery_fee,
            total: subtotal.checked_add(delivery_fee).map_err(PaymentError::from)?,
            vendor_count,
        })
    }

    /// Start paying for the cart.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::BadRequest` for an empty cart, or a payment error
    /// if the gateway is not configured.
    #[instrument(skip(self, cart, session), fields(user_id = %session.user.id, %provider))]
    pub fn begin(
        &self,
        provider: PaymentProvider,
        cart: &Cart,
        session: &AuthSession,
    ) -> Result<CheckoutSession, ClientError> {
        let quote = self.quote(cart)?;
        add_breadcrumb("checkout", "Checkout started", Some(&[("provider", provider.as_str())]));
        open_checkout(
            &self.state,
            provider,
            session,
            quote.total,
            json!({
                "purpose": "order",
                "vendor_count": quote.vendor_count,
                "item_count": cart.item_count(),
            }),
        )
    }

    /// Turn a successful payment into orders.
    ///
    /// Creates one paid order per vendor group, then clears the cart and
    /// remembers the delivery address for next time.
    ///
    /// # Errors
    ///
    /// Returns an error for a blank address or an empty cart, when the
    /// receipt does not cover the cart's current total, or if the orders
    /// could not be created. The cart is left untouched on error.
    #[instrument(skip(self, receipt, cart, session, address), fields(user_id = %session.user.id, reference = %receipt.reference))]
    pub async fn finalize(
        &self,
        receipt: &PaymentReceipt,
        cart: &mut Cart,
        session: &AuthSession,
        address: &str,
    ) -> Result<Vec<Order>, ClientError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(AddressError::Blank.into());
        }
        let quote = self.quote(cart)?;
        if receipt.amount < quote.total {
            tracing::warn!(
                paid = %receipt.amount,
                expected = %quote.total,
                "Payment does not cover the cart"
            );
            return Err(PaymentError::Underpaid {
                paid: receipt.amount,
                due: quote.total,
            }
            .into());
        }
        if receipt.amount > quote.total {
            tracing::warn!(
                paid = %receipt.amount,
                expected = %quote.total,
                "Cart changed after payment started"
            );
        }

        let fee = self.state.config().delivery_fee;
        let orders: Vec<NewOrder> = cart
            .vendor_groups()
            .iter()
            .map(|group| {
                NewOrder::paid(
                    session.user.id,
                    group,
                    fee,
                    receipt.provider,
                    &receipt.reference,
                    address,
                )
            })
            .collect();

        let backend = self.state.backend_for(session);
        let created = OrderRepository::new(&backend).create_many(&orders).await?;

        cart.clear();
        if let Err(e) = self.state.address_book().save(&session.user.id, address) {
            tracing::warn!(error = %e, "Failed to save delivery address");
        }
        tracing::info!(orders = created.len(), "Checkout complete");
        self.state.toasts().success(format!(
            "Order placed! {} {} on the way",
            created.len(),
            if created.len() == 1 { "delivery" } else { "deliveries" }
        ));
        Ok(created)
    }
}
