//! The shopping cart, persisted in the injected key-value store.
//!
//! The cart is the only entity the client owns. It is a list of line items
//! keyed by product id: adding a product that is already present bumps its
//! quantity instead of adding a second line. Every mutation re-persists the
//! whole cart under [`keys::CART`]; a storage failure is logged and the
//! in-memory cart stays authoritative for the rest of the session.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use swiftdrop_core::{Naira, ProductId, ProfileId};

use crate::storage::{JsonStoreExt, KeyValueStore, keys};

/// A line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Product id; unique within a cart.
    pub id: ProductId,
    /// Product name at the time it was added.
    pub name: String,
    /// Unit price at the time it was added.
    pub price: Naira,
    /// Always at least 1.
    pub quantity: u32,
    /// Vendor that sells the product.
    pub vendor_id: ProfileId,
    /// Vendor display name.
    pub vendor_name: String,
}

impl CartItem {
    /// Price × quantity for this line.
    #[must_use]
    pub fn line_total(&self) -> Naira {
        self.price * self.quantity
    }
}

/// Cart lines belonging to one vendor. Each group becomes one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorGroup {
    pub vendor_id: ProfileId,
    pub vendor_name: String,
    pub items: Vec<CartItem>,
}

impl VendorGroup {
    #[must_use]
    pub fn subtotal(&self) -> Naira {
        self.items.iter().map(CartItem::line_total).sum()
    }
}

/// The shopping cart.
pub struct Cart {
    items: Vec<CartItem>,
    store: Arc<dyn KeyValueStore>,
}

impl Cart {
    /// Load the cart from the store.
    ///
    /// A missing entry is an empty cart. So is a corrupt one, which is
    /// logged and left in place until the next mutation overwrites it.
    #[must_use]
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let items = match store.get_json::<Vec<CartItem>>(keys::CART) {
            Ok(Some(items)) => normalize(items),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable cart");
                Vec::new()
            }
        };
        Self { items, store }
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == *id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add a product. If it is already in the cart, quantities accumulate.
    ///
    /// A quantity of 0 is treated as 1.
    pub fn add(&mut self, mut item: CartItem) {
        item.quantity = item.quantity.max(1);
        if let Some(existing) = self.items.iter_mut().find(|i| i.id == item.id) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
        } else {
            self.items.push(item);
        }
        self.persist();
    }

    /// Remove a product entirely.
    pub fn remove(&mut self, id: &ProductId) {
        self.items.retain(|item| item.id != *id);
        self.persist();
    }

    /// Change a line's quantity by `delta`.
    ///
    /// A change that would leave the quantity below 1 is ignored; use
    /// [`Cart::remove`] to drop a line. Returns whether anything changed.
    pub fn update_quantity(&mut self, id: &ProductId, delta: i64) -> bool {
        let Some(item) = self.items.iter_mut().find(|i| i.id == *id) else {
            return false;
        };
        let Some(quantity) = i64::from(item.quantity)
            .checked_add(delta)
            .filter(|q| *q >= 1)
            .and_then(|q| u32::try_from(q).ok())
        else {
            return false;
        };
        if quantity == item.quantity {
            return false;
        }
        item.quantity = quantity;
        self.persist();
        true
    }

    /// Sum of price × quantity over every line.
    #[must_use]
    pub fn total(&self) -> Naira {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Sum of quantities.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Group lines by vendor, in the order vendors first appear.
    #[must_use]
    pub fn vendor_groups(&self) -> Vec<VendorGroup> {
        let mut groups: Vec<VendorGroup> = Vec::new();
        for item in &self.items {
            match groups.iter_mut().find(|g| g.vendor_id == item.vendor_id) {
                Some(group) => group.items.push(item.clone()),
                None => groups.push(VendorGroup {
                    vendor_id: item.vendor_id,
                    vendor_name: item.vendor_name.clone(),
                    items: vec![item.clone()],
                }),
            }
        }
        groups
    }

    /// Empty the cart and evict it from storage.
    pub fn clear(&mut self) {
        self.items.clear();
        if let Err(e) = self.store.remove(keys::CART) {
            tracing::warn!(error = %e, "Failed to evict cart from storage");
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.set_json(keys::CART, &self.items) {
            tracing::warn!(error = %e, "Failed to persist cart");
        }
    }
}

impl std::fmt::Debug for Cart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cart")
            .field("items", &self.items)
            .finish_non_exhaustive()
    }
}

/// Merge duplicate ids and lift zero quantities from a stored cart.
fn normalize(stored: Vec<CartItem>) -> Vec<CartItem> {
    let mut items: Vec<CartItem> = Vec::with_capacity(stored.len());
    for mut item in stored {
        item.quantity = item.quantity.max(1);
        match items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => items.push(item),
        }
    }
    items
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::storage::MemoryStore;

    fn item(price: i64, quantity: u32, vendor: ProfileId) -> CartItem {
        CartItem {
            id: ProductId::generate(),
            name: "Jollof rice".to_string(),
            price: Naira::from_whole(price),
            quantity,
            vendor_id: vendor,
            vendor_name: "Mama Put".to_string(),
        }
    }

    fn empty_cart() -> (Arc<MemoryStore>, Cart) {
        let store = Arc::new(MemoryStore::new());
        let cart = Cart::load(store.clone());
        (store, cart)
    }

    #[test]
    fn test_adding_same_id_accumulates_quantity() {
        let (_, mut cart) = empty_cart();
        let line = item(1_500, 1, ProfileId::generate());

        cart.add(line.clone());
        cart.add(CartItem {
            quantity: 2,
            ..line.clone()
        });

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.get(&line.id).unwrap().quantity, 3);
    }

    #[test]
    fn test_zero_quantity_add_counts_as_one() {
        let (_, mut cart) = empty_cart();
        let line = item(100, 0, ProfileId::generate());
        cart.add(line.clone());
        assert_eq!(cart.get(&line.id).unwrap().quantity, 1);
    }

    #[test]
    fn test_decrement_below_one_is_noop() {
        let (_, mut cart) = empty_cart();
        let line = item(500, 1, ProfileId::generate());
        cart.add(line.clone());

        assert!(!cart.update_quantity(&line.id, -1));
        assert!(!cart.update_quantity(&line.id, -5));
        assert_eq!(cart.get(&line.id).unwrap().quantity, 1);

        assert!(cart.update_quantity(&line.id, 4));
        assert!(cart.update_quantity(&line.id, -2));
        assert_eq!(cart.get(&line.id).unwrap().quantity, 3);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let (_, mut cart) = empty_cart();
        assert!(!cart.update_quantity(&ProductId::generate(), 1));
    }

    #[test]
    fn test_remove_filters_by_id() {
        let (_, mut cart) = empty_cart();
        let vendor = ProfileId::generate();
        let a = item(100, 1, vendor);
        let b = item(200, 1, vendor);
        cart.add(a.clone());
        cart.add(b.clone());

        cart.remove(&a.id);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].id, b.id);
    }

    #[test]
    fn test_total_tracks_every_operation() {
        let (_, mut cart) = empty_cart();
        let vendor = ProfileId::generate();
        let a = item(1_200, 2, vendor);
        let b = CartItem {
            price: Naira::new(Decimal::new(75_050, 2)),
            ..item(0, 1, vendor)
        };

        cart.add(a.clone());
        cart.add(b.clone());
        cart.update_quantity(&b.id, 2);
        cart.add(a.clone());
        cart.update_quantity(&a.id, -1);
        cart.remove(&ProductId::generate());

        let expected: Naira = cart.items().iter().map(|i| i.price * i.quantity).sum();
        assert_eq!(cart.total(), expected);
        // a: 1200 × 3, b: 750.50 × 3
        assert_eq!(cart.total(), Naira::new(Decimal::new(585_150, 2)));
        assert_eq!(cart.item_count(), 6);
    }

    #[test]
    fn test_mutations_persist_and_reload() {
        let (store, mut cart) = empty_cart();
        let line = item(300, 2, ProfileId::generate());
        cart.add(line.clone());

        let reloaded = Cart::load(store);
        assert_eq!(reloaded.items(), cart.items());
    }

    #[test]
    fn test_clear_empties_and_evicts_storage() {
        let (store, mut cart) = empty_cart();
        cart.add(item(300, 2, ProfileId::generate()));
        assert!(store.get(keys::CART).unwrap().is_some());

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total(), Naira::ZERO);
        assert!(store.get(keys::CART).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_storage_loads_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(keys::CART, "{\"not\": \"an array\"}").unwrap();
        let cart = Cart::load(store);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_load_merges_duplicate_lines() {
        let store = Arc::new(MemoryStore::new());
        let line = item(100, 1, ProfileId::generate());
        store
            .set_json(keys::CART, &vec![line.clone(), line.clone()])
            .unwrap();

        let cart = Cart::load(store);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.get(&line.id).unwrap().quantity, 2);
    }

    #[test]
    fn test_vendor_groups_preserve_first_seen_order() {
        let (_, mut cart) = empty_cart();
        let v1 = ProfileId::generate();
        let v2 = ProfileId::generate();
        cart.add(item(100, 1, v1));
        cart.add(item(200, 2, v2));
        cart.add(item(300, 1, v1));

        let groups = cart.vendor_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].vendor_id, v1);
        assert_eq!(groups[0].items.len(), 2);
        assert_eq!(groups[0].subtotal(), Naira::from_whole(400));
        assert_eq!(groups[1].subtotal(), Naira::from_whole(400));
    }
}
