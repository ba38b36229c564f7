//! Cart commands.

use clap::Subcommand;
use swiftdrop_client::db::ProductRepository;
use swiftdrop_client::error::add_breadcrumb;
use swiftdrop_client::{AppState, ClientError};
use swiftdrop_core::ProductId;

use super::truncate;

#[derive(Subcommand)]
pub enum CartAction {
    /// Add a product
    Add {
        id: ProductId,
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        quantity: u32,
    },
    /// Remove a product entirely
    Remove { id: ProductId },
    /// Change a quantity by a step, e.g. `qty <id> -1`
    Qty {
        id: ProductId,
        #[arg(allow_hyphen_values = true)]
        delta: i64,
    },
    /// Show the cart grouped by vendor
    Show,
    /// Empty the cart
    Clear,
}

pub async fn run(state: &AppState, action: &CartAction) -> Result<(), ClientError> {
    let mut cart = state.cart();
    match action {
        CartAction::Add { id, quantity } => {
            let product = ProductRepository::new(state.backend())
                .get(*id)
                .await?
                .ok_or_else(|| ClientError::NotFound("Product".to_string()))?;
            if !product.in_stock {
                return Err(ClientError::BadRequest(format!(
                    "{} is out of stock",
                    product.name
                )));
            }

            let mut item = product.to_cart_item(product.vendor_name().unwrap_or("Vendor"));
            item.quantity = *quantity;
            cart.add(item);
            let product_id = id.to_string();
            add_breadcrumb("cart", "Added product", Some(&[("product_id", product_id.as_str())]));
            state
                .toasts()
                .success(format!("Added {} × {} to cart", quantity, product.name));
        }
        CartAction::Remove { id } => {
            let name = cart.get(id).map(|item| item.name.clone());
            cart.remove(id);
            match name {
                Some(name) => state.toasts().info(format!("Removed {name}")),
                None => state.toasts().info("That product was not in your cart"),
            }
        }
        CartAction::Qty { id, delta } => {
            if cart.update_quantity(id, *delta) {
                if let Some(item) = cart.get(id) {
                    state
                        .toasts()
                        .info(format!("{} × {}", item.quantity, item.name));
                }
            } else {
                state.toasts().info("Quantity unchanged");
            }
        }
        CartAction::Show => {
            if cart.is_empty() {
                println!("Your cart is empty");
                return Ok(());
            }
            for group in cart.vendor_groups() {
                println!("{}", group.vendor_name);
                for item in &group.items {
                    println!(
                        "  {:<28} {:>3} × {:>10}  {:>12}",
                        truncate(&item.name, 28),
                        item.quantity,
                        item.price.to_string(),
                        item.line_total().to_string()
                    );
                }
                println!("  {:<46}  {:>12}", "Subtotal", group.subtotal().to_string());
            }
            let quote = state.checkout().quote(&cart)?;
            println!();
            println!("Items     {:>12}", quote.subtotal.to_string());
            println!(
                "Delivery  {:>12}  ({} vendor{})",
                quote.delivery_fee.to_string(),
                quote.vendor_count,
                if quote.vendor_count == 1 { "" } else { "s" }
            );
            println!("Total     {:>12}", quote.total.to_string());
        }
        CartAction::Clear => {
            cart.clear();
            state.toasts().info("Cart cleared");
        }
    }
    Ok(())
}
