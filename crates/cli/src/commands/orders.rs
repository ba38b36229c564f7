//! Order history.

use clap::Subcommand;
use swiftdrop_client::db::OrderRepository;
use swiftdrop_client::models::Order;
use swiftdrop_client::{AppState, ClientError};
use swiftdrop_core::Role;

use super::{session, truncate};

#[derive(Subcommand)]
pub enum OrdersAction {
    /// Your orders, newest first (incoming orders for vendors)
    List,
}

pub async fn run(state: &AppState, action: &OrdersAction) -> Result<(), ClientError> {
    match action {
        OrdersAction::List => {
            let session = session(state).await?;
            let backend = state.backend_for(&session);
            let repo = OrderRepository::new(&backend);
            let orders = match session.role() {
                Some(Role::Vendor) => repo.list_for_vendor(session.user.id).await?,
                _ => repo.list_for_customer(session.user.id).await?,
            };
            print_orders(&orders);
        }
    }
    Ok(())
}

pub fn print_orders(orders: &[Order]) {
    if orders.is_empty() {
        println!("No orders yet");
        return;
    }
    println!(
        "{:<36}  {:<12}  {:<16}  {:>5}  {:>12}  ADDRESS",
        "ID", "PLACED", "STATUS", "ITEMS", "TOTAL"
    );
    for order in orders {
        println!(
            "{:<36}  {:<12}  {:<16}  {:>5}  {:>12}  {}",
            order.id.to_string(),
            order.created_at.format("%d %b %Y").to_string(),
            order.status.badge().to_string(),
            order.item_count(),
            order.total.to_string(),
            truncate(&order.delivery_address, 30)
        );
    }
}
