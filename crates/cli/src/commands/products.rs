//! Product commands for shoppers and vendors.

use clap::Subcommand;
use rust_decimal::Decimal;
use swiftdrop_client::backend::LiveQuery;
use swiftdrop_client::db::ProductRepository;
use swiftdrop_client::models::{NewProduct, Product, ProductUpdate};
use swiftdrop_client::{AppState, ClientError};
use swiftdrop_core::{Naira, ProductId, ProfileId, Role};

use super::{session, truncate};

#[derive(Subcommand)]
pub enum ProductsAction {
    /// List products in stock, or one vendor's catalogue
    List {
        #[arg(long)]
        vendor: Option<ProfileId>,
    },
    /// Keep the in-stock list on screen, refreshed on every change
    Watch,
    /// List a new product (vendors)
    Add {
        #[arg(short, long)]
        name: String,
        /// Price in naira
        #[arg(short, long)]
        price: Decimal,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
    },
    /// Change a product's price (vendors)
    Price { id: ProductId, price: Decimal },
    /// Mark a product in or out of stock (vendors)
    Stock {
        id: ProductId,
        #[arg(long = "in", conflicts_with = "out_of_stock")]
        in_stock: bool,
        #[arg(long = "out")]
        out_of_stock: bool,
    },
    /// Delete a product (vendors)
    Remove { id: ProductId },
}

pub async fn run(state: &AppState, action: &ProductsAction) -> Result<(), ClientError> {
    match action {
        ProductsAction::List { vendor } => {
            let repo = ProductRepository::new(state.backend());
            let products = match vendor {
                Some(vendor) => repo.list_by_vendor(*vendor).await?,
                None => repo.list_available().await?,
            };
            print_products(&products);
        }
        ProductsAction::Watch => watch(state).await?,
        ProductsAction::Add {
            name,
            price,
            description,
            category,
            image_url,
        } => {
            let session = vendor_session(state).await?;
            let backend = state.backend_for(&session);
            let product = ProductRepository::new(&backend)
                .create(&NewProduct {
                    vendor_id: session.user.id,
                    name: name.trim().to_string(),
                    description: description.clone(),
                    price: Naira::new(*price),
                    image_url: image_url.clone(),
                    category: category.clone(),
                    in_stock: true,
                })
                .await?;
            state
                .toasts()
                .success(format!("Listed {} ({})", product.name, product.id));
        }
        ProductsAction::Price { id, price } => {
            let session = vendor_session(state).await?;
            let backend = state.backend_for(&session);
            let product = ProductRepository::new(&backend)
                .update(
                    *id,
                    &ProductUpdate {
                        price: Some(Naira::new(*price)),
                        ..ProductUpdate::default()
                    },
                )
                .await?;
            state
                .toasts()
                .success(format!("{} now costs {}", product.name, product.price));
        }
        ProductsAction::Stock {
            id,
            in_stock,
            out_of_stock,
        } => {
            if in_stock == out_of_stock {
                return Err(ClientError::BadRequest(
                    "Pass exactly one of --in or --out".to_string(),
                ));
            }
            let session = vendor_session(state).await?;
            let backend = state.backend_for(&session);
            let product = ProductRepository::new(&backend)
                .set_stock(*id, *in_stock)
                .await?;
            let label = if product.in_stock { "in stock" } else { "out of stock" };
            state.toasts().success(format!("{} is {label}", product.name));
        }
        ProductsAction::Remove { id } => {
            let session = vendor_session(state).await?;
            let backend = state.backend_for(&session);
            ProductRepository::new(&backend).delete(*id).await?;
            state.toasts().success("Product removed");
        }
    }
    Ok(())
}

async fn vendor_session(
    state: &AppState,
) -> Result<swiftdrop_client::backend::AuthSession, ClientError> {
    let session = session(state).await?;
    if session.role() != Some(Role::Vendor) {
        return Err(ClientError::Unauthorized(
            "Only vendors can manage products".to_string(),
        ));
    }
    Ok(session)
}

async fn watch(state: &AppState) -> Result<(), ClientError> {
    let changes = state.realtime(None)?.subscribe("products");
    let backend = state.backend().clone();
    let mut live = LiveQuery::start(changes, move || {
        let backend = backend.clone();
        async move { ProductRepository::new(&backend).list_available().await }
    })
    .await;

    print_products(&live.current());
    println!("(watching for changes, Ctrl-C to stop)");
    loop {
        tokio::select! {
            changed = live.changed() => {
                if !changed {
                    return Ok(());
                }
                println!();
                print_products(&live.current());
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

fn print_products(products: &[Product]) {
    if products.is_empty() {
        println!("No products found");
        return;
    }
    println!("{:<36}  {:<28}  {:>12}  {:<20}  STOCK", "ID", "NAME", "PRICE", "VENDOR");
    for product in products {
        println!(
            "{:<36}  {:<28}  {:>12}  {:<20}  {}",
            product.id.to_string(),
            truncate(&product.name, 28),
            product.price.to_string(),
            truncate(product.vendor_name().unwrap_or("-"), 20),
            if product.in_stock { "yes" } else { "no" }
        );
    }
}
