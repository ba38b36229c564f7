//! SwiftDrop client library.
//!
//! Everything the marketplace front ends need on top of the hosted backend:
//!
//! - [`backend`] - REST tables, auth, and the realtime change feed
//! - [`db`] - Typed repositories over the hosted tables
//! - [`cart`] - The locally persisted shopping cart
//! - [`payments`] - Paystack and Squad checkout configuration and callbacks
//! - [`services`] - Checkout, wallet, subscription and admin flows
//! - [`storage`] - The injected key-value store (cart, flags, saved addresses)
//! - [`boundary`] - Top-level error boundary with reload / soft-retry actions
//!
//! The hosted backend owns and validates every row. The only state this crate
//! owns is what lives in the [`storage::KeyValueStore`] it is given.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod boundary;
pub mod cart;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod payments;
pub mod retry;
pub mod services;
pub mod session;
pub mod state;
pub mod storage;

pub use boundary::{ErrorBoundary, Failure, RecoveryAction};
pub use cart::{Cart, CartItem};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use state::AppState;
