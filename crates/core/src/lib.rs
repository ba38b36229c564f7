//! SwiftDrop Core - Shared types library.
//!
//! This crate provides common types used across all SwiftDrop components:
//! - `client` - Marketplace client library (backend, cart, payments)
//! - `cli` - Terminal front end for customers, riders, vendors and admins
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients,
//! no storage. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, contacts, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
