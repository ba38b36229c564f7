//! Core types for SwiftDrop.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod contact;
pub mod id;
pub mod money;
pub mod status;

pub use contact::{Email, EmailError, PhoneError, PhoneNumber};
pub use id::*;
pub use money::{CURRENCY_CODE, KOBO_PER_NAIRA, Kobo, MoneyError, Naira};
pub use status::*;
