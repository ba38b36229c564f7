//! Row types for the hosted tables.
//!
//! Rows are what the backend returns; the client validates what it sends
//! (phone numbers, account numbers, positive prices) and trusts the backend
//! for everything else.

pub mod delivery;
pub mod order;
pub mod product;
pub mod profile;
pub mod rider;
pub mod subscription;
pub mod wallet;

pub use delivery::Delivery;
pub use order::{NewOrder, Order, OrderLine};
pub use product::{NewProduct, Product, ProductUpdate, VendorSummary};
pub use profile::{Profile, ProfileUpdate};
pub use rider::{AccountNumber, AccountNumberError, NewRiderDocument, RiderBankDetails, RiderDocument};
pub use subscription::{NewStudentSubscription, StudentSubscription};
pub use wallet::{NewWalletTransaction, WalletTransaction, balance};
