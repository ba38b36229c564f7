//! Small persisted flags and the per-user delivery address book.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use swiftdrop_core::ProfileId;
use thiserror::Error;

use crate::storage::{JsonStoreExt, KeyValueStore, StorageError, keys};

/// Session-wide flags kept in the store.
///
/// Flag writes are best effort: a storage failure is logged and the flag
/// reads as unset afterwards.
#[derive(Clone)]
pub struct SessionFlags {
    store: Arc<dyn KeyValueStore>,
}

impl SessionFlags {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn set_admin_session(&self) {
        self.set(keys::ADMIN_SESSION);
    }

    #[must_use]
    pub fn is_admin_session(&self) -> bool {
        self.is_set(keys::ADMIN_SESSION)
    }

    pub fn clear_admin_session(&self) {
        self.clear(keys::ADMIN_SESSION);
    }

    /// Record that the session could not be refreshed.
    pub fn mark_auth_error(&self) {
        self.set(keys::AUTH_ERROR);
    }

    #[must_use]
    pub fn has_auth_error(&self) -> bool {
        self.is_set(keys::AUTH_ERROR)
    }

    pub fn clear_auth_error(&self) {
        self.clear(keys::AUTH_ERROR);
    }

    fn set(&self, key: &str) {
        if let Err(e) = self.store.set(key, "true") {
            tracing::warn!(key, error = %e, "Failed to set session flag");
        }
    }

    fn is_set(&self, key: &str) -> bool {
        match self.store.get(key) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read session flag");
                false
            }
        }
    }

    fn clear(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            tracing::warn!(key, error = %e, "Failed to clear session flag");
        }
    }
}

impl std::fmt::Debug for SessionFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFlags").finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("Delivery address cannot be empty")]
    Blank,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Serialize, Deserialize)]
struct StoredAddress {
    address: String,
}

/// Saved delivery addresses, one per user.
#[derive(Clone)]
pub struct AddressBook {
    store: Arc<dyn KeyValueStore>,
}

impl AddressBook {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The user's saved address. An unreadable entry counts as none.
    #[must_use]
    pub fn load(&self, user: &ProfileId) -> Option<String> {
        match self
            .store
            .get_json::<StoredAddress>(&keys::delivery_address(user))
        {
            Ok(stored) => stored.map(|s| s.address),
            Err(e) => {
                tracing::warn!(user_id = %user, error = %e, "Ignoring unreadable delivery address");
                None
            }
        }
    }

    /// Save the user's address, trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::Blank`] for an empty address, or a storage error.
    pub fn save(&self, user: &ProfileId, address: &str) -> Result<(), AddressError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(AddressError::Blank);
        }
        self.store.set_json(
            &keys::delivery_address(user),
            &StoredAddress {
                address: address.to_string(),
            },
        )?;
        Ok(())
    }
}

impl std::fmt::Debug for AddressBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressBook").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_admin_flag() {
        let flags = SessionFlags::new(Arc::new(MemoryStore::new()));
        assert!(!flags.is_admin_session());
        flags.set_admin_session();
        assert!(flags.is_admin_session());
        flags.clear_admin_session();
        assert!(!flags.is_admin_session());
    }

    #[test]
    fn test_auth_error_flag() {
        let store = Arc::new(MemoryStore::new());
        let flags = SessionFlags::new(store.clone());
        flags.mark_auth_error();
        assert!(SessionFlags::new(store).has_auth_error());
        flags.clear_auth_error();
        assert!(!flags.has_auth_error());
    }

    #[test]
    fn test_addresses_are_per_user() {
        let book = AddressBook::new(Arc::new(MemoryStore::new()));
        let ada = ProfileId::generate();
        let tunde = ProfileId::generate();

        book.save(&ada, "  12 Allen Avenue, Ikeja  ").unwrap();
        assert_eq!(book.load(&ada).as_deref(), Some("12 Allen Avenue, Ikeja"));
        assert_eq!(book.load(&tunde), None);
    }

    #[test]
    fn test_blank_address_rejected() {
        let book = AddressBook::new(Arc::new(MemoryStore::new()));
        let user = ProfileId::generate();
        assert!(matches!(book.save(&user, "   "), Err(AddressError::Blank)));
        assert_eq!(book.load(&user), None);
    }
}
