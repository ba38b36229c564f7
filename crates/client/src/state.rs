//! Application state shared across commands.

use std::sync::Arc;

use secrecy::ExposeSecret;

use crate::backend::{AuthClient, AuthSession, BackendClient, BackendError, RealtimeClient};
use crate::boundary::ErrorBoundary;
use crate::cart::Cart;
use crate::config::ClientConfig;
use crate::notify::Toasts;
use crate::services::{AdminService, CheckoutService, SubscriptionService, WalletService};
use crate::session::{AddressBook, SessionFlags};
use crate::storage::KeyValueStore;

/// Application state shared across the front end.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// backend clients, the local store and the notification queue.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ClientConfig,
    store: Arc<dyn KeyValueStore>,
    backend: BackendClient,
    auth: AuthClient,
    toasts: Toasts,
    boundary: ErrorBoundary,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Client configuration
    /// * `store` - Key-value store for the cart, flags and saved session
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, store: Arc<dyn KeyValueStore>) -> Result<Self, BackendError> {
        let backend = BackendClient::new(&config)?;
        let auth = AuthClient::new(backend.clone(), Arc::clone(&store));
        let toasts = Toasts::default();
        let boundary = ErrorBoundary::new(SessionFlags::new(Arc::clone(&store)), toasts.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                backend,
                auth,
                toasts,
                boundary,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.inner.store
    }

    /// The anonymous backend client. Use [`AppState::backend_for`] for
    /// anything that needs the signed-in user.
    #[must_use]
    pub fn backend(&self) -> &BackendClient {
        &self.inner.backend
    }

    #[must_use]
    pub fn backend_for(&self, session: &AuthSession) -> BackendClient {
        self.inner.auth.backend_for(session)
    }

    #[must_use]
    pub fn auth(&self) -> &AuthClient {
        &self.inner.auth
    }

    #[must_use]
    pub fn toasts(&self) -> &Toasts {
        &self.inner.toasts
    }

    #[must_use]
    pub fn boundary(&self) -> &ErrorBoundary {
        &self.inner.boundary
    }

    #[must_use]
    pub fn flags(&self) -> SessionFlags {
        SessionFlags::new(Arc::clone(&self.inner.store))
    }

    #[must_use]
    pub fn address_book(&self) -> AddressBook {
        AddressBook::new(Arc::clone(&self.inner.store))
    }

    /// Load the persisted cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        Cart::load(Arc::clone(&self.inner.store))
    }

    /// A realtime client, joining as the session's user when there is one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend URL has no websocket equivalent.
    pub fn realtime(&self, session: Option<&AuthSession>) -> Result<RealtimeClient, BackendError> {
        let client = RealtimeClient::new(&self.inner.backend)?
            .with_reconnect_delay(self.inner.config.retry_delay);
        Ok(match session {
            Some(session) => client.with_access_token(session.access_token.expose_secret()),
            None => client,
        })
    }

    #[must_use]
    pub fn checkout(&self) -> CheckoutService {
        CheckoutService::new(self.clone())
    }

    #[must_use]
    pub fn wallet(&self) -> WalletService {
        WalletService::new(self.clone())
    }

    #[must_use]
    pub fn subscriptions(&self) -> SubscriptionService {
        SubscriptionService::new(self.clone())
    }

    #[must_use]
    pub fn admin(&self) -> AdminService {
        AdminService::new(self.clone())
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.inner.config)
            .field("backend", &self.inner.backend)
            .finish_non_exhaustive()
    }
}
