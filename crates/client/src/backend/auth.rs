//! Hosted auth: password sign-in, sign-up, token refresh and sign-out.
//!
//! The session is persisted under [`keys::AUTH_SESSION`] so the CLI stays
//! signed in between runs. Tokens are held as [`SecretString`] in memory and
//! only exposed when building request headers or writing the store.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, TimeZone, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use swiftdrop_core::{Email, EmailError, ProfileId, Role};
use thiserror::Error;
use tracing::instrument;

use super::{BackendClient, BackendError, handle_response, parse_error};
use crate::session::SessionFlags;
use crate::storage::{JsonStoreExt, KeyValueStore, StorageError, keys};

/// Sessions that expire within this window are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Errors from the auth endpoints.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Session expired, please sign in again")]
    SessionExpired,

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Password rejected: {0}")]
    WeakPassword(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Email(#[from] EmailError),
}

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: ProfileId,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<Role>,
}

/// An active session.
#[derive(Clone)]
pub struct AuthSession {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub expires_at: DateTime<Utc>,
    pub user: AuthUser,
}

impl AuthSession {
    /// Whether the access token expires within `margin` of `now`.
    #[must_use]
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at - margin <= now
    }

    /// Role from user metadata, falling back to the token's role claim.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.user.role.or_else(|| {
            decode_claims(self.access_token.expose_secret())
                .ok()
                .and_then(|claims| claims.role)
                .and_then(|role| role.parse().ok())
        })
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// What the store holds. Only this type ever sees raw tokens.
#[derive(Serialize, Deserialize)]
struct PersistedSession {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
    user: AuthUser,
}

impl From<PersistedSession> for AuthSession {
    fn from(p: PersistedSession) -> Self {
        Self {
            access_token: SecretString::from(p.access_token),
            refresh_token: SecretString::from(p.refresh_token),
            expires_at: p.expires_at,
            user: p.user,
        }
    }
}

impl From<&AuthSession> for PersistedSession {
    fn from(s: &AuthSession) -> Self {
        Self {
            access_token: s.access_token.expose_secret().to_string(),
            refresh_token: s.refresh_token.expose_secret().to_string(),
            expires_at: s.expires_at,
            user: s.user.clone(),
        }
    }
}

/// Result of a sign-up.
#[derive(Debug)]
pub enum SignUpOutcome {
    /// Accounts are auto-confirmed; the user is signed in.
    SignedIn(AuthSession),
    /// A confirmation email was sent; sign in after confirming.
    ConfirmationRequired(AuthUser),
}

/// Unverified JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Decode a JWT payload without verifying the signature.
///
/// The backend verifies every token it receives; the client only reads the
/// claims for display and expiry checks.
///
/// # Errors
///
/// Returns [`AuthError::InvalidToken`] if the token is not three segments or
/// the payload is not base64url JSON.
pub fn decode_claims(jwt: &str) -> Result<Claims, AuthError> {
    let mut parts = jwt.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::InvalidToken("expected three segments".to_string()));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| AuthError::InvalidToken(e.to_string()))
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: RawUser,
}

#[derive(Deserialize)]
struct RawUser {
    id: ProfileId,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Default, Deserialize)]
struct UserMetadata {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    role: Option<Role>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(RawUser),
}

impl From<RawUser> for AuthUser {
    fn from(raw: RawUser) -> Self {
        Self {
            id: raw.id,
            email: raw.email,
            full_name: raw.user_metadata.full_name,
            role: raw.user_metadata.role,
        }
    }
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> AuthSession {
        let expires_at = self
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(|| now + Duration::seconds(self.expires_in.unwrap_or(3600)));
        AuthSession {
            access_token: SecretString::from(self.access_token),
            refresh_token: SecretString::from(self.refresh_token),
            expires_at,
            user: self.user.into(),
        }
    }
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct SignUpBody<'a> {
    email: &'a str,
    password: &'a str,
    data: SignUpMetadata<'a>,
}

#[derive(Serialize)]
struct SignUpMetadata<'a> {
    full_name: &'a str,
    role: Role,
}

// =============================================================================
// AuthClient
// =============================================================================

/// Client for the hosted auth endpoints.
#[derive(Clone)]
pub struct AuthClient {
    backend: BackendClient,
    store: Arc<dyn KeyValueStore>,
}

impl AuthClient {
    #[must_use]
    pub fn new(backend: BackendClient, store: Arc<dyn KeyValueStore>) -> Self {
        Self { backend, store }
    }

    fn endpoint(&self, path: &str) -> Result<url::Url, BackendError> {
        Ok(self.backend.base_url().join(&format!("auth/v1/{path}"))?)
    }

    /// Sign in with email and password and persist the session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if the backend rejects the
    /// login, or a backend/storage error.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, AuthError> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .backend
            .http()
            .post(url)
            .json(&PasswordGrant {
                email: email.as_str(),
                password: password.expose_secret(),
            })
            .send()
            .await
            .map_err(BackendError::from)?;

        if !response.status().is_success() {
            return Err(match parse_error(response).await {
                BackendError::Api { status: 400, .. } | BackendError::Unauthorized(_) => {
                    AuthError::InvalidCredentials
                }
                other => other.into(),
            });
        }

        let token: TokenResponse = handle_response(response).await?;
        let session = token.into_session(Utc::now());
        self.persist(&session)?;
        SessionFlags::new(Arc::clone(&self.store)).clear_auth_error();
        tracing::info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    /// Register a new account.
    ///
    /// Name and role travel as user metadata; the backend creates the
    /// matching profile row.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::WeakPassword`] if the password policy rejects the
    /// password, or a backend/storage error.
    #[instrument(skip(self, password), fields(email = %email, role = %role))]
    pub async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        full_name: &str,
        role: Role,
    ) -> Result<SignUpOutcome, AuthError> {
        let url = self.endpoint("signup")?;
        let response = self
            .backend
            .http()
            .post(url)
            .json(&SignUpBody {
                email: email.as_str(),
                password: password.expose_secret(),
                data: SignUpMetadata { full_name, role },
            })
            .send()
            .await
            .map_err(BackendError::from)?;

        if !response.status().is_success() {
            return Err(match parse_error(response).await {
                BackendError::Api {
                    code: Some(code),
                    message,
                    ..
                } if code == "weak_password" => AuthError::WeakPassword(message),
                other => other.into(),
            });
        }

        match handle_response::<SignUpResponse>(response).await? {
            SignUpResponse::Session(token) => {
                let session = token.into_session(Utc::now());
                self.persist(&session)?;
                tracing::info!(user_id = %session.user.id, "Signed up and signed in");
                Ok(SignUpOutcome::SignedIn(session))
            }
            SignUpResponse::User(user) => {
                tracing::info!(user_id = %user.id, "Signed up, confirmation required");
                Ok(SignUpOutcome::ConfirmationRequired(user.into()))
            }
        }
    }

    /// Exchange the stored refresh token for a new session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotSignedIn`] without a stored session, or
    /// [`AuthError::SessionExpired`] if the refresh token is rejected.
    pub async fn refresh(&self) -> Result<AuthSession, AuthError> {
        let session = self.stored_session()?.ok_or(AuthError::NotSignedIn)?;
        self.refresh_with(&session.refresh_token).await
    }

    #[instrument(skip_all)]
    async fn refresh_with(&self, refresh_token: &SecretString) -> Result<AuthSession, AuthError> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");

        let response = self
            .backend
            .http()
            .post(url)
            .json(&RefreshGrant {
                refresh_token: refresh_token.expose_secret(),
            })
            .send()
            .await
            .map_err(BackendError::from)?;

        if !response.status().is_success() {
            return Err(match parse_error(response).await {
                BackendError::Api { status: 400..=499, .. }
                | BackendError::Unauthorized(_)
                | BackendError::NotFound(_) => AuthError::SessionExpired,
                other => other.into(),
            });
        }

        let token: TokenResponse = handle_response(response).await?;
        let session = token.into_session(Utc::now());
        self.persist(&session)?;
        tracing::debug!(user_id = %session.user.id, "Session refreshed");
        Ok(session)
    }

    /// Revoke the session server-side and forget it locally.
    ///
    /// The local session is cleared even if the logout call fails.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the session cannot be evicted.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(session) = self.stored_session()? {
            match self.revoke(&session).await {
                Ok(()) => tracing::info!(user_id = %session.user.id, "Signed out"),
                Err(e) => tracing::warn!(error = %e, "Logout request failed, clearing local session anyway"),
            }
        }
        self.store.remove(keys::AUTH_SESSION)?;
        Ok(())
    }

    async fn revoke(&self, session: &AuthSession) -> Result<(), BackendError> {
        let url = self.endpoint("logout")?;
        let response = self
            .backend
            .http()
            .post(url)
            .bearer_auth(session.access_token.expose_secret())
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(parse_error(response).await)
        }
    }

    /// The current session, refreshed if it is about to expire.
    ///
    /// A rejected refresh raises the auth-error flag, evicts the stored
    /// session and returns [`AuthError::SessionExpired`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SessionExpired`] as above, or a transport or
    /// storage error (the stored session is kept in that case).
    pub async fn current_session(&self) -> Result<Option<AuthSession>, AuthError> {
        let Some(session) = self.stored_session()? else {
            return Ok(None);
        };
        if !session.expires_within(Duration::seconds(REFRESH_MARGIN_SECS), Utc::now()) {
            return Ok(Some(session));
        }

        match self.refresh_with(&session.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(AuthError::SessionExpired) => {
                tracing::warn!(user_id = %session.user.id, "Refresh rejected, session expired");
                SessionFlags::new(Arc::clone(&self.store)).mark_auth_error();
                self.store.remove(keys::AUTH_SESSION)?;
                Err(AuthError::SessionExpired)
            }
            Err(e) => Err(e),
        }
    }

    /// Like [`AuthClient::current_session`], but a missing session is an error.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotSignedIn`] if nobody is signed in.
    pub async fn require_session(&self) -> Result<AuthSession, AuthError> {
        self.current_session().await?.ok_or(AuthError::NotSignedIn)
    }

    /// A backend client acting as the session's user.
    #[must_use]
    pub fn backend_for(&self, session: &AuthSession) -> BackendClient {
        self.backend.authed(session.access_token.clone())
    }

    fn stored_session(&self) -> Result<Option<AuthSession>, AuthError> {
        match self.store.get_json::<PersistedSession>(keys::AUTH_SESSION) {
            Ok(stored) => Ok(stored.map(AuthSession::from)),
            Err(StorageError::Corrupt { .. }) => {
                tracing::warn!("Discarding unreadable auth session");
                self.store.remove(keys::AUTH_SESSION)?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn persist(&self, session: &AuthSession) -> Result<(), AuthError> {
        self.store
            .set_json(keys::AUTH_SESSION, &PersistedSession::from(session))?;
        Ok(())
    }
}

impl std::fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::config::{BackendConfig, ClientConfig};
    use crate::storage::MemoryStore;

    const USER_ID: &str = "5f0c7c1e-2d7a-4c1b-9a51-0c3f1e9b6a11";

    fn jwt(payload: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.signature")
    }

    fn token_body(access: &str, expires_in: i64) -> serde_json::Value {
        json!({
            "access_token": access,
            "token_type": "bearer",
            "expires_in": expires_in,
            "refresh_token": "refresh-1",
            "user": {
                "id": USER_ID,
                "email": "ada@example.ng",
                "user_metadata": { "full_name": "Ada Obi", "role": "customer" }
            }
        })
    }

    fn auth_for(server: &MockServer) -> (Arc<MemoryStore>, AuthClient) {
        let config = ClientConfig::new(BackendConfig::new(
            url::Url::parse(&server.base_url()).unwrap(),
            "anon-key",
        ));
        let store = Arc::new(MemoryStore::new());
        let client = AuthClient::new(BackendClient::new(&config).unwrap(), store.clone());
        (store, client)
    }

    fn stored_session(expires_at: DateTime<Utc>) -> PersistedSession {
        PersistedSession {
            access_token: "old-access".to_string(),
            refresh_token: "old-refresh".to_string(),
            expires_at,
            user: AuthUser {
                id: USER_ID.parse().unwrap(),
                email: Some("ada@example.ng".to_string()),
                full_name: None,
                role: Some(Role::Customer),
            },
        }
    }

    #[test]
    fn test_decode_claims() {
        let token = jwt(&json!({ "sub": USER_ID, "exp": 1_700_000_000, "role": "authenticated" }));
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.sub, USER_ID);
        assert_eq!(claims.exp, 1_700_000_000);
        assert_eq!(claims.role.as_deref(), Some("authenticated"));
        assert_eq!(claims.email, None);
    }

    #[test]
    fn test_decode_claims_rejects_garbage() {
        assert!(matches!(decode_claims("abc"), Err(AuthError::InvalidToken(_))));
        assert!(matches!(decode_claims("a.!!!.c"), Err(AuthError::InvalidToken(_))));
        assert!(matches!(decode_claims("a.b.c.d"), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_session_debug_redacts_tokens() {
        let session = AuthSession::from(stored_session(Utc::now()));
        let debug = format!("{session:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("old-access"));
        assert!(!debug.contains("old-refresh"));
    }

    #[tokio::test]
    async fn test_sign_in_persists_session() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/auth/v1/token")
                    .query_param("grant_type", "password")
                    .header("apikey", "anon-key")
                    .json_body(json!({ "email": "ada@example.ng", "password": "hunter22" }));
                then.status(200).json_body(token_body("access-1", 3600));
            })
            .await;

        let (store, auth) = auth_for(&server);
        let email = Email::parse("ada@example.ng").unwrap();
        let session = auth
            .sign_in(&email, &SecretString::from("hunter22"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(session.user.role, Some(Role::Customer));
        assert_eq!(session.user.full_name.as_deref(), Some("Ada Obi"));
        assert!(store.get(keys::AUTH_SESSION).unwrap().is_some());

        let current = auth.current_session().await.unwrap().unwrap();
        assert_eq!(current.access_token.expose_secret(), "access-1");
    }

    #[tokio::test]
    async fn test_sign_in_bad_credentials() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/v1/token");
                then.status(400).json_body(json!({
                    "error": "invalid_grant",
                    "error_description": "Invalid login credentials"
                }));
            })
            .await;

        let (store, auth) = auth_for(&server);
        let email = Email::parse("ada@example.ng").unwrap();
        let err = auth
            .sign_in(&email, &SecretString::from("wrong"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_sign_up_requiring_confirmation() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/auth/v1/signup")
                    .json_body_partial(r#"{ "data": { "full_name": "Tunde", "role": "rider" } }"#);
                then.status(200).json_body(json!({
                    "id": USER_ID,
                    "email": "tunde@example.ng",
                    "user_metadata": { "full_name": "Tunde", "role": "rider" }
                }));
            })
            .await;

        let (store, auth) = auth_for(&server);
        let email = Email::parse("tunde@example.ng").unwrap();
        let outcome = auth
            .sign_up(&email, &SecretString::from("long-password"), "Tunde", Role::Rider)
            .await
            .unwrap();

        match outcome {
            SignUpOutcome::ConfirmationRequired(user) => assert_eq!(user.role, Some(Role::Rider)),
            SignUpOutcome::SignedIn(_) => panic!("expected confirmation"),
        }
        assert!(store.get(keys::AUTH_SESSION).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_weak_password() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/v1/signup");
                then.status(422).json_body(json!({
                    "code": 422,
                    "error_code": "weak_password",
                    "msg": "Password should be at least 6 characters."
                }));
            })
            .await;

        let (_, auth) = auth_for(&server);
        let email = Email::parse("tunde@example.ng").unwrap();
        let err = auth
            .sign_up(&email, &SecretString::from("abc"), "Tunde", Role::Rider)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::WeakPassword(ref m) if m.contains("6 characters")));
    }

    #[tokio::test]
    async fn test_expiring_session_is_refreshed() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/auth/v1/token")
                    .query_param("grant_type", "refresh_token")
                    .json_body(json!({ "refresh_token": "old-refresh" }));
                then.status(200).json_body(token_body("access-2", 3600));
            })
            .await;

        let (store, auth) = auth_for(&server);
        store
            .set_json(keys::AUTH_SESSION, &stored_session(Utc::now() + Duration::seconds(30)))
            .unwrap();

        let session = auth.current_session().await.unwrap().unwrap();
        mock.assert_async().await;
        assert_eq!(session.access_token.expose_secret(), "access-2");
        assert!(!session.expires_within(Duration::seconds(60), Utc::now()));
    }

    #[tokio::test]
    async fn test_rejected_refresh_expires_session() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/v1/token");
                then.status(400).json_body(json!({
                    "error": "invalid_grant",
                    "error_description": "Invalid Refresh Token"
                }));
            })
            .await;

        let (store, auth) = auth_for(&server);
        store
            .set_json(keys::AUTH_SESSION, &stored_session(Utc::now() - Duration::hours(1)))
            .unwrap();

        let err = auth.current_session().await.unwrap_err();
        assert!(matches!(err, AuthError::SessionExpired));
        assert!(store.get(keys::AUTH_SESSION).unwrap().is_none());
        assert!(SessionFlags::new(store.clone()).has_auth_error());
    }

    #[tokio::test]
    async fn test_sign_out_clears_even_when_logout_fails() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/auth/v1/logout")
                    .header("authorization", "Bearer old-access");
                then.status(500);
            })
            .await;

        let (store, auth) = auth_for(&server);
        store
            .set_json(keys::AUTH_SESSION, &stored_session(Utc::now() + Duration::hours(1)))
            .unwrap();

        auth.sign_out().await.unwrap();
        mock.assert_async().await;
        assert!(auth.current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_require_session_without_sign_in() {
        let server = MockServer::start_async().await;
        let (_, auth) = auth_for(&server);
        assert!(matches!(
            auth.require_session().await,
            Err(AuthError::NotSignedIn)
        ));
    }
}
