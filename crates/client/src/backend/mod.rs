//! Hosted backend client.
//!
//! # Architecture
//!
//! - The backend is source of truth - NO local copies of rows beyond the cart
//! - Tables are reached over REST (`/rest/v1/<table>`), auth over `/auth/v1`,
//!   change feeds over a websocket at `/realtime/v1/websocket`
//! - Reads retry with linear backoff; writes are sent once
//! - Profiles are cached in memory via `moka` (5 minute TTL)
//!
//! # Example
//!
//! ```rust,ignore
//! use swiftdrop_client::backend::{BackendClient, Direction, Query};
//!
//! let backend = BackendClient::new(&config)?;
//! let products: Vec<Product> = backend
//!     .select(&Query::table("products").eq("in_stock", true).order("name", Direction::Asc))
//!     .await?;
//! ```

pub mod auth;
mod query;
pub mod realtime;

pub use auth::{AuthClient, AuthError, AuthSession, AuthUser, Claims, SignUpOutcome};
pub use query::{Direction, Query};
pub use realtime::{ChangeEvent, ChangeKind, LiveQuery, RealtimeClient};

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use swiftdrop_core::ProfileId;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::config::ClientConfig;
use crate::models::Profile;
use crate::retry::{RetryPolicy, retry};

/// Errors that can occur when talking to the hosted backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend rejected the request.
    #[error("API error: {status} - {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Missing or expired credentials, or a row-level policy refused access.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Failed to parse a response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Failed to build a request URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Refused to send an update or delete without filters.
    #[error("Refusing unfiltered {0} on '{1}'")]
    Unfiltered(&'static str, &'static str),

    /// Realtime websocket failure.
    #[error("Realtime error: {0}")]
    Realtime(String),
}

/// Error body shapes returned by the REST and auth endpoints.
#[derive(Debug, Default, serde::Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiErrorBody {
    fn message(&self) -> Option<String> {
        self.message
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.error_description.clone())
            .or_else(|| self.error.clone())
    }

    fn code(&self) -> Option<String> {
        self.error_code
            .clone()
            .or_else(|| match &self.code {
                Some(serde_json::Value::String(s)) => Some(s.clone()),
                Some(serde_json::Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .or_else(|| self.error.clone())
    }
}

/// Client for the hosted backend's REST tables.
///
/// Cheap to clone. [`BackendClient::authed`] returns a copy that acts on
/// behalf of a signed-in user; the anon key is used otherwise.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
    access_token: Option<Arc<SecretString>>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: Url,
    anon_key: SecretString,
    retry: RetryPolicy,
    profiles: Cache<ProfileId, Profile>,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns error if the anon key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &ClientConfig) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(config.backend.anon_key())
                .map_err(|e| BackendError::Parse(format!("Invalid anon key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        let profiles = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                base_url: config.backend.url.clone(),
                anon_key: config.backend.anon_key.clone(),
                retry: RetryPolicy::new(config.retry_delay),
                profiles,
            }),
            access_token: None,
        })
    }

    /// A copy of this client that sends the given user access token.
    #[must_use]
    pub fn authed(&self, access_token: SecretString) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            access_token: Some(Arc::new(access_token)),
        }
    }

    /// Whether requests carry a user token.
    #[must_use]
    pub const fn is_authed(&self) -> bool {
        self.access_token.is_some()
    }

    pub(crate) fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub(crate) fn anon_key(&self) -> &str {
        self.inner.anon_key.expose_secret()
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.inner.client
    }

    pub(crate) fn profile_cache(&self) -> &Cache<ProfileId, Profile> {
        &self.inner.profiles
    }

    /// URL of a REST table.
    fn table_url(&self, table: &str) -> Result<Url, BackendError> {
        Ok(self.inner.base_url.join(&format!("rest/v1/{table}"))?)
    }

    /// Bearer token: the user's access token when signed in, the anon key otherwise.
    fn bearer(&self) -> &str {
        self.access_token
            .as_deref()
            .map_or_else(|| self.anon_key(), |token| token.expose_secret())
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.inner.client.request(method, url).bearer_auth(self.bearer())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetch every row matching the query. Retried on failure.
    ///
    /// # Errors
    ///
    /// Returns the last error if every attempt fails.
    #[instrument(skip(self, query), fields(table = %query.table_name()))]
    pub async fn select<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>, BackendError> {
        let this = self;
        retry(self.inner.retry, move || this.fetch_rows::<T>(query)).await
    }

    /// Fetch the first row matching the query, if any. Retried on failure.
    ///
    /// # Errors
    ///
    /// Returns the last error if every attempt fails.
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        query: &Query,
    ) -> Result<Option<T>, BackendError> {
        let query = query.clone().limit(1);
        Ok(self.select::<T>(&query).await?.into_iter().next())
    }

    async fn fetch_rows<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>, BackendError> {
        let url = self.table_url(query.table_name())?;
        let response = self
            .request(reqwest::Method::GET, url)
            .query(&query.params())
            .send()
            .await?;
        handle_response(response).await
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert one or more rows and return them as stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects the rows.
    #[instrument(skip(self, body))]
    pub async fn insert<T, B>(&self, table: &'static str, body: &B) -> Result<Vec<T>, BackendError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        let url = self.table_url(table)?;
        let response = self
            .request(reqwest::Method::POST, url)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        handle_response(response).await
    }

    /// Insert a single row and return it as stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails or returns no row.
    pub async fn insert_one<T, B>(&self, table: &'static str, body: &B) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        self.insert::<T, B>(table, body)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Parse(format!("insert into '{table}' returned no rows")))
    }

    /// Update every row matching the query's filters.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Unfiltered`] if the query has no filters, or
    /// an error if the request fails.
    #[instrument(skip(self, query, body), fields(table = %query.table_name()))]
    pub async fn update<T, B>(&self, query: &Query, body: &B) -> Result<Vec<T>, BackendError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        if !query.has_filters() {
            return Err(BackendError::Unfiltered("update", query.table_name()));
        }
        let url = self.table_url(query.table_name())?;
        let response = self
            .request(reqwest::Method::PATCH, url)
            .query(&query.filter_params())
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        handle_response(response).await
    }

    /// Insert or merge rows on a conflict column.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects the rows.
    #[instrument(skip(self, body))]
    pub async fn upsert<T, B>(
        &self,
        table: &'static str,
        body: &B,
        on_conflict: &str,
    ) -> Result<Vec<T>, BackendError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        let url = self.table_url(table)?;
        let response = self
            .request(reqwest::Method::POST, url)
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(body)
            .send()
            .await?;
        handle_response(response).await
    }

    /// Delete every row matching the query's filters.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Unfiltered`] if the query has no filters, or
    /// an error if the request fails.
    #[instrument(skip(self, query), fields(table = %query.table_name()))]
    pub async fn delete(&self, query: &Query) -> Result<(), BackendError> {
        if !query.has_filters() {
            return Err(BackendError::Unfiltered("delete", query.table_name()));
        }
        let url = self.table_url(query.table_name())?;
        let response = self
            .request(reqwest::Method::DELETE, url)
            .query(&query.filter_params())
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }
        Err(parse_error(response).await)
    }
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("authed", &self.is_authed())
            .finish_non_exhaustive()
    }
}

/// Handle an API response and parse JSON.
pub(crate) async fn handle_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let status = response.status();

    if status.is_success() {
        let body = response.text().await?;
        return serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            BackendError::Parse(format!("Failed to parse response: {e}"))
        });
    }

    Err(parse_error(response).await)
}

/// Parse an error response from the backend.
pub(crate) async fn parse_error(response: reqwest::Response) -> BackendError {
    let status = response.status().as_u16();

    // Check for rate limiting
    if status == 429 {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        return BackendError::RateLimited(retry_after);
    }

    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let body: ApiErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let message = body
        .message()
        .unwrap_or_else(|| text.chars().take(200).collect());

    tracing::error!(status, message = %message, "Backend returned non-success status");

    match status {
        401 | 403 => BackendError::Unauthorized(message),
        404 => BackendError::NotFound(message),
        _ => BackendError::Api {
            status,
            code: body.code(),
            message,
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use httpmock::Method::PATCH;
    use httpmock::prelude::*;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::config::BackendConfig;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        id: u32,
        name: String,
    }

    fn client_for(server: &MockServer) -> BackendClient {
        let mut config = ClientConfig::new(BackendConfig::new(
            Url::parse(&server.base_url()).unwrap(),
            "anon-key",
        ));
        config.retry_delay = Duration::from_millis(1);
        BackendClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_select_sends_keys_and_filters() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/products")
                    .header("apikey", "anon-key")
                    .header("authorization", "Bearer anon-key")
                    .query_param("select", "*")
                    .query_param("in_stock", "eq.true");
                then.status(200)
                    .json_body(json!([{ "id": 1, "name": "Suya" }]));
            })
            .await;

        let rows: Vec<Row> = client_for(&server)
            .select(&Query::table("products").eq("in_stock", true))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            rows,
            vec![Row {
                id: 1,
                name: "Suya".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_authed_client_sends_user_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/orders")
                    .header("apikey", "anon-key")
                    .header("authorization", "Bearer user-token");
                then.status(200).json_body(json!([]));
            })
            .await;

        let client = client_for(&server).authed(SecretString::from("user-token"));
        let rows: Vec<Row> = client.select(&Query::table("orders")).await.unwrap();

        mock.assert_async().await;
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_select_retries_then_surfaces_last_error() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/products");
                then.status(500).json_body(json!({
                    "code": "XX000",
                    "message": "boom",
                    "details": null,
                    "hint": null
                }));
            })
            .await;

        let err = client_for(&server)
            .select::<Row>(&Query::table("products"))
            .await
            .unwrap_err();

        assert_eq!(mock.hits_async().await, 4);
        match err {
            BackendError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 500);
                assert_eq!(code.as_deref(), Some("XX000"));
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_insert_is_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/rest/v1/orders")
                    .header("prefer", "return=representation");
                then.status(409).json_body(json!({
                    "code": "23505",
                    "message": "duplicate key value violates unique constraint"
                }));
            })
            .await;

        let result = client_for(&server)
            .insert::<Row, _>("orders", &json!({ "id": 1 }))
            .await;

        assert_eq!(mock.hits_async().await, 1);
        assert!(matches!(result, Err(BackendError::Api { status: 409, .. })));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PATCH).path("/rest/v1/profiles");
                then.status(401).json_body(json!({ "message": "JWT expired" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/rest/v1/products");
                then.status(429).header("Retry-After", "7");
            })
            .await;

        let client = client_for(&server);
        let err = client
            .update::<Row, _>(&Query::table("profiles").eq("id", 1), &json!({ "name": "x" }))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Unauthorized(ref m) if m == "JWT expired"));

        let err = client
            .delete(&Query::table("products").eq("id", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::RateLimited(7)));
    }

    #[tokio::test]
    async fn test_unfiltered_writes_are_refused() {
        let server = MockServer::start_async().await;
        let client = client_for(&server);

        let err = client.delete(&Query::table("products")).await.unwrap_err();
        assert!(matches!(err, BackendError::Unfiltered("delete", "products")));

        let err = client
            .update::<Row, _>(&Query::table("products"), &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Unfiltered("update", "products")));
    }

    #[test]
    fn test_error_body_variants() {
        let rest: ApiErrorBody =
            serde_json::from_str(r#"{"code":"PGRST116","message":"no rows"}"#).unwrap();
        assert_eq!(rest.code().as_deref(), Some("PGRST116"));
        assert_eq!(rest.message().as_deref(), Some("no rows"));

        let auth: ApiErrorBody = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        )
        .unwrap();
        assert_eq!(auth.code().as_deref(), Some("invalid_grant"));
        assert_eq!(auth.message().as_deref(), Some("Invalid login credentials"));

        let gotrue: ApiErrorBody =
            serde_json::from_str(r#"{"code":400,"error_code":"weak_password","msg":"too short"}"#)
                .unwrap();
        assert_eq!(gotrue.code().as_deref(), Some("weak_password"));
        assert_eq!(gotrue.message().as_deref(), Some("too short"));
    }

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::RateLimited(60);
        assert_eq!(err.to_string(), "Rate limited, retry after 60 seconds");
    }
}
