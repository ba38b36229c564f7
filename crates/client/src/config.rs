//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SWIFTDROP_BACKEND_URL` - Hosted backend project URL (e.g., `https://abc.supabase.co`)
//! - `SWIFTDROP_BACKEND_ANON_KEY` - Public anon key for the hosted backend
//!
//! ## Optional
//! - `PAYSTACK_PUBLIC_KEY` - Paystack public key (`pk_test_...` / `pk_live_...`)
//! - `SQUAD_PUBLIC_KEY` - Squad public key (`pk_...` / `sandbox_pk_...`)
//! - `SWIFTDROP_STORAGE_PATH` - Local storage file (default: swiftdrop-storage.json)
//! - `SWIFTDROP_DELIVERY_FEE` - Delivery fee per vendor, in naira (default: 1000)
//! - `SWIFTDROP_RETRY_DELAY_MS` - Base delay for read retries (default: 1000)
//! - `SWIFTDROP_STUDENT_MONTHLY_PRICE` - Monthly student plan, in naira (default: 2000)
//! - `SWIFTDROP_STUDENT_SEMESTER_PRICE` - Semester student plan, in naira (default: 7000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use swiftdrop_core::Naira;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure key in {0}: {1}")]
    InsecureKey(String, String),
}

/// SwiftDrop client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Hosted backend connection settings
    pub backend: BackendConfig,
    /// Payment gateway public keys
    pub payments: PaymentsConfig,
    /// File backing the local key-value store
    pub storage_path: PathBuf,
    /// Delivery fee charged once per vendor in an order
    pub delivery_fee: Naira,
    /// Base delay for retried reads and realtime reconnects (multiplied by
    /// the attempt number)
    pub retry_delay: Duration,
    /// Student subscription prices
    pub student_plans: StudentPlanPrices,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Hosted backend configuration.
///
/// Implements `Debug` manually to redact the anon key.
#[derive(Clone)]
pub struct BackendConfig {
    /// Project URL; REST, auth and realtime live under it
    pub url: Url,
    /// Public anon key sent as `apikey` on every request
    pub anon_key: SecretString,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"[REDACTED]")
            .finish()
    }
}

/// Payment gateway configuration. Only public keys ever reach the client.
#[derive(Debug, Clone, Default)]
pub struct PaymentsConfig {
    /// Paystack inline checkout public key
    pub paystack_public_key: Option<String>,
    /// Squad checkout public key
    pub squad_public_key: Option<String>,
}

/// Prices of the student delivery plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudentPlanPrices {
    pub monthly: Naira,
    pub semester: Naira,
}

impl Default for StudentPlanPrices {
    fn default() -> Self {
        Self {
            monthly: Naira::from_whole(2_000),
            semester: Naira::from_whole(7_000),
        }
    }
}

impl ClientConfig {
    /// Configuration with defaults for everything but the backend.
    #[must_use]
    pub fn new(backend: BackendConfig) -> Self {
        Self {
            backend,
            payments: PaymentsConfig::default(),
            storage_path: PathBuf::from("swiftdrop-storage.json"),
            delivery_fee: Naira::from_whole(1_000),
            retry_delay: Duration::from_secs(1),
            student_plans: StudentPlanPrices::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid,
    /// or if a key fails validation (placeholder detection, entropy check,
    /// secret key where a public key belongs).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let backend = BackendConfig::from_env()?;
        let payments = PaymentsConfig::from_env()?;
        let storage_path = PathBuf::from(get_env_or_default(
            "SWIFTDROP_STORAGE_PATH",
            "swiftdrop-storage.json",
        ));
        let delivery_fee = get_naira_or_default("SWIFTDROP_DELIVERY_FEE", 1_000)?;
        let retry_delay = get_env_or_default("SWIFTDROP_RETRY_DELAY_MS", "1000")
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SWIFTDROP_RETRY_DELAY_MS".to_string(), e.to_string())
            })?;
        let student_plans = StudentPlanPrices {
            monthly: get_naira_or_default("SWIFTDROP_STUDENT_MONTHLY_PRICE", 2_000)?,
            semester: get_naira_or_default("SWIFTDROP_STUDENT_SEMESTER_PRICE", 7_000)?,
        };

        Ok(Self {
            backend,
            payments,
            storage_path,
            delivery_fee,
            retry_delay,
            student_plans,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

impl BackendConfig {
    /// Build a backend configuration directly (tests, embedding).
    #[must_use]
    pub fn new(url: Url, anon_key: impl Into<String>) -> Self {
        Self {
            url,
            anon_key: SecretString::from(anon_key.into()),
        }
    }

    fn from_env() -> Result<Self, ConfigError> {
        let raw_url = get_required_env("SWIFTDROP_BACKEND_URL")?;
        let url = parse_backend_url(&raw_url)
            .map_err(|e| ConfigError::InvalidEnvVar("SWIFTDROP_BACKEND_URL".to_string(), e))?;
        let anon_key = get_validated_key("SWIFTDROP_BACKEND_ANON_KEY")?;
        Ok(Self { url, anon_key })
    }
}

impl PaymentsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let paystack_public_key = get_optional_env("PAYSTACK_PUBLIC_KEY")
            .map(|key| validate_public_key(&key, "PAYSTACK_PUBLIC_KEY", &["pk_"]).map(|()| key))
            .transpose()?;
        let squad_public_key = get_optional_env("SQUAD_PUBLIC_KEY")
            .map(|key| {
                validate_public_key(&key, "SQUAD_PUBLIC_KEY", &["pk_", "sandbox_pk_"]).map(|()| key)
            })
            .transpose()?;
        Ok(Self {
            paystack_public_key,
            squad_public_key,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a naira amount with a whole-naira default.
fn get_naira_or_default(key: &str, default: i64) -> Result<Naira, ConfigError> {
    match get_optional_env(key) {
        None => Ok(Naira::from_whole(default)),
        Some(raw) => {
            let amount = raw
                .trim()
                .parse::<Decimal>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
            if amount.is_sign_negative() {
                return Err(ConfigError::InvalidEnvVar(
                    key.to_string(),
                    "must not be negative".to_string(),
                ));
            }
            Ok(Naira::new(amount))
        }
    }
}

/// Parse the backend URL and require http(s). A trailing slash is normalized away
/// so path joins stay predictable.
fn parse_backend_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim_end_matches('/')).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme '{other}'")),
    }
    if url.host_str().is_none() {
        return Err("URL must have a host".to_string());
    }
    Ok(url)
}

/// Reject secret keys and anything without a public-key prefix.
fn validate_public_key(key: &str, var_name: &str, prefixes: &[&str]) -> Result<(), ConfigError> {
    if key.starts_with("sk_") || key.contains("_sk_") {
        return Err(ConfigError::InsecureKey(
            var_name.to_string(),
            "secret keys must never be shipped to the client; use the public key".to_string(),
        ));
    }
    if !prefixes.iter().any(|p| key.starts_with(p)) {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("expected a key starting with one of {prefixes:?}"),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a key is not a placeholder and has sufficient entropy.
fn validate_key_strength(key: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = key.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureKey(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Real anon keys are JWTs and have high entropy
    let entropy = shannon_entropy(key);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureKey(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Copy the key from the project settings."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a key from environment.
fn get_validated_key(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_key_strength(&value, key)?;
    Ok(SecretString::from(value))
}

impl BackendConfig {
    /// Expose the anon key for request headers.
    pub(crate) fn anon_key(&self) -> &str {
        self.anon_key.expose_secret()
    }
}
