//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `LYCEUM_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `LYCEUM_BASE_URL` - Public URL for the storefront
//! - `STRIPE_SECRET_KEY` - Stripe secret API key
//!
//! ## Optional
//! - `LYCEUM_HOST` - Bind address (default: 127.0.0.1)
//! - `LYCEUM_PORT` - Listen port (default: 3000)
//! - `STRIPE_PUBLISHABLE_KEY` - Stripe publishable key (rendered into pages)
//! - `STRIPE_API_BASE` - Stripe API base URL (default: <https://api.stripe.com>)
//! - `STRIPE_CURRENCY` - Checkout currency (default: usd)
//! - `OPENAI_API_KEY` - Enables the chat assistant
//! - `OPENAI_MODEL` - Chat model (default: gpt-4o-mini)
//! - `OPENAI_API_BASE` - `OpenAI` API base URL (default: <https://api.openai.com>)
//! - `THRADS_API_KEY` - Enables sponsored messages
//! - `THRADS_API_BASE` - Thrads API base URL (default: <https://dev.thrads.ai>)
//! - `THRADS_AD_FREQUENCY` - Show an ad every N user messages (default: 3)
//! - `THRADS_USER_REGION` - Region sent with ad requests (default: US)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;

use lyceum_core::chat::DEFAULT_AD_FREQUENCY;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_THRADS_API_BASE: &str = "https://dev.thrads.ai";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
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
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront, without a trailing slash
    pub base_url: String,
    pub stripe: StripeConfig,
    /// `None` when `OPENAI_API_KEY` is unset; chat endpoints report "not configured".
    pub openai: Option<OpenAiConfig>,
    /// `None` when `THRADS_API_KEY` is unset; no sponsored messages are shown.
    pub thrads: Option<ThradsConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

/// Stripe API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: SecretString,
    /// Publishable key (safe to expose in browser)
    pub publishable_key: Option<String>,
    pub api_base: String,
    /// Lower-case ISO currency used for checkout line items
    pub currency: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("publishable_key", &self.publishable_key)
            .field("api_base", &self.api_base)
            .field("currency", &self.currency)
            .finish()
    }
}

/// `OpenAI` chat completions configuration.
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: SecretString,
    pub model: String,
    pub api_base: String,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Thrads sponsored-message configuration.
#[derive(Clone)]
pub struct ThradsConfig {
    pub api_key: SecretString,
    pub api_base: String,
    /// Show an ad every `ad_frequency` user messages
    pub ad_frequency: usize,
    pub user_region: String,
}

impl std::fmt::Debug for ThradsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThradsConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("ad_frequency", &self.ad_frequency)
            .field("user_region", &self.user_region)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("LYCEUM_DATABASE_URL")?;
        let host = get_env_or_default("LYCEUM_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("LYCEUM_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("LYCEUM_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("LYCEUM_PORT".to_string(), e.to_string()))?;
        let base_url = validate_base_url(&get_required_env("LYCEUM_BASE_URL")?)?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            stripe: StripeConfig::from_env()?,
            openai: OpenAiConfig::from_env()?,
            thrads: ThradsConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StripeConfig {
    /// Load the Stripe settings on their own (used by the CLI).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `STRIPE_SECRET_KEY` is missing or looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            publishable_key: get_optional_env("STRIPE_PUBLISHABLE_KEY"),
            api_base: get_env_or_default("STRIPE_API_BASE", DEFAULT_STRIPE_API_BASE),
            currency: get_env_or_default("STRIPE_CURRENCY", "usd").to_lowercase(),
        })
    }
}

impl OpenAiConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(api_key) = get_optional_env("OPENAI_API_KEY") else {
            return Ok(None);
        };
        validate_secret_strength(&api_key, "OPENAI_API_KEY")?;
        Ok(Some(Self {
            api_key: SecretString::from(api_key),
            model: get_env_or_default("OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
            api_base: get_env_or_default("OPENAI_API_BASE", DEFAULT_OPENAI_API_BASE),
        }))
    }
}

impl ThradsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(api_key) = get_optional_env("THRADS_API_KEY") else {
            return Ok(None);
        };
        let ad_frequency = parse_ad_frequency(
            get_optional_env("THRADS_AD_FREQUENCY").as_deref(),
        )?;
        Ok(Some(Self {
            api_key: SecretString::from(api_key),
            api_base: get_env_or_default("THRADS_API_BASE", DEFAULT_THRADS_API_BASE),
            ad_frequency,
            user_region: get_env_or_default("THRADS_USER_REGION", "US"),
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Parse the public base URL and strip any trailing slash.
///
/// Checkout return URLs are built from it, so it must be absolute http(s).
fn validate_base_url(value: &str) -> Result<String, ConfigError> {
    let url = url::Url::parse(value).map_err(|e| {
        ConfigError::InvalidEnvVar("LYCEUM_BASE_URL".to_string(), e.to_string())
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "LYCEUM_BASE_URL".to_string(),
            format!("unsupported scheme {}", url.scheme()),
        ));
    }
    Ok(value.trim_end_matches('/').to_string())
}

/// Get database URL with fallback to generic `DATABASE_URL` (set by most Postgres hosts).
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` naming `primary_key` if neither is set.
pub fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_ad_frequency(raw: Option<&str>) -> Result<usize, ConfigError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_AD_FREQUENCY);
    };
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(ConfigError::InvalidEnvVar(
            "THRADS_AD_FREQUENCY".to_string(),
            "must be at least 1".to_string(),
        )),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::InvalidEnvVar(
            "THRADS_AD_FREQUENCY".to_string(),
            e.to_string(),
        )),
    }
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

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Real API keys are long random strings
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Copy the key from the provider dashboard."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("sk_test_your-key-here", "STRIPE_SECRET_KEY").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("sk_aaaaaaaaaaaaaaaaaaaaaaaaaaaa", "STRIPE_SECRET_KEY");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_stripe_shaped_key() {
        let result = validate_secret_strength(
            "sk_test_51Nq8ZbK2mXy7TgW4pLr9VcJd3HsE6fQa",
            "STRIPE_SECRET_KEY",
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_ad_frequency() {
        assert_eq!(parse_ad_frequency(None).unwrap(), DEFAULT_AD_FREQUENCY);
        assert_eq!(parse_ad_frequency(Some(" 5 ")).unwrap(), 5);
        assert!(parse_ad_frequency(Some("0")).is_err());
        assert!(parse_ad_frequency(Some("often")).is_err());
    }

    #[test]
    fn test_validate_base_url() {
        assert_eq!(
            validate_base_url("https://lyceum.shop/").expect("valid"),
            "https://lyceum.shop"
        );
        assert!(validate_base_url("lyceum.shop").is_err());
        assert!(validate_base_url("ftp://lyceum.shop").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/lyceum"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            stripe: StripeConfig {
                secret_key: SecretString::from("sk_test_key"),
                publishable_key: None,
                api_base: DEFAULT_STRIPE_API_BASE.to_string(),
                currency: "usd".to_string(),
            },
            openai: None,
            thrads: None,
            sentry_dsn: None,
            sentry_environment: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_config_debug_redacts_secrets() {
        let stripe = StripeConfig {
            secret_key: SecretString::from("sk_live_super_secret_value"),
            publishable_key: Some("pk_live_visible".to_string()),
            api_base: DEFAULT_STRIPE_API_BASE.to_string(),
            currency: "usd".to_string(),
        };
        let openai = OpenAiConfig {
            api_key: SecretString::from("sk-proj-hidden-openai-key"),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
        };

        let stripe_debug = format!("{stripe:?}");
        assert!(stripe_debug.contains("pk_live_visible"));
        assert!(stripe_debug.contains("[REDACTED]"));
        assert!(!stripe_debug.contains("super_secret_value"));

        let openai_debug = format!("{openai:?}");
        assert!(openai_debug.contains("gpt-4o-mini"));
        assert!(!openai_debug.contains("hidden-openai-key"));
    }
}
