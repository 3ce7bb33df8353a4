//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::{
    AdService, OpenAiClient, OpenAiError, StripeClient, StripeError, ThradsClient, ThradsError,
};

/// Error building an API client from configuration.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("stripe client: {0}")]
    Stripe(#[from] StripeError),
    #[error("openai client: {0}")]
    OpenAi(#[from] OpenAiError),
    #[error("thrads client: {0}")]
    Thrads(#[from] ThradsError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and API clients.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    stripe: StripeClient,
    openai: Option<OpenAiClient>,
    ads: AdService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The chat client exists only when `OpenAI` is configured, and ads are
    /// enabled only when Thrads is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if an API key cannot be used as a header value.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let stripe = StripeClient::new(&config.stripe)?;
        let openai = config.openai.as_ref().map(OpenAiClient::new).transpose()?;
        let thrads = config.thrads.as_ref().map(ThradsClient::new).transpose()?;
        let ads = AdService::new(thrads, pool.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                stripe,
                openai,
                ads,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn stripe(&self) -> &StripeClient {
        &self.inner.stripe
    }

    /// `None` when `OPENAI_API_KEY` is not set.
    #[must_use]
    pub fn openai(&self) -> Option<&OpenAiClient> {
        self.inner.openai.as_ref()
    }

    #[must_use]
    pub fn ads(&self) -> &AdService {
        &self.inner.ads
    }
}
