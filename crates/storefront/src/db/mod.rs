//! Database operations for the storefront `PostgreSQL` (Supabase).
//!
//! ## Tables
//!
//! - `mushrooms` - Species, effects and the story behind each one
//! - `products` - Sellable supplements, optionally linked to a mushroom
//! - `ad_impressions` - Sponsored message events (shown, clicked, dismissed)
//!
//! Carts and chat transcripts are session-scoped and never stored here.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p lyceum-cli -- migrate
//! ```

pub mod ad_impressions;
pub mod catalog;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use ad_impressions::{AdImpression, AdImpressionRepository};
pub use catalog::CatalogRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
