//! Database migration commands.
//!
//! # Environment Variables
//!
//! - `LYCEUM_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! Storefront migrations live in `crates/storefront/migrations/` and are
//! embedded at compile time:
//! ```text
//! migrations/
//! ├── 20250701000001_create_mushrooms.sql
//! ├── 20250701000002_create_products.sql
//! ├── 20250701000003_create_ad_impressions.sql
//! └── 20250701000004_seed_catalog.sql
//! ```

use lyceum_storefront::config::{ConfigError, get_database_url};
use lyceum_storefront::db;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails or
/// a migration fails to apply.
pub async fn storefront() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = get_database_url("LYCEUM_DATABASE_URL")?;

    tracing::info!("Connecting to storefront database...");
    let pool = db::create_pool(&database_url).await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
