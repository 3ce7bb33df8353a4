//! Stripe catalog commands.
//!
//! `sync` creates a Stripe product, a price and the default-price link for
//! every `products` row whose ID no Stripe product carries in
//! `metadata.product_id`. Existing Stripe products are never modified.
//!
//! # Environment Variables
//!
//! - `LYCEUM_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `STRIPE_SECRET_KEY` - Stripe secret key
//! - `STRIPE_API_BASE`, `STRIPE_CURRENCY` - optional overrides

use std::collections::HashSet;

use tracing::{error, info};

use lyceum_core::DatabaseProduct;
use lyceum_core::Price;
use lyceum_core::stripe_match::{StripeProduct, StripeProductMetadata};
use lyceum_storefront::config::{StripeConfig, get_database_url};
use lyceum_storefront::db::{self, CatalogRepository};
use lyceum_storefront::services::StripeClient;
use lyceum_storefront::services::stripe::NewProduct;

fn stripe_client() -> Result<StripeClient, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = StripeConfig::from_env()?;
    Ok(StripeClient::new(&config)?)
}

/// Catalog rows that no Stripe product references yet.
pub fn missing_products<'a>(
    rows: &'a [DatabaseProduct],
    stripe: &[StripeProduct],
) -> Vec<&'a DatabaseProduct> {
    let synced: HashSet<&str> = stripe
        .iter()
        .map(|p| p.metadata.product_id.as_str())
        .filter(|id| !id.is_empty())
        .collect();
    rows.iter()
        .filter(|row| !synced.contains(row.id.as_str()))
        .collect()
}

/// Stripe product fields for a catalog row.
///
/// The category is the row's first key benefit.
pub fn new_product(row: &DatabaseProduct) -> NewProduct {
    NewProduct {
        name: row.name.clone(),
        description: row.short_description.clone(),
        images: row.image_url.iter().cloned().collect(),
        metadata: StripeProductMetadata {
            product_id: row.id.to_string(),
            mushroom_id: row
                .mushroom_id
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            category: row.key_benefits.first().cloned().unwrap_or_default(),
            benefits: row.key_benefits.join(", "),
        },
    }
}

/// Create Stripe products for catalog rows that have none.
///
/// A failure on one row is logged and the sync moves on to the next.
///
/// # Errors
///
/// Returns an error if configuration is missing or the database or Stripe
/// catalog cannot be read.
pub async fn sync(dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let stripe = stripe_client()?;
    let database_url = get_database_url("LYCEUM_DATABASE_URL")?;
    let pool = db::create_pool(&database_url).await?;

    let rows = CatalogRepository::new(&pool).database_products().await?;
    let existing = stripe.list_products().await?;
    let missing = missing_products(&rows, &existing);

    info!(
        catalog = rows.len(),
        stripe = existing.len(),
        missing = missing.len(),
        "Compared catalog with Stripe"
    );

    let mut created = 0usize;
    for row in missing {
        let price = Price::usd(row.price);
        let Some(unit_amount) = price.to_minor_units() else {
            error!(product_id = %row.id, %price, "Price out of range, skipping");
            continue;
        };

        if dry_run {
            info!(product_id = %row.id, name = %row.name, %price, "Would create Stripe product");
            continue;
        }

        match create_with_price(&stripe, row, unit_amount).await {
            Ok(stripe_id) => {
                created += 1;
                info!(product_id = %row.id, %stripe_id, %price, "Created Stripe product");
            }
            Err(e) => error!(product_id = %row.id, error = %e, "Failed to create Stripe product"),
        }
    }

    info!(created, dry_run, "Stripe sync complete");
    Ok(())
}

async fn create_with_price(
    stripe: &StripeClient,
    row: &DatabaseProduct,
    unit_amount: i64,
) -> Result<String, lyceum_storefront::services::StripeError> {
    let product = stripe.create_product(&new_product(row)).await?;
    let price_id = stripe.create_price(&product.id, unit_amount).await?;
    stripe.set_default_price(&product.id, &price_id).await?;
    Ok(product.id)
}

/// Log the active Stripe catalog.
///
/// # Errors
///
/// Returns an error if configuration is missing or Stripe cannot be reached.
pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let stripe = stripe_client()?;
    let products = stripe.list_products().await?;

    info!("Stripe products ({})", products.len());
    for product in products.iter() {
        info!(
            "  {} | {} | {} | product_id={} mushroom_id={}",
            product.id,
            product.name,
            product.price,
            product.metadata.product_id,
            product.metadata.mushroom_id
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use lyceum_core::{MushroomId, ProductId};
    use rust_decimal::Decimal;

    use super::*;

    fn row(id: &str) -> DatabaseProduct {
        DatabaseProduct {
            id: ProductId::new(id),
            name: "Reishi Immune Calm".to_string(),
            main_ingredient: "Reishi".to_string(),
            format: "Capsules".to_string(),
            pills_per_container: 60,
            daily_dose: "2 capsules".to_string(),
            use_instructions: String::new(),
            key_benefits: vec!["immune support".to_string(), "calm".to_string()],
            short_description: "Reishi for calm".to_string(),
            certifications_notes: String::new(),
            price: Decimal::new(3499, 2),
            mushroom_id: Some(MushroomId::new("reishi")),
            image_url: None,
            created_at: Utc::now(),
        }
    }

    fn stripe_product(product_id: &str) -> StripeProduct {
        StripeProduct {
            id: format!("prod_{product_id}"),
            name: String::new(),
            description: String::new(),
            price: Price::zero(),
            price_id: String::new(),
            image: String::new(),
            metadata: StripeProductMetadata {
                product_id: product_id.to_string(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_missing_products_skips_synced_rows() {
        let rows = vec![row("reishi-immune-calm"), row("chaga-antioxidant")];
        let stripe = vec![stripe_product("reishi-immune-calm"), stripe_product("")];

        let missing = missing_products(&rows, &stripe);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id.as_str(), "chaga-antioxidant");
    }

    #[test]
    fn test_new_product_carries_metadata() {
        let product = new_product(&row("reishi-immune-calm"));
        assert_eq!(product.metadata.product_id, "reishi-immune-calm");
        assert_eq!(product.metadata.mushroom_id, "reishi");
        assert_eq!(product.metadata.category, "immune support");
        assert_eq!(product.metadata.benefits, "immune support, calm");
        assert!(product.images.is_empty());
    }
}
