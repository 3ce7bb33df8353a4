//! Catalog repository: mushrooms and products.
//!
//! Product reads are best-effort: a failed query is logged and treated as an
//! empty result so a page can still render from mushroom data alone.
//! Mushroom reads propagate their errors.

use sqlx::PgPool;
use tracing::instrument;

use lyceum_core::{DatabaseProduct, Mushroom, MushroomId, MushroomProduct, Product, ProductId};

use super::RepositoryError;

const MUSHROOM_COLUMNS: &str = "id, name, scientific_name, region_medicine, expected_effects, \
     story_behind_consumption, impact_on_life, created_at, video_url, photo_url";

const PRODUCT_COLUMNS: &str = "id, name, main_ingredient, format, pills_per_container, \
     daily_dose, use_instructions, key_benefits, short_description, certifications_notes, \
     price, mushroom_id, image_url, created_at";

/// Repository for catalog reads.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Mushrooms
    // =========================================================================

    /// All mushrooms ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn mushrooms(&self) -> Result<Vec<Mushroom>, RepositoryError> {
        let sql = format!("SELECT {MUSHROOM_COLUMNS} FROM mushrooms ORDER BY name");
        let rows = sqlx::query_as::<_, Mushroom>(&sql)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// A single mushroom by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self), fields(mushroom_id = %id))]
    pub async fn mushroom(&self, id: &MushroomId) -> Result<Option<Mushroom>, RepositoryError> {
        let sql = format!("SELECT {MUSHROOM_COLUMNS} FROM mushrooms WHERE id = $1");
        let row = sqlx::query_as::<_, Mushroom>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// The mushroom whose name contains `name` (case-insensitive).
    ///
    /// Returns `None` when nothing matches. When several match, the first by
    /// name wins.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn mushroom_by_name(&self, name: &str) -> Result<Option<Mushroom>, RepositoryError> {
        let sql = format!(
            "SELECT {MUSHROOM_COLUMNS} FROM mushrooms WHERE name ILIKE $1 ORDER BY name LIMIT 1"
        );
        let row = sqlx::query_as::<_, Mushroom>(&sql)
            .bind(contains_pattern(name))
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Mushrooms whose name matches `query` or whose effects/impacts contain it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn search_mushrooms(&self, query: &str) -> Result<Vec<Mushroom>, RepositoryError> {
        let sql = format!(
            "SELECT {MUSHROOM_COLUMNS} FROM mushrooms \
             WHERE name ILIKE $1 OR expected_effects @> ARRAY[$2] OR impact_on_life @> ARRAY[$2] \
             ORDER BY name"
        );
        let rows = sqlx::query_as::<_, Mushroom>(&sql)
            .bind(contains_pattern(query))
            .bind(query.trim())
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Mushrooms listing `effect` among their expected effects.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn mushrooms_by_effect(&self, effect: &str) -> Result<Vec<Mushroom>, RepositoryError> {
        let sql = format!(
            "SELECT {MUSHROOM_COLUMNS} FROM mushrooms WHERE expected_effects @> ARRAY[$1] ORDER BY name"
        );
        let rows = sqlx::query_as::<_, Mushroom>(&sql)
            .bind(effect.trim())
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Every mushroom paired with its first product, for the home carousel.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the mushroom query fails.
    #[instrument(skip(self))]
    pub async fn mushrooms_with_products(&self) -> Result<Vec<MushroomProduct>, RepositoryError> {
        let mushrooms = self.mushrooms().await?;
        let products = self.products().await;

        Ok(mushrooms
            .into_iter()
            .map(|mushroom| {
                let product = products
                    .iter()
                    .find(|p| p.mushroom_id.as_ref() == Some(&mushroom.id))
                    .cloned();
                MushroomProduct::new(mushroom, product)
            })
            .collect())
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// All products, oldest first. Empty on error.
    #[instrument(skip(self))]
    pub async fn products(&self) -> Vec<Product> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at");
        self.fetch_products(&sql, &[]).await
    }

    /// A single product by ID. `None` on error.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product(&self, id: &ProductId) -> Option<Product> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        match sqlx::query_as::<_, DatabaseProduct>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
        {
            Ok(row) => row.map(Product::from),
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch product");
                None
            }
        }
    }

    /// Products linked to a mushroom. Empty on error.
    #[instrument(skip(self), fields(mushroom_id = %mushroom_id))]
    pub async fn products_by_mushroom(&self, mushroom_id: &MushroomId) -> Vec<Product> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE mushroom_id = $1 ORDER BY created_at"
        );
        self.fetch_products(&sql, &[mushroom_id.as_str()]).await
    }

    /// First product linked to a mushroom.
    pub async fn first_product_by_mushroom(&self, mushroom_id: &MushroomId) -> Option<Product> {
        self.products_by_mushroom(mushroom_id).await.into_iter().next()
    }

    /// Products whose name or short description contains `query`. Empty on error.
    #[instrument(skip(self))]
    pub async fn search_products(&self, query: &str) -> Vec<Product> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE name ILIKE $1 OR short_description ILIKE $1 ORDER BY name"
        );
        let pattern = contains_pattern(query);
        self.fetch_products(&sql, &[pattern.as_str()]).await
    }

    /// Products listing `benefit` among their key benefits. Empty on error.
    #[instrument(skip(self))]
    pub async fn products_by_benefit(&self, benefit: &str) -> Vec<Product> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE key_benefits @> ARRAY[$1] ORDER BY name"
        );
        self.fetch_products(&sql, &[benefit.trim()]).await
    }

    /// Raw product rows, for the Stripe catalog sync.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn database_products(&self) -> Result<Vec<DatabaseProduct>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name");
        let rows = sqlx::query_as::<_, DatabaseProduct>(&sql)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    // =========================================================================
    // Display products
    // =========================================================================

    /// Resolve an ID from a product link or add-to-cart form.
    ///
    /// Carousel products synthesized from a mushroom carry the mushroom's
    /// ID, so an unknown product ID is retried as a mushroom ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the mushroom query fails.
    #[instrument(skip(self))]
    pub async fn display_product(&self, id: &str) -> Result<Option<Product>, RepositoryError> {
        if let Some(product) = self.product(&ProductId::new(id)).await {
            return Ok(Some(product));
        }
        let Some(mushroom) = self.mushroom(&MushroomId::new(id)).await? else {
            return Ok(None);
        };
        Ok(Some(self.mushroom_display_product(mushroom).await))
    }

    /// The display product for the mushroom whose name contains `name`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the mushroom query fails.
    #[instrument(skip(self))]
    pub async fn display_product_by_mushroom_name(
        &self,
        name: &str,
    ) -> Result<Option<Product>, RepositoryError> {
        let Some(mushroom) = self.mushroom_by_name(name).await? else {
            return Ok(None);
        };
        Ok(Some(self.mushroom_display_product(mushroom).await))
    }

    async fn mushroom_display_product(&self, mushroom: Mushroom) -> Product {
        let product = self.first_product_by_mushroom(&mushroom.id).await;
        MushroomProduct::new(mushroom, product).display_product()
    }

    async fn fetch_products(&self, sql: &str, binds: &[&str]) -> Vec<Product> {
        let mut query = sqlx::query_as::<_, DatabaseProduct>(sql);
        for value in binds {
            query = query.bind(*value);
        }
        match query.fetch_all(self.pool).await {
            Ok(rows) => rows.into_iter().map(Product::from).collect(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch products");
                Vec::new()
            }
        }
    }
}

/// `%term%` for ILIKE, with the LIKE wildcards in `term` escaped.
fn contains_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.trim().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}
