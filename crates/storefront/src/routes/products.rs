//! Product and mushroom detail pages.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::instrument;

use lyceum_core::wellness::{self, WellnessCategory};
use lyceum_core::{Mushroom, MushroomId, MushroomProduct, Product};

use crate::db::CatalogRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::CspNonce;
use crate::state::AppState;

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub nonce: String,
    pub product: Product,
    pub mushroom: Option<Mushroom>,
    pub categories: Vec<&'static WellnessCategory>,
}

/// Mushroom detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "mushrooms/show.html")]
pub struct MushroomShowTemplate {
    pub nonce: String,
    pub mushroom: Mushroom,
    /// What the add-to-cart button adds.
    pub display: Product,
    pub products: Vec<Product>,
    pub categories: Vec<&'static WellnessCategory>,
}

/// Display product detail page.
///
/// Accepts a product ID or, for carousel products without a row, a mushroom ID.
#[instrument(skip(state, nonce))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CspNonce(nonce): CspNonce,
) -> Result<impl IntoResponse> {
    let repo = CatalogRepository::new(state.pool());
    let product = repo
        .display_product(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    let mushroom = match &product.mushroom_id {
        Some(mushroom_id) => repo.mushroom(mushroom_id).await?,
        None => None,
    };
    let categories = wellness::categories_for_effects(&product.benefits);

    Ok(ProductShowTemplate {
        nonce,
        product,
        mushroom,
        categories,
    })
}

/// Display mushroom detail page.
#[instrument(skip(state, nonce))]
pub async fn mushroom(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CspNonce(nonce): CspNonce,
) -> Result<impl IntoResponse> {
    let repo = CatalogRepository::new(state.pool());
    let mushroom_id = MushroomId::new(id);
    let mushroom = repo
        .mushroom(&mushroom_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("mushroom {mushroom_id}")))?;

    let products = repo.products_by_mushroom(&mushroom_id).await;
    let display =
        MushroomProduct::new(mushroom.clone(), products.first().cloned()).display_product();
    let categories = wellness::categories_for_effects(&mushroom.expected_effects);

    Ok(MushroomShowTemplate {
        nonce,
        mushroom,
        display,
        products,
        categories,
    })
}
