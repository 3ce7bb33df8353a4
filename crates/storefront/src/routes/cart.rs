//! Cart route handlers.
//!
//! Cart operations use HTMX for dynamic updates without full page reloads.
//! The cart itself lives in the visitor's session.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{AppendHeaders, IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use lyceum_core::archetype::{self, Archetype};
use lyceum_core::{Cart, Product, ProductId};

use crate::db::CatalogRepository;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::CspNonce;
use crate::models::{load_cart, save_cart};
use crate::state::AppState;

/// HTMX event fired whenever the cart changes.
pub const CART_UPDATED_TRIGGER: (&str, &str) = ("HX-Trigger", "cart-updated");

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: String,
    pub quantity: Option<u32>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: String,
    /// Zero or negative removes the line.
    pub quantity: i64,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: String,
}

/// Add-bundle form data.
#[derive(Debug, Deserialize)]
pub struct AddBundleForm {
    pub archetype_id: String,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub nonce: String,
    pub cart: Cart,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: Cart,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Display cart page.
#[instrument(skip(session, nonce))]
pub async fn show(session: Session, CspNonce(nonce): CspNonce) -> impl IntoResponse {
    CartShowTemplate {
        nonce,
        cart: load_cart(&session).await,
    }
}

/// Add item to cart (HTMX).
///
/// Returns the new count badge with an HTMX trigger so other elements refresh.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let product = CatalogRepository::new(state.pool())
        .display_product(&form.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", form.product_id)))?;

    let mut cart = load_cart(&session).await;
    cart.add_quantity(product, form.quantity.unwrap_or(1).max(1));
    save_cart(&session, &cart).await?;

    add_breadcrumb("cart", "Added to cart", Some(&[("product_id", form.product_id.as_str())]));

    Ok((
        AppendHeaders([CART_UPDATED_TRIGGER]),
        CartCountTemplate {
            count: cart.item_count(),
        },
    )
        .into_response())
}

/// Update cart item quantity (HTMX).
#[instrument(skip(session))]
pub async fn update(session: Session, Form(form): Form<UpdateCartForm>) -> Result<Response> {
    let mut cart = load_cart(&session).await;
    cart.update_quantity(&ProductId::new(form.product_id), form.quantity);
    save_cart(&session, &cart).await?;

    Ok((AppendHeaders([CART_UPDATED_TRIGGER]), CartItemsTemplate { cart }).into_response())
}

/// Remove item from cart (HTMX).
#[instrument(skip(session))]
pub async fn remove(session: Session, Form(form): Form<RemoveFromCartForm>) -> Result<Response> {
    let mut cart = load_cart(&session).await;
    cart.remove(&ProductId::new(form.product_id));
    save_cart(&session, &cart).await?;

    Ok((AppendHeaders([CART_UPDATED_TRIGGER]), CartItemsTemplate { cart }).into_response())
}

/// Get cart count badge (HTMX).
#[instrument(skip(session))]
pub async fn count(session: Session) -> impl IntoResponse {
    CartCountTemplate {
        count: load_cart(&session).await.item_count(),
    }
}

/// Add the mushrooms an archetype still needs (HTMX).
///
/// Each missing mushroom resolves to its catalog product, falling back to
/// the fixed bundle price list when the catalog has none. The checkout page
/// reloads so totals and discounts are recomputed.
#[instrument(skip(state, session))]
pub async fn add_bundle(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AddBundleForm>,
) -> Result<Response> {
    let archetype = archetype::find(&form.archetype_id)
        .ok_or_else(|| AppError::BadRequest(format!("unknown archetype {}", form.archetype_id)))?;

    let mut cart = load_cart(&session).await;
    let repo = CatalogRepository::new(state.pool());

    for name in missing_mushrooms(&cart, archetype) {
        match bundle_product(&repo, name).await? {
            Some(product) => cart.add(product),
            None => tracing::warn!(mushroom = name, "No product available for bundle item"),
        }
    }
    save_cart(&session, &cart).await?;

    add_breadcrumb("cart", "Added bundle", Some(&[("archetype", archetype.id)]));

    Ok(AppendHeaders([CART_UPDATED_TRIGGER, ("HX-Refresh", "true")]).into_response())
}

/// Required mushrooms of `archetype` not yet in the cart, by substring match.
fn missing_mushrooms(cart: &Cart, archetype: &Archetype) -> Vec<&'static str> {
    let names: Vec<String> = cart.product_names().map(str::to_lowercase).collect();
    archetype
        .required
        .iter()
        .copied()
        .filter(|required| {
            let required = required.to_lowercase();
            !names.iter().any(|name| name.contains(&required))
        })
        .collect()
}

async fn bundle_product(repo: &CatalogRepository<'_>, name: &str) -> Result<Option<Product>> {
    if let Some(product) = repo.display_product_by_mushroom_name(name).await? {
        return Ok(Some(product));
    }
    Ok(archetype::bundle_item(name)
        .map(|item| Product::basic(item.id, item.name, item.price())))
}
