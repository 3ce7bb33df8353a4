//! Checkout route handlers.
//!
//! The checkout page shows the visitor's wellness profile, any unlocked
//! archetypes and the order summary priced from the Stripe catalog. Posting
//! the page creates a Stripe Checkout session and redirects to it.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use lyceum_core::archetype::{self, Archetype, BundleSuggestion};
use lyceum_core::stripe_match::{self, DisplayLine, StripeProduct};
use lyceum_core::wellness::{self, CategoryScore, EffectSource};
use lyceum_core::{Cart, Price};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::CspNonce;
use crate::models::{load_cart, save_cart};
use crate::services::stripe::CheckoutUrls;
use crate::state::AppState;

/// A wellness category bar with the effects behind it.
#[derive(Clone)]
pub struct CategoryView {
    pub score: CategoryScore,
    pub effects: Vec<EffectSource>,
}

/// Everything the checkout page renders for a cart.
#[derive(Clone)]
pub struct CheckoutSummary {
    pub lines: Vec<DisplayLine>,
    pub categories: Vec<CategoryView>,
    pub completed: Vec<&'static Archetype>,
    pub suggestion: Option<BundleSuggestion>,
    pub subtotal: Price,
    pub discount: Price,
    pub total: Price,
}

impl CheckoutSummary {
    /// Build the summary, matching each line against the Stripe catalog.
    #[must_use]
    pub fn new(cart: &Cart, catalog: &[StripeProduct]) -> Self {
        let lines = cart
            .items()
            .iter()
            .map(|item| {
                let matched = stripe_match::match_product(&item.product, catalog);
                stripe_match::display_line(item, matched.as_ref())
            })
            .collect();

        let categories = wellness::category_scores(cart)
            .into_iter()
            .map(|score| CategoryView {
                effects: wellness::effects_in_category(cart, score.category.name),
                score,
            })
            .collect();

        let completed = archetype::completed(cart);
        let subtotal = cart.total();
        let discount = archetype::discount(subtotal, &completed);

        Self {
            lines,
            categories,
            suggestion: archetype::best_suggestion(cart),
            completed,
            subtotal,
            discount,
            total: subtotal - discount,
        }
    }

    #[must_use]
    pub fn has_discount(&self) -> bool {
        !self.discount.is_zero()
    }
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub nonce: String,
    pub summary: Option<CheckoutSummary>,
}

/// Payment success page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/success.html")]
pub struct SuccessTemplate {
    pub nonce: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub session_id: Option<String>,
}

/// Display the checkout page.
///
/// Stripe catalog failures are logged and the cart's own names and prices
/// are shown instead.
#[instrument(skip(state, session, nonce))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    CspNonce(nonce): CspNonce,
) -> impl IntoResponse {
    let cart = load_cart(&session).await;
    if cart.is_empty() {
        return CheckoutTemplate {
            nonce,
            summary: None,
        };
    }

    let catalog = match state.stripe().list_products().await {
        Ok(products) => products,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load Stripe catalog for checkout");
            Default::default()
        }
    };

    CheckoutTemplate {
        nonce,
        summary: Some(CheckoutSummary::new(&cart, &catalog)),
    }
}

/// Create a Stripe Checkout session and redirect to it.
///
/// The cart is cleared once Stripe accepts the session.
#[instrument(skip(state, session))]
pub async fn create(State(state): State<AppState>, session: Session) -> Result<Redirect> {
    let mut cart = load_cart(&session).await;

    let checkout = state
        .stripe()
        .create_checkout_session(
            cart.items(),
            &CheckoutUrls::default(),
            &state.config().base_url,
        )
        .await?;

    let url = checkout
        .url
        .ok_or_else(|| AppError::Internal(format!("checkout session {} has no URL", checkout.id)))?;

    cart.clear();
    save_cart(&session, &cart).await?;

    add_breadcrumb("checkout", "Redirected to Stripe", Some(&[("session_id", checkout.id.as_str())]));

    Ok(Redirect::to(&url))
}

/// Display the payment success page.
#[instrument(skip(nonce))]
pub async fn success(
    Query(query): Query<SuccessQuery>,
    CspNonce(nonce): CspNonce,
) -> impl IntoResponse {
    SuccessTemplate {
        nonce,
        session_id: query.session_id.filter(|id| !id.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use lyceum_core::stripe_match::{MatchHeuristic, StripeProductMetadata};
    use lyceum_core::Product;

    use super::*;

    fn cart_of(names: &[&str]) -> Cart {
        let mut cart = Cart::new();
        for name in names {
            cart.add(Product::basic(*name, *name, Price::from_minor_units(2999)));
        }
        cart
    }

    #[test]
    fn test_summary_applies_bundle_discount() {
        let cart = cart_of(&["Lion's Mane", "Cordyceps", "Reishi"]);
        let summary = CheckoutSummary::new(&cart, &[]);

        assert_eq!(summary.completed.len(), 1);
        assert_eq!(summary.subtotal, Price::from_minor_units(8997));
        assert_eq!(summary.discount, Price::from_minor_units(1799));
        assert_eq!(summary.total, Price::from_minor_units(7198));
        assert!(summary.has_discount());
        assert!(summary.suggestion.is_some());
    }

    #[test]
    fn test_summary_without_bundle_has_no_discount() {
        let summary = CheckoutSummary::new(&cart_of(&["Reishi"]), &[]);
        assert!(!summary.has_discount());
        assert_eq!(summary.total, summary.subtotal);
        assert!(!summary.categories.is_empty());
    }

    #[test]
    fn test_summary_prefers_stripe_name_and_price() {
        let catalog = vec![StripeProduct {
            id: "prod_1".to_string(),
            name: "Reishi Capsules".to_string(),
            description: String::new(),
            price: Price::from_minor_units(3499),
            price_id: "price_1".to_string(),
            image: String::new(),
            metadata: StripeProductMetadata {
                mushroom_id: "reishi".to_string(),
                ..Default::default()
            },
        }];
        let summary = CheckoutSummary::new(&cart_of(&["Reishi"]), &catalog);

        let line = &summary.lines[0];
        assert_eq!(line.name, "Reishi Capsules");
        assert_eq!(line.price, Price::from_minor_units(3499));
        assert_eq!(line.matched, Some(MatchHeuristic::MushroomName));
        // totals stay on cart prices, which is what Stripe is charged
        assert_eq!(summary.subtotal, Price::from_minor_units(2999));
    }
}
