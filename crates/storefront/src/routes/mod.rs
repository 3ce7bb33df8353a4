//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page (mushroom carousel + chat panel)
//! GET  /health                 - Health check
//! GET  /health/ready           - Readiness check (database)
//!
//! # Catalog
//! GET  /products/:id           - Product detail (product or mushroom ID)
//! GET  /mushrooms/:id          - Mushroom detail
//! GET  /search                 - Search page (?q= or ?effect=)
//! GET  /search/suggest         - Search suggestions fragment (HTMX)
//!
//! # Cart (HTMX fragments)
//! GET  /cart                   - Cart page
//! POST /cart/add               - Add to cart (returns count badge, triggers cart-updated)
//! POST /cart/update            - Update quantity (returns cart_items fragment)
//! POST /cart/remove            - Remove item (returns cart_items fragment)
//! POST /cart/bundle            - Add an archetype's missing mushrooms
//! GET  /cart/count             - Cart count badge (fragment)
//!
//! # Checkout
//! GET  /checkout               - Wellness profile, bundles and order summary
//! POST /checkout               - Create Stripe Checkout session, redirect
//! GET  /success                - Payment success page
//!
//! # Chat (HTMX fragments)
//! GET  /chat                   - Transcript
//! POST /chat/messages          - Send message (returns new messages)
//! POST /chat/clear             - Reset transcript
//! POST /chat/ask               - Explain an effect ("Ask AI")
//! POST /chat/ads/:id/click     - Record sponsored message click
//! POST /chat/ads/:id/dismiss   - Dismiss sponsored message
//!
//! # JSON API (rate limited)
//! POST /api/chat                     - Chat completion
//! GET  /api/chat/stream              - Streamed chat reply (SSE)
//! POST /api/create-checkout-session  - Stripe Checkout for a client cart
//! GET  /api/stripe-products          - Stripe catalog
//! POST /api/thrads-ad                - Sponsored message lookup
//! ```

pub mod api;
pub mod cart;
pub mod chat;
pub mod checkout;
pub mod health;
pub mod home;
pub mod products;
pub mod search;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::api_rate_limiter;
use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/bundle", post(cart::add_bundle))
        .route("/count", get(cart::count))
}

/// Create the chat panel routes router.
pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(chat::show))
        .route("/messages", post(chat::send))
        .route("/clear", post(chat::clear))
        .route("/ask", post(chat::ask))
        .route("/ads/{impression_id}/click", post(chat::ad_click))
        .route("/ads/{impression_id}/dismiss", post(chat::ad_dismiss))
}

/// Create the JSON API router, rate limited per client IP.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/chat", post(api::chat))
        .route("/chat/stream", get(api::chat_stream))
        .route(
            "/create-checkout-session",
            post(api::create_checkout_session),
        )
        .route("/stripe-products", get(api::stripe_products))
        .route("/thrads-ad", post(api::thrads_ad))
        .layer(api_rate_limiter())
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Home page
        .route("/", get(home::home))
        // Probes
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        // Catalog
        .route("/products/{id}", get(products::show))
        .route("/mushrooms/{id}", get(products::mushroom))
        .nest("/search", search::router())
        // Cart
        .nest("/cart", cart_routes())
        // Checkout
        .route("/checkout", get(checkout::show).post(checkout::create))
        .route("/success", get(checkout::success))
        // Chat panel
        .nest("/chat", chat_routes())
        // JSON API
        .nest("/api", api_routes())
}
