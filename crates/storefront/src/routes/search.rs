//! Search route handlers.
//!
//! `q` matches mushroom and product names and descriptions; `effect`
//! lists mushrooms and products tagged with one wellness effect.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use tracing::instrument;

use lyceum_core::{Mushroom, Product};

use crate::db::CatalogRepository;
use crate::error::Result;
use crate::filters;
use crate::middleware::CspNonce;
use crate::state::AppState;

/// Number of hits per group in the suggestions dropdown.
const SUGGESTION_LIMIT: usize = 4;

/// Search query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub effect: String,
}

/// Mushroom and product hits.
#[derive(Clone, Default)]
pub struct SearchResults {
    pub mushrooms: Vec<Mushroom>,
    pub products: Vec<Product>,
}

impl SearchResults {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mushrooms.is_empty() && self.products.is_empty()
    }

    fn truncate(mut self, limit: usize) -> Self {
        self.mushrooms.truncate(limit);
        self.products.truncate(limit);
        self
    }
}

/// Search suggestions template (HTMX fragment).
#[derive(Template, WebTemplate)]
#[template(path = "partials/search_results.html")]
pub struct SearchResultsTemplate {
    pub results: SearchResults,
}

/// Full search page template.
#[derive(Template, WebTemplate)]
#[template(path = "search.html")]
pub struct SearchPageTemplate {
    pub nonce: String,
    pub query: String,
    pub effect: String,
    pub results: SearchResults,
}

async fn run_search(state: &AppState, query: &SearchQuery) -> Result<SearchResults> {
    let repo = CatalogRepository::new(state.pool());

    let effect = query.effect.trim();
    if !effect.is_empty() {
        return Ok(SearchResults {
            mushrooms: repo.mushrooms_by_effect(effect).await?,
            products: repo.products_by_benefit(effect).await,
        });
    }

    let q = query.q.trim();
    if q.is_empty() {
        return Ok(SearchResults::default());
    }
    Ok(SearchResults {
        mushrooms: repo.search_mushrooms(q).await?,
        products: repo.search_products(q).await,
    })
}

/// Search suggestions endpoint (HTMX).
#[instrument(skip(state))]
pub async fn suggest(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse> {
    let results = run_search(&state, &query).await?.truncate(SUGGESTION_LIMIT);
    Ok(SearchResultsTemplate { results })
}

/// Full search page.
#[instrument(skip(state, nonce))]
pub async fn search_page(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    CspNonce(nonce): CspNonce,
) -> Result<impl IntoResponse> {
    let results = run_search(&state, &query).await?;
    Ok(SearchPageTemplate {
        nonce,
        query: query.q,
        effect: query.effect,
        results,
    })
}

/// Create the search routes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(search_page))
        .route("/suggest", get(suggest))
}
