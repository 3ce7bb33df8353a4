//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tower_sessions::Session;
use tracing::instrument;

use lyceum_core::chat::ChatMessage;
use lyceum_core::wellness::{self, WellnessCategory};
use lyceum_core::{Mushroom, MushroomProduct, Product};

use crate::db::CatalogRepository;
use crate::filters;
use crate::middleware::CspNonce;
use crate::models::load_transcript;
use crate::state::AppState;

/// A slide in the mushroom carousel.
#[derive(Clone)]
pub struct CarouselSlide {
    pub mushroom: Mushroom,
    pub product: Product,
    pub categories: Vec<&'static WellnessCategory>,
}

impl From<MushroomProduct> for CarouselSlide {
    fn from(pair: MushroomProduct) -> Self {
        let product = pair.display_product();
        let categories = wellness::categories_for_effects(&pair.mushroom.expected_effects);
        Self {
            mushroom: pair.mushroom,
            product,
            categories,
        }
    }
}

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub nonce: String,
    pub slides: Vec<CarouselSlide>,
    /// Set when the catalog could not be loaded.
    pub load_error: bool,
    pub messages: Vec<ChatMessage>,
    pub chat_enabled: bool,
}

/// Display the home page: mushroom carousel and chat panel.
#[instrument(skip(state, session, nonce))]
pub async fn home(
    State(state): State<AppState>,
    session: Session,
    CspNonce(nonce): CspNonce,
) -> impl IntoResponse {
    let (slides, load_error) = match CatalogRepository::new(state.pool())
        .mushrooms_with_products()
        .await
    {
        Ok(pairs) => (pairs.into_iter().map(CarouselSlide::from).collect(), false),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load mushroom carousel");
            (Vec::new(), true)
        }
    };

    let transcript = load_transcript(&session).await;

    HomeTemplate {
        nonce,
        slides,
        load_error,
        messages: transcript.messages().to_vec(),
        chat_enabled: state.openai().is_some(),
    }
}
