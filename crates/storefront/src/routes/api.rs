//! JSON API used by scripted clients and the streaming chat panel.
//!
//! Errors come back as `{"error": "..."}` with the status chosen by
//! [`ApiError`].

use std::convert::Infallible;
use std::time::Duration;

use async_stream::stream;
use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    response::sse::{Event, KeepAlive, KeepAliveStream, Sse},
};
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::instrument;

use lyceum_core::chat::{ChatMessage, KeywordAdvisor, SponsoredAd, Transcript, chunk_words};
use lyceum_core::stripe_match::StripeProduct;
use lyceum_core::{Cart, CartItem, Sender};

use crate::error::ApiError;
use crate::models::{Visitor, load_cart, load_transcript, save_transcript};
use crate::services::ads::{AdOutcome, AdRequest, ThradsError};
use crate::services::chat::{Assistant, ChatContext, build_messages};
use crate::services::openai::{EMPTY_COMPLETION_REPLY, Usage};
use crate::services::stripe::CheckoutUrls;
use crate::state::AppState;

/// Delay between simulated stream chunks when the keyword advisor answers.
const ADVISOR_CHUNK_DELAY: Duration = Duration::from_millis(50);

type EventStream = BoxStream<'static, Result<Event, Infallible>>;

// =============================================================================
// Chat
// =============================================================================

/// A conversation turn as the client sends it.
#[derive(Debug, Deserialize)]
pub struct ApiChatMessage {
    pub content: String,
    pub sender: String,
}

impl ApiChatMessage {
    /// Anything other than `user` or `ad` is treated as an assistant turn.
    fn into_message(self) -> ChatMessage {
        match self.sender.as_str() {
            "user" => ChatMessage::user(self.content),
            "ad" => ChatMessage {
                sender: Sender::Ad,
                ..ChatMessage::bot(self.content)
            },
            _ => ChatMessage::bot(self.content),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NamedProduct {
    pub name: String,
}

/// Cart line as far as the chat prompt cares.
#[derive(Debug, Deserialize)]
pub struct NamedCartItem {
    pub product: NamedProduct,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<ApiChatMessage>,
    #[serde(default)]
    pub cart_items: Vec<NamedCartItem>,
    #[serde(default)]
    pub current_product: Option<NamedProduct>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub message: String,
    pub usage: Option<Usage>,
}

/// `POST /api/chat`: one model completion for a client-held conversation.
///
/// # Errors
///
/// 400 for a malformed body, 500 when the model is not configured and the
/// mapped status for model failures.
#[instrument(skip_all)]
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        tracing::debug!(error = %e.body_text(), "Rejected chat payload");
        ApiError::BadRequest("Invalid messages format".to_string())
    })?;
    let client = state
        .openai()
        .ok_or(ApiError::NotConfigured("Chat service not configured"))?;

    let mushrooms = Assistant::new(Some(client), state.pool()).mushrooms().await;
    let context = ChatContext {
        mushrooms: &mushrooms,
        cart_product_names: request
            .cart_items
            .into_iter()
            .map(|item| item.product.name)
            .collect(),
        current_product: request.current_product.map(|p| p.name),
    };
    let conversation: Vec<ChatMessage> = request
        .messages
        .into_iter()
        .map(ApiChatMessage::into_message)
        .collect();

    let response = client.chat(&build_messages(&context, &conversation)).await?;

    Ok(Json(ChatReply {
        message: response
            .content()
            .unwrap_or(EMPTY_COMPLETION_REPLY)
            .to_string(),
        usage: response.usage,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamQuery {
    pub message: String,
    #[serde(default)]
    pub current_product: Option<String>,
}

/// Server-sent chat events.
///
/// `delta` events carry reply text as it arrives, `done` the complete reply
/// and `ad` a sponsored message when the cadence allows one.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    Delta { text: String },
    Done { message: String },
    Ad { ad: SponsoredAd },
    Error { message: String },
}

impl ChatStreamEvent {
    const fn name(&self) -> &'static str {
        match self {
            Self::Delta { .. } => "delta",
            Self::Done { .. } => "done",
            Self::Ad { .. } => "ad",
            Self::Error { .. } => "error",
        }
    }

    fn into_event(self) -> Event {
        let json = serde_json::to_string(&self).unwrap_or_else(|_| {
            r#"{"type":"error","message":"Failed to serialize event"}"#.to_string()
        });
        Event::default().event(self.name()).data(json)
    }
}

/// `GET /api/chat/stream`: stream a reply to the session transcript.
///
/// The visitor's message and the finished reply are saved to the session
/// when the stream completes.
///
/// # Errors
///
/// 400 for an empty message; model failures before the first byte map to
/// their API status. Failures mid-stream arrive as an `error` event.
#[instrument(skip_all)]
pub async fn chat_stream(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<KeepAliveStream<EventStream>>, ApiError> {
    let text = query.message.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::BadRequest("Message is required".to_string()));
    }

    let mut transcript = load_transcript(&session).await;
    transcript.push(ChatMessage::user(text.clone()));
    let cart = load_cart(&session).await;
    let current_product = query.current_product.filter(|p| !p.trim().is_empty());

    let events: EventStream = match state.openai() {
        Some(client) => {
            let mushrooms = Assistant::new(Some(client), state.pool()).mushrooms().await;
            let context = ChatContext {
                mushrooms: &mushrooms,
                cart_product_names: cart.product_names().map(str::to_string).collect(),
                current_product,
            };
            let mut deltas = client
                .chat_stream(&build_messages(&context, transcript.conversation()))
                .await?;

            stream! {
                let mut reply = String::new();
                while let Some(delta) = deltas.next().await {
                    match delta {
                        Ok(delta) => {
                            reply.push_str(&delta);
                            yield Ok(ChatStreamEvent::Delta { text: delta }.into_event());
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Chat stream interrupted");
                            yield Ok(ChatStreamEvent::Error { message: e.to_string() }.into_event());
                            return;
                        }
                    }
                }
                if reply.trim().is_empty() {
                    reply = EMPTY_COMPLETION_REPLY.to_string();
                }
                for event in finish_turn(&state, &session, transcript, &text, ChatMessage::bot(reply)).await {
                    yield Ok(event.into_event());
                }
            }
            .boxed()
        }
        None => {
            let mushrooms = Assistant::new(None, state.pool()).mushrooms().await;
            let advisor = KeywordAdvisor::new(mushrooms);
            let message = advisor.respond(&text).message;

            stream! {
                for chunk in chunk_words(&message) {
                    tokio::time::sleep(ADVISOR_CHUNK_DELAY).await;
                    yield Ok(ChatStreamEvent::Delta { text: chunk }.into_event());
                }
                for event in finish_turn(&state, &session, transcript, &text, ChatMessage::bot(message)).await {
                    yield Ok(event.into_event());
                }
            }
            .boxed()
        }
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Append the reply and any sponsored message, then persist the transcript.
async fn finish_turn(
    state: &AppState,
    session: &Session,
    mut transcript: Transcript,
    user_message: &str,
    reply: ChatMessage,
) -> Vec<ChatStreamEvent> {
    let message = reply.content.clone();
    transcript.push(reply);
    let mut events = vec![ChatStreamEvent::Done {
        message: message.clone(),
    }];

    match Visitor::load(session).await {
        Ok(visitor) => {
            let request = AdRequest {
                user_id: visitor.user_id,
                chat_id: visitor.chat_id,
                user_message: user_message.to_string(),
                bot_response: message,
                conversation_turn: transcript.user_turns(),
            };
            if let Some(ad) = state.ads().sponsored_message(&request).await {
                transcript.push(ChatMessage::sponsored(ad.clone()));
                events.push(ChatStreamEvent::Ad { ad });
            }
        }
        Err(e) => tracing::warn!(error = %e, "Failed to load visitor ids, skipping ad"),
    }

    // The response head has already passed the session layer, so persist here.
    let saved = match save_transcript(session, &transcript).await {
        Ok(()) => session.save().await,
        Err(e) => Err(e),
    };
    if let Err(e) = saved {
        tracing::error!(error = %e, "Failed to save chat transcript");
    }
    events
}

// =============================================================================
// Checkout
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    #[serde(default)]
    pub cart_items: Vec<CartItem>,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
}

/// `POST /api/create-checkout-session`: Stripe Checkout for a client cart.
///
/// # Errors
///
/// 400 for a malformed or empty cart, otherwise the mapped Stripe failure.
#[instrument(skip_all)]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    payload: Result<Json<CreateCheckoutRequest>, JsonRejection>,
) -> Result<Json<CreateCheckoutResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let cart = Cart::from(request.cart_items);
    if cart.is_empty() {
        return Err(ApiError::BadRequest("No items in cart".to_string()));
    }

    let urls = CheckoutUrls {
        success_url: request.success_url,
        cancel_url: request.cancel_url,
    };
    let session = state
        .stripe()
        .create_checkout_session(cart.items(), &urls, &state.config().base_url)
        .await?;

    tracing::info!(session_id = %session.id, items = cart.items().len(), "Created checkout session");

    Ok(Json(CreateCheckoutResponse {
        session_id: session.id,
        url: session.url,
    }))
}

/// `GET /api/stripe-products`: the active Stripe catalog.
///
/// # Errors
///
/// 500 when Stripe cannot be reached.
#[instrument(skip_all)]
pub async fn stripe_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<StripeProduct>>, ApiError> {
    let products = state
        .stripe()
        .list_products()
        .await
        .map_err(ApiError::StripeCatalog)?;
    Ok(Json(products.to_vec()))
}

// =============================================================================
// Ads
// =============================================================================

/// `POST /api/thrads-ad`: pass-through to the Thrads get-ad endpoint.
///
/// Served ads and no-fills both answer with `status: "success"`; a declined
/// request answers `status: "error"` with Thrads' message.
///
/// # Errors
///
/// 500 when Thrads is not configured or unreachable, Thrads' own status for
/// HTTP failures.
#[instrument(skip_all)]
pub async fn thrads_ad(
    State(state): State<AppState>,
    payload: Result<Json<AdRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let client = state
        .ads()
        .client()
        .ok_or(ApiError::NotConfigured("Thrads API key not configured"))?;

    match client.get_ad(&request).await {
        Ok(AdOutcome::Served(ad)) => Ok(Json(served_ad_body(&ad))),
        Ok(AdOutcome::NoFill(message)) => Ok(Json(json!({
            "status": "success",
            "message": message,
            "data": null,
        }))),
        Err(ThradsError::Rejected(message)) => Ok(Json(json!({
            "status": "error",
            "message": message,
        }))),
        Err(e) => Err(e.into()),
    }
}

fn served_ad_body(ad: &SponsoredAd) -> Value {
    json!({
        "status": "success",
        "data": {
            "ad": {
                "id": ad.id,
                "content": ad.content,
                "title": ad.title,
                "image": ad.image.as_deref().unwrap_or_default(),
                "url": ad.url.as_deref().unwrap_or_default(),
                "cta": ad.cta,
                "sponsored": ad.sponsored,
                "timestamp": ad.timestamp,
                "impressionId": ad.impression_id,
            },
            "impressionId": ad.impression_id,
        },
    })
}
