//! Chat panel route handlers (HTMX).
//!
//! The transcript lives in the session. Each visitor message gets an
//! assistant reply and, on the ad cadence, a sponsored message.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use lyceum_core::chat::{ChatMessage, Transcript};
use lyceum_core::{ImpressionId, wellness};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::{Visitor, load_cart, load_transcript, save_transcript};
use crate::services::ads::AdRequest;
use crate::services::chat::Assistant;
use crate::state::AppState;

/// Send message form data.
#[derive(Debug, Deserialize)]
pub struct SendMessageForm {
    pub message: String,
    /// Name of the product the visitor is viewing, if any.
    #[serde(default)]
    pub current_product: Option<String>,
}

/// "Ask AI" form data from the checkout wellness profile.
#[derive(Debug, Deserialize)]
pub struct AskForm {
    pub effect: String,
    pub mushroom: String,
    /// A follow-up question; absent for the initial explanation.
    #[serde(default)]
    pub question: Option<String>,
}

/// Chat messages fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/chat_messages.html")]
pub struct ChatMessagesTemplate {
    pub messages: Vec<ChatMessage>,
}

/// "Ask AI" answer fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/ask_answer.html")]
pub struct AskAnswerTemplate {
    pub effect: String,
    pub mushroom: String,
    pub question: Option<String>,
    pub answer: String,
}

/// The whole transcript (HTMX).
#[instrument(skip(session))]
pub async fn show(session: Session) -> impl IntoResponse {
    ChatMessagesTemplate {
        messages: load_transcript(&session).await.messages().to_vec(),
    }
}

/// Send a message and return the new entries (HTMX).
///
/// Returns the visitor's message, the reply and possibly a sponsored message.
#[instrument(skip(state, session, form))]
pub async fn send(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SendMessageForm>,
) -> Result<Response> {
    let text = form.message.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("message is empty".to_string()));
    }

    let mut transcript = load_transcript(&session).await;
    let first_new = transcript.messages().len();
    transcript.push(ChatMessage::user(text));

    let cart = load_cart(&session).await;
    let reply = Assistant::new(state.openai(), state.pool())
        .reply(
            &transcript,
            text,
            cart.product_names().map(str::to_string).collect(),
            form.current_product.filter(|p| !p.trim().is_empty()),
        )
        .await;
    transcript.push(reply.to_message());

    let visitor = Visitor::load(&session).await?;
    let request = ad_request(&visitor, &transcript, text, &reply.message);
    if let Some(ad) = state.ads().sponsored_message(&request).await {
        transcript.push(ChatMessage::sponsored(ad));
    }

    save_transcript(&session, &transcript).await?;

    Ok(ChatMessagesTemplate {
        messages: transcript.messages().get(first_new..).unwrap_or_default().to_vec(),
    }
    .into_response())
}

/// Reset the transcript to the greeting and start a new ad-network chat.
#[instrument(skip(session))]
pub async fn clear(session: Session) -> Result<Response> {
    let transcript = Transcript::new();
    save_transcript(&session, &transcript).await?;
    Visitor::restart_chat(&session).await?;

    add_breadcrumb("chat", "Cleared transcript", None);

    Ok(ChatMessagesTemplate {
        messages: transcript.messages().to_vec(),
    }
    .into_response())
}

/// Explain how a mushroom delivers an effect (HTMX).
#[instrument(skip(form), fields(effect = %form.effect))]
pub async fn ask(Form(form): Form<AskForm>) -> impl IntoResponse {
    let question = form.question.filter(|q| !q.trim().is_empty());
    let answer = if question.is_some() {
        wellness::effect_follow_up(&form.effect)
    } else {
        wellness::explain_effect(&form.effect, &form.mushroom)
    };

    AskAnswerTemplate {
        effect: form.effect,
        mushroom: form.mushroom,
        question,
        answer,
    }
}

/// Record a click on a sponsored message.
///
/// The link itself opens in a new tab; this only logs the event.
#[instrument(skip(state, session))]
pub async fn ad_click(
    State(state): State<AppState>,
    session: Session,
    Path(impression_id): Path<String>,
) -> Result<StatusCode> {
    let transcript = load_transcript(&session).await;
    let impression_id = ImpressionId::new(impression_id);
    let ad = transcript
        .find_ad(&impression_id)
        .ok_or_else(|| AppError::NotFound(format!("ad {impression_id}")))?;

    let visitor = Visitor::load(&session).await?;
    let request = ad_request(&visitor, &transcript, "", "");
    state.ads().track_click(ad, &request).await;

    Ok(StatusCode::NO_CONTENT)
}

/// Dismiss a sponsored message; the fragment swaps it out with nothing.
#[instrument(skip(state, session))]
pub async fn ad_dismiss(
    State(state): State<AppState>,
    session: Session,
    Path(impression_id): Path<String>,
) -> Result<Response> {
    let mut transcript = load_transcript(&session).await;
    let impression_id = ImpressionId::new(impression_id);
    let ad = transcript
        .remove_ad(&impression_id)
        .ok_or_else(|| AppError::NotFound(format!("ad {impression_id}")))?;
    save_transcript(&session, &transcript).await?;

    let visitor = Visitor::load(&session).await?;
    let request = ad_request(&visitor, &transcript, "", "");
    state.ads().track_dismiss(&ad, &request).await;

    Ok((StatusCode::OK, "").into_response())
}

/// Ad-network request for the transcript's current turn.
fn ad_request(
    visitor: &Visitor,
    transcript: &Transcript,
    user_message: &str,
    bot_response: &str,
) -> AdRequest {
    AdRequest {
        user_id: visitor.user_id.clone(),
        chat_id: visitor.chat_id.clone(),
        user_message: user_message.to_string(),
        bot_response: bot_response.to_string(),
        conversation_turn: transcript.user_turns(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ad_request_counts_user_turns() {
        let visitor = Visitor {
            user_id: "user_1".to_string(),
            chat_id: "chat_1".to_string(),
        };
        let mut transcript = Transcript::new();
        for text in ["focus", "sleep", "energy"] {
            transcript.push(ChatMessage::user(text));
            transcript.push(ChatMessage::bot("ok"));
        }

        let request = ad_request(&visitor, &transcript, "energy", "ok");
        assert_eq!(request.conversation_turn, 3);
        assert_eq!(request.chat_id, "chat_1");
    }

    #[tokio::test]
    async fn test_ask_explains_then_follows_up() {
        let explain = AskForm {
            effect: "focus".to_string(),
            mushroom: "Lion's Mane".to_string(),
            question: Some("   ".to_string()),
        };
        let html = ask(Form(explain)).await.into_response();
        assert_eq!(html.status(), StatusCode::OK);

        let answer = wellness::explain_effect("focus", "Lion's Mane");
        assert!(answer.starts_with("Lion's Mane enhances focus"));
        assert!(wellness::effect_follow_up("focus").contains("2-4 weeks"));
    }
}
