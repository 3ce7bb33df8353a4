//! Chat assistant: prompt assembly and reply generation.
//!
//! Builds the system prompt from the catalog, the visitor's cart and the
//! product they are looking at, then maps the transcript onto model roles.
//! Without a working model the keyword advisor answers instead.

use sqlx::PgPool;
use tracing::instrument;

use lyceum_core::chat::{ChatMessage, FALLBACK_REPLY, KeywordAdvisor, Transcript};
use lyceum_core::{Mushroom, MushroomProduct, Product, Sender};

use super::openai::{EMPTY_COMPLETION_REPLY, Message, OpenAiClient, Usage};
use crate::db::CatalogRepository;

pub const SYSTEM_PROMPT: &str = "You are an expert mushroom supplement advisor and salesperson for Lyceum, a premium mushroom supplement brand. Your role is to:

1. **Provide Expert Advice**: Help customers find the perfect mushroom supplements based on their wellness goals
2. **Educate**: Share knowledge about mushroom benefits, traditional uses, and modern research
3. **Recommend Products**: Suggest specific mushrooms from our premium collection
4. **Build Trust**: Be knowledgeable, friendly, and professional
5. **Drive Sales**: Naturally guide conversations toward product recommendations

**Available Mushroom Products:**
- Reishi: Immune support, stress relief, sleep quality
- Lion's Mane: Cognitive function, memory, focus
- Cordyceps: Energy, athletic performance, stamina
- Chaga: Antioxidant, immune support, cellular health
- Turkey Tail: Immune system, gut health
- Maitake: Blood sugar support, immune function
- Shiitake: Immune support, cardiovascular health
- Oyster: Cholesterol support, antioxidant properties

**Conversation Guidelines:**
- Always be helpful and informative
- Ask follow-up questions to understand customer needs
- Provide specific product recommendations with benefits
- Mention scientific backing when relevant
- Be enthusiastic about the products but not pushy
- Address common concerns about mushroom supplements
- Suggest complementary mushroom combinations when appropriate

**Response Style:**
- Conversational and friendly
- Include emojis occasionally for warmth
- Be concise but informative
- Always end with a question or call-to-action
- Reference specific mushroom benefits and effects

Remember: You're helping people improve their wellness through premium mushroom supplements. Be their trusted advisor!";

/// What the assistant knows about the visitor's session.
#[derive(Debug, Clone, Default)]
pub struct ChatContext<'a> {
    pub mushrooms: &'a [Mushroom],
    pub cart_product_names: Vec<String>,
    pub current_product: Option<String>,
}

/// System prompt followed by the non-empty context sections, separated by blank lines.
#[must_use]
pub fn system_prompt(context: &ChatContext<'_>) -> String {
    let mushrooms = context
        .mushrooms
        .iter()
        .map(|m| {
            format!(
                "{}: {}. {}",
                m.name,
                m.expected_effects.join(", "),
                m.story_behind_consumption
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut parts = vec![SYSTEM_PROMPT.to_string()];
    if !mushrooms.is_empty() {
        parts.push(format!("\n**Available Products:**\n{mushrooms}"));
    }
    if !context.cart_product_names.is_empty() {
        parts.push(format!(
            "\n**Customer Cart:** Current cart: {}",
            context.cart_product_names.join(", ")
        ));
    }
    if let Some(product) = context.current_product.as_deref().filter(|p| !p.is_empty()) {
        parts.push(format!("\n**Current Product:** Currently viewing: {product}"));
    }
    parts.join("\n\n")
}

/// Model messages for a conversation: the system prompt, then each turn.
///
/// Sponsored messages never reach the model.
#[must_use]
pub fn build_messages<'m>(
    context: &ChatContext<'_>,
    conversation: impl IntoIterator<Item = &'m ChatMessage>,
) -> Vec<Message> {
    std::iter::once(Message::system(system_prompt(context)))
        .chain(conversation.into_iter().filter_map(|msg| match msg.sender {
            Sender::User => Some(Message::user(msg.content.clone())),
            Sender::Bot => Some(Message::assistant(msg.content.clone())),
            Sender::Ad => None,
        }))
        .collect()
}

/// Where a reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    Model,
    /// The model failed; the reply is the fallback apology.
    Fallback,
    /// No model configured; the keyword advisor answered.
    Advisor,
}

/// The assistant's answer to one visitor message.
#[derive(Debug, Clone)]
pub struct AssistantReply {
    pub message: String,
    /// Product card shown under the reply when the advisor found a match.
    pub suggestion: Option<Product>,
    pub usage: Option<Usage>,
    pub source: ReplySource,
}

impl AssistantReply {
    /// The reply as a transcript entry.
    #[must_use]
    pub fn to_message(&self) -> ChatMessage {
        ChatMessage::bot(self.message.clone()).with_suggestion(self.suggestion.clone())
    }
}

/// Generates replies for the storefront chat panel.
pub struct Assistant<'a> {
    openai: Option<&'a OpenAiClient>,
    pool: &'a PgPool,
}

impl<'a> Assistant<'a> {
    #[must_use]
    pub const fn new(openai: Option<&'a OpenAiClient>, pool: &'a PgPool) -> Self {
        Self { openai, pool }
    }

    /// Catalog mushrooms for the prompt and the advisor. Empty on error.
    pub async fn mushrooms(&self) -> Vec<Mushroom> {
        CatalogRepository::new(self.pool)
            .mushrooms()
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to load mushrooms for chat");
                Vec::new()
            })
    }

    /// Answer the latest user message in `transcript`.
    ///
    /// Model failures are logged and answered with the fallback apology plus
    /// the advisor's product suggestion.
    #[instrument(skip_all)]
    pub async fn reply(
        &self,
        transcript: &Transcript,
        user_message: &str,
        cart_product_names: Vec<String>,
        current_product: Option<String>,
    ) -> AssistantReply {
        let mushrooms = self.mushrooms().await;

        let Some(client) = self.openai else {
            let advisor = KeywordAdvisor::new(mushrooms);
            let answer = advisor.respond(user_message);
            let suggestion = self.suggested_product(answer.suggestion).await;
            return AssistantReply {
                message: answer.message,
                suggestion,
                usage: None,
                source: ReplySource::Advisor,
            };
        };

        let context = ChatContext {
            mushrooms: &mushrooms,
            cart_product_names,
            current_product,
        };
        let messages = build_messages(&context, transcript.conversation());

        match client.chat(&messages).await {
            Ok(response) => AssistantReply {
                message: response
                    .content()
                    .unwrap_or(EMPTY_COMPLETION_REPLY)
                    .to_string(),
                suggestion: None,
                usage: response.usage,
                source: ReplySource::Model,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Chat completion failed, using fallback reply");
                let advisor = KeywordAdvisor::new(mushrooms);
                let suggestion = self
                    .suggested_product(advisor.respond(user_message).suggestion)
                    .await;
                AssistantReply {
                    message: FALLBACK_REPLY.to_string(),
                    suggestion,
                    usage: None,
                    source: ReplySource::Fallback,
                }
            }
        }
    }

    async fn suggested_product(&self, mushroom: Option<&Mushroom>) -> Option<Product> {
        let mushroom = mushroom?.clone();
        let product = CatalogRepository::new(self.pool)
            .first_product_by_mushroom(&mushroom.id)
            .await;
        Some(MushroomProduct::new(mushroom, product).display_product())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use lyceum_core::MushroomId;
    use lyceum_core::chat::Transcript;

    use super::*;
    use crate::services::openai::Role;

    fn reishi() -> Mushroom {
        Mushroom {
            id: MushroomId::new("m-1"),
            name: "Reishi".to_string(),
            scientific_name: "Ganoderma lucidum".to_string(),
            region_medicine: "TCM".to_string(),
            expected_effects: vec!["calm".to_string(), "sleep".to_string()],
            story_behind_consumption: "The mushroom of immortality.".to_string(),
            impact_on_life: vec![],
            created_at: Utc::now(),
            video_url: None,
            photo_url: None,
        }
    }

    #[test]
    fn test_system_prompt_skips_empty_sections() {
        let prompt = system_prompt(&ChatContext::default());
        assert_eq!(prompt, SYSTEM_PROMPT);
    }

    #[test]
    fn test_system_prompt_includes_context() {
        let mushrooms = [reishi()];
        let context = ChatContext {
            mushrooms: &mushrooms,
            cart_product_names: vec!["Chaga".to_string(), "Enoki".to_string()],
            current_product: Some("Lion's Mane".to_string()),
        };
        let prompt = system_prompt(&context);
        assert!(prompt.contains("**Available Products:**\nReishi: calm, sleep. The mushroom of immortality."));
        assert!(prompt.contains("Current cart: Chaga, Enoki"));
        assert!(prompt.ends_with("Currently viewing: Lion's Mane"));
    }

    #[test]
    fn test_build_messages_maps_roles() {
        let mut transcript = Transcript::new();
        transcript.push(ChatMessage::user("I can't sleep"));
        transcript.push(ChatMessage::bot("Try Reishi"));

        let messages = build_messages(&ChatContext::default(), transcript.conversation());
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        // greeting is a bot message
        assert_eq!(
            roles,
            vec![Role::System, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(messages[2].content, "I can't sleep");
    }
}
