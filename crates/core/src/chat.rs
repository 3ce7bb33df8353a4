//! Chat transcript, ad cadence and the offline keyword advisor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{Mushroom, Product};
use crate::types::{ImpressionId, MessageId, Sender};

/// First message of every transcript.
pub const GREETING: &str = "Hi there! 👋 I'm your mushroom supplement guide. I can help you find the perfect supplements for your wellness goals. What would you like to improve today?";

/// Reply shown when the assistant backend fails.
pub const FALLBACK_REPLY: &str = "I'm sorry, I'm having trouble connecting to my knowledge base right now. Please try again in a moment, or feel free to browse our mushroom collection directly! 🍄";

/// Reply used by the keyword advisor when nothing in the message matches.
pub const CLARIFYING_REPLY: &str = "I'd love to help you find the perfect mushroom supplement! Could you tell me more about what you're looking to improve? Are you interested in focus, energy, stress relief, or immune support?";

/// Ads are never shown before this many messages.
pub const MIN_MESSAGES_BEFORE_AD: usize = 3;

/// Default number of messages between ads.
pub const DEFAULT_AD_FREQUENCY: usize = 3;

/// A sponsored message served by the ad network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsoredAd {
    pub id: String,
    pub content: String,
    pub title: String,
    pub image: Option<String>,
    pub url: Option<String>,
    pub cta: String,
    pub sponsored: bool,
    pub timestamp: DateTime<Utc>,
    pub impression_id: ImpressionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_suggestion: Option<Product>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad: Option<SponsoredAd>,
}

impl ChatMessage {
    fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(Uuid::new_v4().to_string()),
            content: content.into(),
            sender,
            timestamp: Utc::now(),
            product_suggestion: None,
            ad: None,
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Sender::User, content)
    }

    #[must_use]
    pub fn bot(content: impl Into<String>) -> Self {
        Self::new(Sender::Bot, content)
    }

    /// Wrap a sponsored ad as a transcript entry.
    #[must_use]
    pub fn sponsored(ad: SponsoredAd) -> Self {
        let mut message = Self::new(Sender::Ad, ad.content.clone());
        message.ad = Some(ad);
        message
    }

    #[must_use]
    pub fn greeting() -> Self {
        Self::bot(GREETING)
    }

    #[must_use]
    pub fn with_suggestion(mut self, product: Option<Product>) -> Self {
        self.product_suggestion = product;
        self
    }
}

/// A visitor's conversation. Always starts with the greeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage::greeting()],
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Number of messages the visitor has sent.
    #[must_use]
    pub fn user_turns(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.sender == Sender::User)
            .count()
    }

    /// Messages exchanged with the assistant, without sponsored entries.
    pub fn conversation(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| m.sender != Sender::Ad)
    }

    /// Look up the ad carried by a sponsored message.
    #[must_use]
    pub fn find_ad(&self, impression_id: &ImpressionId) -> Option<&SponsoredAd> {
        self.messages
            .iter()
            .filter_map(|m| m.ad.as_ref())
            .find(|ad| &ad.impression_id == impression_id)
    }

    /// Drop a sponsored message once the visitor dismisses it.
    pub fn remove_ad(&mut self, impression_id: &ImpressionId) -> Option<SponsoredAd> {
        let index = self.messages.iter().position(|m| {
            m.ad.as_ref()
                .is_some_and(|ad| &ad.impression_id == impression_id)
        })?;
        self.messages.remove(index).ad
    }

    /// Reset to just the greeting.
    pub fn clear(&mut self) {
        self.messages = vec![ChatMessage::greeting()];
    }
}

/// Decides when a sponsored message is injected into the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdCadence {
    pub enabled: bool,
    pub frequency: usize,
}

impl Default for AdCadence {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: DEFAULT_AD_FREQUENCY,
        }
    }
}

impl AdCadence {
    #[must_use]
    pub const fn new(enabled: bool, frequency: usize) -> Self {
        Self { enabled, frequency }
    }

    #[must_use]
    pub const fn disabled() -> Self {
        Self::new(false, DEFAULT_AD_FREQUENCY)
    }

    /// True on message counts 3, 6, 9, ... for the default frequency.
    #[must_use]
    pub const fn should_show(&self, message_count: usize) -> bool {
        self.enabled
            && self.frequency > 0
            && message_count >= MIN_MESSAGES_BEFORE_AD
            && message_count % self.frequency == 0
    }
}

const KEYWORDS: &[&str] = &[
    "focus",
    "concentrate",
    "study",
    "brain",
    "cognitive",
    "mental",
    "memory",
    "remember",
    "stress",
    "anxiety",
    "calm",
    "relax",
    "zen",
    "adaptogen",
    "energy",
    "tired",
    "fatigue",
    "stamina",
    "endurance",
    "athletic",
    "performance",
    "immune",
    "immunity",
    "cold",
    "flu",
    "sick",
    "cancer",
    "tumor",
    "antioxidant",
    "aging",
    "anti-aging",
    "cellular",
    "skin",
    "beauty",
    "sleep",
    "insomnia",
    "rest",
    "bedtime",
    "gut",
    "digestion",
    "digestive",
    "stomach",
    "heart",
    "cholesterol",
    "cardiovascular",
    "liver",
    "detox",
    "detoxification",
    "inflammation",
    "anti-inflammatory",
];

/// Wellness keywords mentioned in `message`, in vocabulary order.
#[must_use]
pub fn extract_keywords(message: &str) -> Vec<&'static str> {
    let message = message.to_lowercase();
    KEYWORDS
        .iter()
        .copied()
        .filter(|keyword| message.contains(keyword))
        .collect()
}

/// Reply from the keyword advisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisorReply<'a> {
    pub message: String,
    pub suggestion: Option<&'a Mushroom>,
}

/// Offline recommender that scores mushrooms against message keywords.
///
/// Serves as the assistant when the language model is not configured.
#[derive(Debug, Clone, Default)]
pub struct KeywordAdvisor {
    mushrooms: Vec<Mushroom>,
}

impl KeywordAdvisor {
    #[must_use]
    pub const fn new(mushrooms: Vec<Mushroom>) -> Self {
        Self { mushrooms }
    }

    /// Score for one mushroom: +2 per matching effect or impact, +3 for a
    /// name match and +1 for a story match, summed over keywords.
    #[must_use]
    pub fn score(mushroom: &Mushroom, keywords: &[&str]) -> u32 {
        let name = mushroom.name.to_lowercase();
        let story = mushroom.story_behind_consumption.to_lowercase();
        let effects: Vec<String> = mushroom
            .expected_effects
            .iter()
            .chain(&mushroom.impact_on_life)
            .map(|effect| effect.to_lowercase())
            .collect();

        keywords
            .iter()
            .map(|keyword| {
                let keyword = keyword.to_lowercase();
                let effect_hits = effects.iter().filter(|e| e.contains(&keyword)).count();
                let mut score = u32::try_from(effect_hits).unwrap_or(u32::MAX).saturating_mul(2);
                if name.contains(&keyword) {
                    score += 3;
                }
                if story.contains(&keyword) {
                    score += 1;
                }
                score
            })
            .fold(0u32, u32::saturating_add)
    }

    /// Highest-scoring mushroom; ties keep catalog order. `None` when every
    /// score is zero.
    #[must_use]
    pub fn best_match(&self, keywords: &[&str]) -> Option<&Mushroom> {
        let mut best: Option<(&Mushroom, u32)> = None;
        for mushroom in &self.mushrooms {
            let score = Self::score(mushroom, keywords);
            if score > 0 && best.is_none_or(|(_, top)| score > top) {
                best = Some((mushroom, score));
            }
        }
        best.map(|(mushroom, _)| mushroom)
    }

    #[must_use]
    pub fn respond(&self, message: &str) -> AdvisorReply<'_> {
        let keywords = extract_keywords(message);
        let Some(mushroom) = self.best_match(&keywords) else {
            return AdvisorReply {
                message: CLARIFYING_REPLY.to_owned(),
                suggestion: None,
            };
        };

        let mut reply = format!("I recommend {}", mushroom.name);
        if !mushroom.scientific_name.is_empty() {
            reply.push_str(&format!(" ({})", mushroom.scientific_name));
        }
        reply.push('!');
        if !mushroom.story_behind_consumption.is_empty() {
            reply.push(' ');
            reply.push_str(&mushroom.story_behind_consumption);
        }
        if !mushroom.expected_effects.is_empty() {
            reply.push_str(&format!(
                " It's known for: {}.",
                mushroom.expected_effects.join(", ")
            ));
        }
        if !mushroom.impact_on_life.is_empty() {
            reply.push_str(&format!(
                " Users typically experience: {}.",
                mushroom.impact_on_life.join(", ")
            ));
        }

        AdvisorReply {
            message: reply,
            suggestion: Some(mushroom),
        }
    }
}

/// Split a reply into word chunks for simulated streaming.
///
/// Every chunk after the first carries its leading space, so concatenating
/// the chunks yields the words joined by single spaces.
#[must_use]
pub fn chunk_words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            if i == 0 {
                word.to_owned()
            } else {
                format!(" {word}")
            }
        })
        .collect()
}
