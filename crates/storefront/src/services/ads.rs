//! Sponsored messages from the Thrads ad network.
//!
//! `ThradsClient` fetches a creative for the latest exchange. `AdService`
//! decides when to ask (the cadence), wraps the creative as a
//! `SponsoredAd` and records shown/clicked/dismissed events.

use std::time::Duration;

use chrono::Utc;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use lyceum_core::chat::{AdCadence, SponsoredAd};
use lyceum_core::{AdEvent, ImpressionId};

use crate::config::ThradsConfig;
use crate::db::{AdImpression, AdImpressionRepository};

const DEFAULT_AD_TITLE: &str = "Sponsored Content";
const AD_CTA: &str = "Learn More";

/// Errors that can occur when interacting with the Thrads API.
#[derive(Debug, Error)]
pub enum ThradsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Thrads returned a non-success HTTP status.
    #[error("API error: {0}")]
    Api(u16),

    /// Thrads answered but declined the request.
    #[error("ad request rejected: {0}")]
    Rejected(String),

    /// Failed to parse response or build a request.
    #[error("parse error: {0}")]
    Parse(String),
}

/// The latest exchange, sent to Thrads for contextual targeting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdRequest {
    pub user_id: String,
    pub chat_id: String,
    pub user_message: String,
    pub bot_response: String,
    #[serde(default)]
    pub conversation_turn: usize,
}

/// Result of a successful ad request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdOutcome {
    Served(SponsoredAd),
    /// No creative available for this exchange.
    NoFill(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetAdPayload<'a> {
    user_id: &'a str,
    chat_id: &'a str,
    content: ExchangeContent<'a>,
    conversation_offset: u32,
    ad_frequency_limit: usize,
    user_region: &'a str,
}

#[derive(Debug, Serialize)]
struct ExchangeContent<'a> {
    user: &'a str,
    chatbot: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetAdResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct AdData {
    creative: Creative,
    #[serde(default)]
    prod_name: Option<String>,
    #[serde(default)]
    img_url: Option<String>,
    #[serde(default)]
    prod_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Creative {
    creative: String,
}

/// Client for the Thrads get-ad endpoint.
#[derive(Clone)]
pub struct ThradsClient {
    client: reqwest::Client,
    endpoint: String,
    ad_frequency: usize,
    user_region: String,
}

impl ThradsClient {
    /// Create a new Thrads client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &ThradsConfig) -> Result<Self, ThradsError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut key = HeaderValue::from_str(config.api_key.expose_secret())
            .map_err(|e| ThradsError::Parse(format!("Invalid API key format: {e}")))?;
        key.set_sensitive(true);
        headers.insert("thrads-api-key", key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/api/v1/message/get-ad/",
                config.api_base.trim_end_matches('/')
            ),
            ad_frequency: config.ad_frequency,
            user_region: config.user_region.clone(),
        })
    }

    /// Ask for a sponsored message for the latest exchange.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, or a
    /// response whose status is not `success`.
    #[instrument(skip(self, request), fields(chat_id = %request.chat_id))]
    pub async fn get_ad(&self, request: &AdRequest) -> Result<AdOutcome, ThradsError> {
        let payload = GetAdPayload {
            user_id: &request.user_id,
            chat_id: &request.chat_id,
            content: ExchangeContent {
                user: &request.user_message,
                chatbot: &request.bot_response,
            },
            conversation_offset: 0,
            ad_frequency_limit: self.ad_frequency,
            user_region: &self.user_region,
        };

        let response = self.client.post(&self.endpoint).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = %status, "Thrads API returned non-success status");
            return Err(ThradsError::Api(status.as_u16()));
        }

        let body: GetAdResponse = response
            .json()
            .await
            .map_err(|e| ThradsError::Parse(e.to_string()))?;
        interpret(body)
    }
}

/// Map a get-ad response body onto an outcome.
fn interpret(body: GetAdResponse) -> Result<AdOutcome, ThradsError> {
    if body.status != "success" {
        return Err(ThradsError::Rejected(
            body.message.unwrap_or_else(|| "No ad available".to_string()),
        ));
    }

    let data = body
        .data
        .filter(|d| d.as_object().is_some_and(|obj| !obj.is_empty()));
    let Some(data) = data else {
        return Ok(AdOutcome::NoFill(
            body.message
                .unwrap_or_else(|| "No ad available at this time".to_string()),
        ));
    };

    let data: AdData = serde_json::from_value(data).map_err(|e| {
        ThradsError::Rejected(body.message.clone().unwrap_or_else(|| format!("No ad available: {e}")))
    })?;

    let now = Utc::now();
    let impression_id = body
        .request_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    Ok(AdOutcome::Served(SponsoredAd {
        id: format!("ad_{}", now.timestamp_millis()),
        content: data.creative.creative,
        title: data
            .prod_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_AD_TITLE.to_string()),
        image: data.img_url.filter(|u| !u.is_empty()),
        url: data.prod_url.filter(|u| !u.is_empty()),
        cta: AD_CTA.to_string(),
        sponsored: true,
        timestamp: now,
        impression_id: ImpressionId::new(impression_id),
    }))
}

/// Cadence, ad fetching and impression logging for the chat assistant.
#[derive(Clone)]
pub struct AdService {
    client: Option<ThradsClient>,
    cadence: AdCadence,
    pool: PgPool,
}

impl AdService {
    /// Ads are enabled exactly when a client is configured.
    #[must_use]
    pub fn new(client: Option<ThradsClient>, pool: PgPool) -> Self {
        let cadence = client.as_ref().map_or_else(AdCadence::disabled, |c| {
            AdCadence::new(true, c.ad_frequency)
        });
        Self {
            client,
            cadence,
            pool,
        }
    }

    #[must_use]
    pub const fn cadence(&self) -> AdCadence {
        self.cadence
    }

    #[must_use]
    pub const fn client(&self) -> Option<&ThradsClient> {
        self.client.as_ref()
    }

    /// Fetch an ad when the cadence says this turn should carry one.
    ///
    /// Failures are logged and yield `None`; the conversation carries on.
    pub async fn sponsored_message(&self, request: &AdRequest) -> Option<SponsoredAd> {
        if !self.cadence.should_show(request.conversation_turn) {
            return None;
        }
        let client = self.client.as_ref()?;

        match client.get_ad(request).await {
            Ok(AdOutcome::Served(ad)) => {
                self.log_impression(&ad, request, AdEvent::Shown).await;
                Some(ad)
            }
            Ok(AdOutcome::NoFill(message)) => {
                tracing::debug!(%message, "No sponsored message available");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch sponsored message");
                None
            }
        }
    }

    /// Record an event for an ad. Failures are logged, never returned.
    pub async fn log_impression(&self, ad: &SponsoredAd, request: &AdRequest, event: AdEvent) {
        let impression = AdImpression::new(
            ad.impression_id.clone(),
            ad.id.clone(),
            request.user_id.clone(),
            request.chat_id.clone(),
            request.conversation_turn,
            event,
        );
        if let Err(e) = AdImpressionRepository::new(&self.pool).record(&impression).await {
            tracing::warn!(
                error = %e,
                impression_id = %ad.impression_id,
                event = %event,
                "Failed to log ad impression"
            );
        }
    }

    pub async fn track_click(&self, ad: &SponsoredAd, request: &AdRequest) {
        tracing::info!(impression_id = %ad.impression_id, ad_id = %ad.id, "Ad clicked");
        self.log_impression(ad, request, AdEvent::Clicked).await;
    }

    pub async fn track_dismiss(&self, ad: &SponsoredAd, request: &AdRequest) {
        tracing::info!(impression_id = %ad.impression_id, ad_id = %ad.id, "Ad dismissed");
        self.log_impression(ad, request, AdEvent::Dismissed).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> GetAdResponse {
        serde_json::from_str(json).expect("deserialize")
    }

    #[test]
    fn test_interpret_served() {
        let body = response(
            r#"{
                "status": "success",
                "requestId": "req-42",
                "data": {
                    "creative": {"creative": "Sleep deeper with Calm Tea"},
                    "prod_name": "Calm Tea",
                    "img_url": "",
                    "prod_url": "https://partner.example/tea"
                }
            }"#,
        );
        let AdOutcome::Served(ad) = interpret(body).expect("ok") else {
            panic!("expected an ad");
        };
        assert_eq!(ad.content, "Sleep deeper with Calm Tea");
        assert_eq!(ad.title, "Calm Tea");
        assert_eq!(ad.image, None);
        assert_eq!(ad.url.as_deref(), Some("https://partner.example/tea"));
        assert_eq!(ad.cta, "Learn More");
        assert!(ad.sponsored);
        assert_eq!(ad.impression_id.as_str(), "req-42");
    }

    #[test]
    fn test_interpret_no_fill() {
        let body = response(r#"{"status": "success", "data": {}}"#);
        assert_eq!(
            interpret(body).expect("ok"),
            AdOutcome::NoFill("No ad available at this time".to_string())
        );

        let body = response(r#"{"status": "success", "message": "frequency cap"}"#);
        assert_eq!(
            interpret(body).expect("ok"),
            AdOutcome::NoFill("frequency cap".to_string())
        );
    }

    #[test]
    fn test_interpret_error_status() {
        let body = response(r#"{"status": "error", "message": "bad key"}"#);
        let err = interpret(body).unwrap_err();
        assert!(matches!(err, ThradsError::Rejected(ref m) if m == "bad key"));
    }

    #[test]
    fn test_ad_request_deserializes_camel_case() {
        let request: AdRequest = serde_json::from_str(
            r#"{"userId":"u1","chatId":"c1","userMessage":"hi","botResponse":"hello","conversationTurn":3}"#,
        )
        .expect("deserialize");
        assert_eq!(request.conversation_turn, 3);
        assert_eq!(request.bot_response, "hello");
    }
}
