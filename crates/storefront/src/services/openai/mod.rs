//! `OpenAI` chat completions client.
//!
//! Provides both streaming and non-streaming access. Streaming responses are
//! parsed from server-sent events into content deltas.

mod error;
mod types;

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use tracing::instrument;

use crate::config::OpenAiConfig;

pub use error::OpenAiError;
use error::ApiErrorResponse;
pub use types::{ChatResponse, Message, Role, StreamChunk, Usage};
use types::ChatRequest;

/// Content deltas from a streaming completion.
pub type DeltaStream = BoxStream<'static, Result<String, OpenAiError>>;

const MAX_TOKENS: u32 = 500;
const TEMPERATURE: f32 = 0.7;

/// Reply used when the model returns no text.
pub const EMPTY_COMPLETION_REPLY: &str =
    "I apologize, but I'm having trouble responding right now. Please try again.";

/// `OpenAI` API client.
#[derive(Clone)]
pub struct OpenAiClient {
    inner: Arc<OpenAiClientInner>,
}

struct OpenAiClientInner {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OpenAiClient {
    /// Create a new `OpenAI` client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &OpenAiConfig) -> Result<Self, OpenAiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose_secret()))
            .map_err(|e| OpenAiError::Parse(format!("Invalid API key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            inner: Arc::new(OpenAiClientInner {
                client,
                endpoint: format!(
                    "{}/v1/chat/completions",
                    config.api_base.trim_end_matches('/')
                ),
                model: config.model.clone(),
            }),
        })
    }

    /// Model name sent with every request.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.inner.model
    }

    /// Send a chat request and get a complete response.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or returns an error response.
    #[instrument(skip(self, messages), fields(model = %self.inner.model, messages = messages.len()))]
    pub async fn chat(&self, messages: &[Message]) -> Result<ChatResponse, OpenAiError> {
        let request = ChatRequest {
            model: &self.inner.model,
            messages,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            stream: false,
        };

        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_error_status(status, response).await);
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| OpenAiError::Parse(format!("Failed to parse response: {e}")))
    }

    /// Send a chat request and stream back content deltas.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial request fails.
    #[instrument(skip(self, messages), fields(model = %self.inner.model, messages = messages.len()))]
    pub async fn chat_stream(
        &self,
        messages: &[Message],
    ) -> Result<DeltaStream, OpenAiError> {
        let request = ChatRequest {
            model: &self.inner.model,
            messages,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            stream: true,
        };

        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .json(&request)
            .send()
            .await?;

        // Check for error responses before streaming
        let status = response.status();
        if !status.is_success() {
            return Err(handle_error_status(status, response).await);
        }

        Ok(stream! {
            let mut buffer = String::new();
            let mut byte_stream = std::pin::pin!(response.bytes_stream());

            while let Some(chunk_result) = byte_stream.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        let text = match std::str::from_utf8(&chunk) {
                            Ok(t) => t,
                            Err(e) => {
                                yield Err(OpenAiError::Parse(format!("Invalid UTF-8: {e}")));
                                continue;
                            }
                        };

                        buffer.push_str(text);

                        while let Some(event) = extract_sse_event(&mut buffer) {
                            match parse_sse_event(&event) {
                                Some(Ok(chunk)) => {
                                    if let Some(delta) = chunk.delta() {
                                        yield Ok(delta.to_string());
                                    }
                                }
                                Some(Err(e)) => yield Err(e),
                                None => {}
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(OpenAiError::Stream(e.to_string()));
                    }
                }
            }
        }
        .boxed())
    }
}

/// Turn an error status into an `OpenAiError`, keeping the API error code.
async fn handle_error_status(
    status: reqwest::StatusCode,
    response: reqwest::Response,
) -> OpenAiError {
    match response.text().await {
        Ok(body) => {
            tracing::warn!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "OpenAI API returned non-success status"
            );
            if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                let detail = api_error.error;
                OpenAiError::Api {
                    status: status.as_u16(),
                    code: detail
                        .code
                        .or(detail.error_type)
                        .unwrap_or_else(|| "unknown".to_string()),
                    message: detail.message,
                }
            } else {
                OpenAiError::Api {
                    status: status.as_u16(),
                    code: "unknown".to_string(),
                    message: body.chars().take(200).collect(),
                }
            }
        }
        Err(e) => OpenAiError::Http(e),
    }
}

/// Extract a complete SSE event from the buffer.
///
/// Returns `Some(event)` if a complete event was found (and removes it from buffer),
/// or `None` if no complete event is available yet.
fn extract_sse_event(buffer: &mut String) -> Option<String> {
    if buffer.contains('\r') {
        *buffer = buffer.replace("\r\n", "\n");
    }
    buffer.find("\n\n").map(|idx| {
        let event: String = buffer.drain(..idx + 2).collect();
        event.trim_end_matches('\n').to_string()
    })
}

/// Parse an SSE event string into a `StreamChunk`.
///
/// Returns `None` for empty events, comments and the `[DONE]` marker.
fn parse_sse_event(event: &str) -> Option<Result<StreamChunk, OpenAiError>> {
    let data = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .last()?;

    if data == "[DONE]" {
        return None;
    }

    Some(
        serde_json::from_str::<StreamChunk>(data)
            .map_err(|e| OpenAiError::Parse(format!("Failed to parse stream chunk: {e}"))),
    )
}
