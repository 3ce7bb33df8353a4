//! Error types for the `OpenAI` API client.

use thiserror::Error;

/// Errors that can occur when interacting with the `OpenAI` API.
#[derive(Debug, Error)]
pub enum OpenAiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// `OpenAI` returned an error response.
    #[error("API error ({status}, {code}): {message}")]
    Api {
        status: u16,
        /// `error.code`, falling back to `error.type`.
        code: String,
        message: String,
    },

    /// Failed to parse response.
    #[error("parse error: {0}")]
    Parse(String),

    /// Stream error.
    #[error("stream error: {0}")]
    Stream(String),
}

impl OpenAiError {
    /// The API error code, if the failure came from the API.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// API error response from `OpenAI`.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_deserialization() {
        let json = r#"{
            "error": {
                "message": "You exceeded your current quota",
                "type": "insufficient_quota",
                "param": null,
                "code": "insufficient_quota"
            }
        }"#;

        let response: ApiErrorResponse = serde_json::from_str(json).expect("deserialize");
        assert_eq!(response.error.code.as_deref(), Some("insufficient_quota"));
        assert_eq!(response.error.message, "You exceeded your current quota");
    }

    #[test]
    fn test_code_only_for_api_errors() {
        let err = OpenAiError::Api {
            status: 429,
            code: "rate_limit_exceeded".to_string(),
            message: "slow down".to_string(),
        };
        assert_eq!(err.code(), Some("rate_limit_exceeded"));
        assert_eq!(err.to_string(), "API error (429, rate_limit_exceeded): slow down");
        assert_eq!(OpenAiError::Parse("bad".to_string()).code(), None);
    }
}
