//! Unified error handling with Sentry integration.
//!
//! Page handlers return `Result<T, AppError>` (plain status + message).
//! JSON API handlers return `Result<T, ApiError>` (`{"error": "..."}`).
//! Both capture server errors to Sentry before responding.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{OpenAiError, StripeError, ThradsError};

/// Application-level error type for the storefront pages.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Stripe API operation failed.
    #[error("Stripe error: {0}")]
    Stripe(#[from] StripeError),

    /// `OpenAI` API operation failed.
    #[error("OpenAI error: {0}")]
    OpenAi(#[from] OpenAiError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Stripe(StripeError::EmptyCart | StripeError::InvalidPrice(_))
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Stripe(_) | Self::OpenAi(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Stripe(StripeError::EmptyCart) => "Your cart is empty".to_string(),
            Self::Stripe(StripeError::InvalidPrice(_)) => self.to_string(),
            Self::Stripe(_) | Self::OpenAi(_) => "External service error".to_string(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Error type for the JSON API, rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request body was missing or malformed.
    #[error("{0}")]
    BadRequest(String),

    /// An integration is not configured (e.g. no API key).
    #[error("{0}")]
    NotConfigured(&'static str),

    /// Checkout session creation failed.
    #[error("Stripe error: {0}")]
    Stripe(#[from] StripeError),

    /// Listing the Stripe catalog failed.
    #[error("Stripe catalog error: {0}")]
    StripeCatalog(StripeError),

    #[error("OpenAI error: {0}")]
    OpenAi(#[from] OpenAiError),

    #[error("Thrads error: {0}")]
    Thrads(#[from] ThradsError),
}

impl ApiError {
    /// HTTP status and client-facing message.
    #[must_use]
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            Self::NotConfigured(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, (*message).to_string())
            }
            Self::Stripe(StripeError::EmptyCart) => {
                (StatusCode::BAD_REQUEST, "No items in cart".to_string())
            }
            Self::Stripe(StripeError::InvalidPrice(name)) => {
                (StatusCode::BAD_REQUEST, format!("Invalid price for {name}"))
            }
            Self::Stripe(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create checkout session".to_string(),
            ),
            Self::StripeCatalog(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch Stripe products".to_string(),
            ),
            Self::OpenAi(err) => openai_status(err),
            Self::Thrads(ThradsError::Api(status)) => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                format!("API error: {status}"),
            ),
            Self::Thrads(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch ad".to_string(),
            ),
        }
    }
}

/// Status and message for an `OpenAI` failure, keyed on the API error code.
fn openai_status(err: &OpenAiError) -> (StatusCode, String) {
    match err.code() {
        Some("rate_limit_exceeded") => (
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded. Please try again in a moment.".to_string(),
        ),
        Some("insufficient_quota") => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Service temporarily unavailable. Please try again later.".to_string(),
        ),
        Some("invalid_api_key") => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Chat service configuration error.".to_string(),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "An error occurred while processing your request.".to_string(),
        ),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "API error"
            );
        } else {
            tracing::warn!(error = %self, status = %status, "API request rejected");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Add a breadcrumb for visitor actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "reishi")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16, code: &str) -> OpenAiError {
        OpenAiError::Api {
            status,
            code: code.to_string(),
            message: "upstream".to_string(),
        }
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(get_status(AppError::NotFound("x".to_string())), StatusCode::NOT_FOUND);
        assert_eq!(get_status(AppError::BadRequest("x".to_string())), StatusCode::BAD_REQUEST);
        assert_eq!(get_status(AppError::Stripe(StripeError::EmptyCart)), StatusCode::BAD_REQUEST);
        assert_eq!(
            get_status(AppError::Stripe(StripeError::RateLimited(1))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Internal("x".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_empty_cart_maps_to_no_items_in_cart() {
        let (status, message) = ApiError::Stripe(StripeError::EmptyCart).status_and_message();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "No items in cart");
    }

    #[test]
    fn test_openai_error_codes_map_to_statuses() {
        let cases = [
            ("rate_limit_exceeded", StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded. Please try again in a moment."),
            ("insufficient_quota", StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable. Please try again later."),
            ("invalid_api_key", StatusCode::INTERNAL_SERVER_ERROR, "Chat service configuration error."),
            ("server_error", StatusCode::INTERNAL_SERVER_ERROR, "An error occurred while processing your request."),
        ];
        for (code, status, message) in cases {
            let (got_status, got_message) = ApiError::OpenAi(api_error(400, code)).status_and_message();
            assert_eq!(got_status, status, "{code}");
            assert_eq!(got_message, message, "{code}");
        }
    }

    #[test]
    fn test_stripe_errors_depend_on_operation() {
        let (_, checkout) =
            ApiError::Stripe(StripeError::RateLimited(2)).status_and_message();
        let (_, catalog) =
            ApiError::StripeCatalog(StripeError::RateLimited(2)).status_and_message();
        assert_eq!(checkout, "Failed to create checkout session");
        assert_eq!(catalog, "Failed to fetch Stripe products");
    }

    #[test]
    fn test_invalid_price_is_client_error() {
        let err = StripeError::InvalidPrice("Chaga Shield".to_string());
        let (status, message) = ApiError::Stripe(err).status_and_message();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "Invalid price for Chaga Shield");

        let err = AppError::Stripe(StripeError::InvalidPrice("Chaga Shield".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_thrads_status_passes_through() {
        let (status, message) = ApiError::Thrads(ThradsError::Api(403)).status_and_message();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(message, "API error: 403");
    }

    #[test]
    fn test_not_configured_message() {
        let (status, message) =
            ApiError::NotConfigured("Chat service not configured").status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Chat service not configured");
    }
}
