//! Stripe REST client: product catalog and checkout sessions.
//!
//! Requests are form-encoded and authenticated with the secret key.
//! The active product list is cached for 5 minutes using `moka`.

mod types;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{debug, instrument};

use lyceum_core::CartItem;
use lyceum_core::stripe_match::StripeProduct;

use crate::config::StripeConfig;

pub use types::{CheckoutSession, NewProduct};
use types::{CartMetadataItem, CreatedPrice, ErrorResponse, List, RawProduct};

const PRODUCTS_CACHE_KEY: &str = "products:active";
const PAGE_SIZE: &str = "100";

/// Errors that can occur when interacting with the Stripe API.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe returned an error response.
    #[error("API error ({status}, {error_type}): {message}")]
    Api {
        status: u16,
        error_type: String,
        message: String,
    },

    /// Rate limited by the API.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Checkout requested with no cart lines.
    #[error("no items in cart")]
    EmptyCart,

    /// A cart line has a price that cannot be expressed in cents.
    #[error("invalid price for {0}")]
    InvalidPrice(String),

    /// Failed to parse response or build a request.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Where checkout should send the buyer afterwards. `None` uses the storefront pages.
#[derive(Debug, Clone, Default)]
pub struct CheckoutUrls {
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

/// Client for the Stripe REST API.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    api_base: String,
    currency: String,
    cache: Cache<String, Arc<Vec<StripeProduct>>>,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, StripeError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth = HeaderValue::from_str(&auth_value)
            .map_err(|e| StripeError::Parse(format!("Invalid API key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Ok(Self {
            inner: Arc::new(StripeClientInner {
                client,
                api_base: config.api_base.trim_end_matches('/').to_string(),
                currency: config.currency.clone(),
                cache,
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.api_base)
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// All active products with their default price expanded.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Arc<Vec<StripeProduct>>, StripeError> {
        if let Some(products) = self.inner.cache.get(PRODUCTS_CACHE_KEY).await {
            debug!("Cache hit for Stripe products");
            return Ok(products);
        }

        let mut products = Vec::new();
        let mut starting_after: Option<String> = None;
        loop {
            let mut query = vec![
                ("active", "true".to_string()),
                ("expand[]", "data.default_price".to_string()),
                ("limit", PAGE_SIZE.to_string()),
            ];
            if let Some(cursor) = &starting_after {
                query.push(("starting_after", cursor.clone()));
            }

            let response = self
                .inner
                .client
                .get(self.url("/v1/products"))
                .query(&query)
                .send()
                .await?;
            let page: List<RawProduct> = parse_response(response).await?;

            starting_after = page.data.last().map(|p| p.id.clone());
            let has_more = page.has_more;
            products.extend(page.data.into_iter().map(StripeProduct::from));
            if !has_more || starting_after.is_none() {
                break;
            }
        }

        debug!(count = products.len(), "Fetched Stripe products");
        let products = Arc::new(products);
        self.inner
            .cache
            .insert(PRODUCTS_CACHE_KEY.to_string(), Arc::clone(&products))
            .await;
        Ok(products)
    }

    /// A single product by Stripe ID. `Ok(None)` when Stripe returns 404.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails for any other reason.
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: &str) -> Result<Option<StripeProduct>, StripeError> {
        let response = self
            .inner
            .client
            .get(self.url(&format!("/v1/products/{id}")))
            .query(&[("expand[]", "default_price")])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let raw: RawProduct = parse_response(response).await?;
        Ok(Some(raw.into()))
    }

    /// The active product whose `metadata.mushroom_id` equals `mushroom_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the product list cannot be fetched.
    pub async fn product_by_mushroom_id(
        &self,
        mushroom_id: &str,
    ) -> Result<Option<StripeProduct>, StripeError> {
        let products = self.list_products().await?;
        Ok(products
            .iter()
            .find(|p| p.metadata.mushroom_id == mushroom_id)
            .cloned())
    }

    /// Create a product carrying the catalog metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if Stripe rejects the product.
    #[instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create_product(&self, product: &NewProduct) -> Result<StripeProduct, StripeError> {
        let mut form = vec![("name".to_string(), product.name.clone())];
        if !product.description.is_empty() {
            form.push(("description".to_string(), product.description.clone()));
        }
        for (i, image) in product.images.iter().enumerate() {
            form.push((format!("images[{i}]"), image.clone()));
        }
        let meta = &product.metadata;
        for (key, value) in [
            ("product_id", &meta.product_id),
            ("mushroom_id", &meta.mushroom_id),
            ("category", &meta.category),
            ("benefits", &meta.benefits),
        ] {
            if !value.is_empty() {
                form.push((format!("metadata[{key}]"), value.clone()));
            }
        }

        let raw: RawProduct = self.post_form("/v1/products", &form).await?;
        self.inner.cache.invalidate(PRODUCTS_CACHE_KEY).await;
        Ok(raw.into())
    }

    /// Create a one-off price for a product and return its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if Stripe rejects the price.
    #[instrument(skip(self))]
    pub async fn create_price(&self, product_id: &str, unit_amount: i64) -> Result<String, StripeError> {
        let form = [
            ("product".to_string(), product_id.to_string()),
            ("unit_amount".to_string(), unit_amount.to_string()),
            ("currency".to_string(), self.inner.currency.clone()),
        ];
        let price: CreatedPrice = self.post_form("/v1/prices", &form).await?;
        Ok(price.id)
    }

    /// Make `price_id` the product's default price.
    ///
    /// # Errors
    ///
    /// Returns an error if Stripe rejects the update.
    #[instrument(skip(self))]
    pub async fn set_default_price(&self, product_id: &str, price_id: &str) -> Result<(), StripeError> {
        let form = [("default_price".to_string(), price_id.to_string())];
        let _: RawProduct = self
            .post_form(&format!("/v1/products/{product_id}"), &form)
            .await?;
        self.inner.cache.invalidate(PRODUCTS_CACHE_KEY).await;
        Ok(())
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Create a hosted checkout session for the cart lines.
    ///
    /// `base_url` fills in the default success and cancel pages.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::EmptyCart` for an empty cart, or an error if
    /// Stripe rejects the session.
    #[instrument(skip(self, items, urls), fields(lines = items.len()))]
    pub async fn create_checkout_session(
        &self,
        items: &[CartItem],
        urls: &CheckoutUrls,
        base_url: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let form = self.checkout_form(items, urls, base_url)?;
        let session: CheckoutSession = self.post_form("/v1/checkout/sessions", &form).await?;
        tracing::info!(session_id = %session.id, "Created checkout session");
        Ok(session)
    }

    fn checkout_form(
        &self,
        items: &[CartItem],
        urls: &CheckoutUrls,
        base_url: &str,
    ) -> Result<Vec<(String, String)>, StripeError> {
        if items.is_empty() {
            return Err(StripeError::EmptyCart);
        }

        let base_url = base_url.trim_end_matches('/');
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            (
                "success_url".to_string(),
                urls.success_url.clone().unwrap_or_else(|| {
                    format!("{base_url}/success?session_id={{CHECKOUT_SESSION_ID}}")
                }),
            ),
            (
                "cancel_url".to_string(),
                urls.cancel_url
                    .clone()
                    .unwrap_or_else(|| format!("{base_url}/checkout")),
            ),
        ];

        for (i, item) in items.iter().enumerate() {
            let product = &item.product;
            let unit_amount = product
                .price
                .to_minor_units()
                .ok_or_else(|| StripeError::InvalidPrice(product.name.clone()))?;
            let prefix = format!("line_items[{i}]");

            form.push((format!("{prefix}[price_data][currency]"), self.inner.currency.clone()));
            form.push((format!("{prefix}[price_data][unit_amount]"), unit_amount.to_string()));
            form.push((format!("{prefix}[price_data][product_data][name]"), product.name.clone()));
            // Stripe rejects empty strings for optional fields
            if !product.description.is_empty() {
                form.push((
                    format!("{prefix}[price_data][product_data][description]"),
                    product.description.clone(),
                ));
            }
            if product.image.starts_with("http") {
                form.push((
                    format!("{prefix}[price_data][product_data][images][0]"),
                    product.image.clone(),
                ));
            }
            form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
        }

        let metadata: Vec<CartMetadataItem<'_>> = items.iter().map(CartMetadataItem::from).collect();
        let metadata = serde_json::to_string(&metadata)
            .map_err(|e| StripeError::Parse(format!("Failed to encode cart metadata: {e}")))?;
        form.push(("metadata[cartItems]".to_string(), metadata));

        Ok(form)
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, StripeError> {
        let response = self
            .inner
            .client
            .post(self.url(path))
            .form(form)
            .send()
            .await?;
        parse_response(response).await
    }
}

/// Decode a success body or turn the response into a `StripeError`.
async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, StripeError> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1);
        return Err(StripeError::RateLimited(retry_after));
    }

    let body = response.text().await?;

    if !status.is_success() {
        tracing::error!(
            status = %status,
            body = %body.chars().take(500).collect::<String>(),
            "Stripe API returned non-success status"
        );
        return Err(match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(err) => StripeError::Api {
                status: status.as_u16(),
                error_type: err.error.code.unwrap_or(err.error.error_type),
                message: err.error.message,
            },
            Err(_) => StripeError::Api {
                status: status.as_u16(),
                error_type: "unknown".to_string(),
                message: body.chars().take(200).collect(),
            },
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %body.chars().take(500).collect::<String>(),
            "Failed to parse Stripe response"
        );
        StripeError::Parse(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use lyceum_core::{Price, Product};

    use super::*;

    fn client() -> StripeClient {
        StripeClient::new(&StripeConfig {
            secret_key: SecretString::from("sk_test_51Nq8ZbK2mXy7TgW4pLr9VcJd"),
            publishable_key: None,
            api_base: "http://127.0.0.1:1".to_string(),
            currency: "usd".to_string(),
        })
        .expect("client")
    }

    fn value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_checkout_form_rejects_empty_cart() {
        let err = client()
            .checkout_form(&[], &CheckoutUrls::default(), "https://lyceum.shop")
            .unwrap_err();
        assert!(matches!(err, StripeError::EmptyCart));
    }

    #[test]
    fn test_checkout_form_line_items_and_defaults() {
        let mut product = Product::basic("reishi", "Reishi", Price::from_minor_units(3499));
        product.description = "Calm and immunity".to_string();
        let items = vec![CartItem { product, quantity: 2 }];

        let form = client()
            .checkout_form(&items, &CheckoutUrls::default(), "https://lyceum.shop/")
            .expect("form");

        assert_eq!(value(&form, "mode"), Some("payment"));
        assert_eq!(value(&form, "payment_method_types[0]"), Some("card"));
        assert_eq!(
            value(&form, "success_url"),
            Some("https://lyceum.shop/success?session_id={CHECKOUT_SESSION_ID}")
        );
        assert_eq!(value(&form, "cancel_url"), Some("https://lyceum.shop/checkout"));
        assert_eq!(value(&form, "line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(value(&form, "line_items[0][price_data][unit_amount]"), Some("3499"));
        assert_eq!(value(&form, "line_items[0][quantity]"), Some("2"));
        assert_eq!(
            value(&form, "line_items[0][price_data][product_data][description]"),
            Some("Calm and immunity")
        );
        assert_eq!(
            value(&form, "metadata[cartItems]"),
            Some(r#"[{"id":"reishi","name":"Reishi","quantity":2,"price":34.99}]"#)
        );
    }

    #[test]
    fn test_checkout_form_honors_explicit_urls() {
        let items = vec![CartItem {
            product: Product::basic("chaga", "Chaga", Price::from_minor_units(3299)),
            quantity: 1,
        }];
        let urls = CheckoutUrls {
            success_url: Some("https://example.test/thanks".to_string()),
            cancel_url: Some("https://example.test/back".to_string()),
        };
        let form = client()
            .checkout_form(&items, &urls, "https://lyceum.shop")
            .expect("form");
        assert_eq!(value(&form, "success_url"), Some("https://example.test/thanks"));
        assert_eq!(value(&form, "cancel_url"), Some("https://example.test/back"));
    }

    #[test]
    fn test_stripe_client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<StripeClient>();
    }
}
