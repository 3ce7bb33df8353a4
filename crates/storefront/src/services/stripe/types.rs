//! Stripe REST wire types and their conversion into catalog types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use lyceum_core::stripe_match::{StripeProduct, StripeProductMetadata};
use lyceum_core::{CartItem, Price};

/// A page of a Stripe list endpoint.
#[derive(Debug, Deserialize)]
pub struct List<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

/// A Stripe product as returned by `/v1/products`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawProduct {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub default_price: Option<DefaultPrice>,
}

/// `default_price` is an ID unless the request expanded it.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DefaultPrice {
    Expanded(RawPrice),
    Id(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPrice {
    pub id: String,
    /// Minor units; absent for custom-amount prices.
    #[serde(default)]
    pub unit_amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl From<RawProduct> for StripeProduct {
    fn from(raw: RawProduct) -> Self {
        let (price, price_id) = match raw.default_price {
            Some(DefaultPrice::Expanded(p)) => (
                p.unit_amount.map_or_else(Price::zero, Price::from_minor_units),
                p.id,
            ),
            Some(DefaultPrice::Id(_)) | None => (Price::zero(), String::new()),
        };
        let field = |key: &str| raw.metadata.get(key).cloned().unwrap_or_default();

        Self {
            metadata: StripeProductMetadata {
                mushroom_id: field("mushroom_id"),
                category: field("category"),
                benefits: field("benefits"),
                product_id: field("product_id"),
            },
            id: raw.id,
            name: raw.name,
            description: raw.description.unwrap_or_default(),
            price,
            price_id,
            image: raw.images.into_iter().next().unwrap_or_default(),
        }
    }
}

/// A created checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted checkout page; absent for embedded sessions.
    #[serde(default)]
    pub url: Option<String>,
}

/// Newly created price.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedPrice {
    pub id: String,
}

/// Error body returned by Stripe.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// Entry in the `cartItems` checkout metadata.
#[derive(Debug, Serialize)]
pub struct CartMetadataItem<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub quantity: u32,
    #[serde(with = "lyceum_core::types::price::as_number")]
    pub price: Price,
}

impl<'a> From<&'a CartItem> for CartMetadataItem<'a> {
    fn from(item: &'a CartItem) -> Self {
        Self {
            id: item.product.id.as_str(),
            name: &item.product.name,
            quantity: item.quantity,
            price: item.product.price,
        }
    }
}

/// Product fields for `POST /v1/products`.
#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub images: Vec<String>,
    pub metadata: StripeProductMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expanded_product_converts() {
        let json = r#"{
            "id": "prod_123",
            "object": "product",
            "name": "Reishi Immune Calm",
            "description": null,
            "images": ["https://files.stripe.com/reishi.png"],
            "metadata": {"product_id": "reishi-immune-calm", "category": "immunity"},
            "default_price": {"id": "price_9", "unit_amount": 3499, "currency": "usd"}
        }"#;
        let raw: RawProduct = serde_json::from_str(json).expect("deserialize");
        let product = StripeProduct::from(raw);

        assert_eq!(product.price.display(), "$34.99");
        assert_eq!(product.price_id, "price_9");
        assert_eq!(product.description, "");
        assert_eq!(product.image, "https://files.stripe.com/reishi.png");
        assert_eq!(product.metadata.product_id, "reishi-immune-calm");
        assert_eq!(product.metadata.mushroom_id, "");
    }

    #[test]
    fn test_unexpanded_or_missing_price_is_zero() {
        let json = r#"{"id": "prod_1", "name": "Enoki", "default_price": "price_1"}"#;
        let product = StripeProduct::from(serde_json::from_str::<RawProduct>(json).expect("json"));
        assert!(product.price.is_zero());
        assert_eq!(product.price_id, "");
        assert_eq!(product.image, "");

        let json = r#"{"id": "prod_2", "name": "Chaga", "default_price": null}"#;
        let product = StripeProduct::from(serde_json::from_str::<RawProduct>(json).expect("json"));
        assert!(product.price.is_zero());
    }
}
