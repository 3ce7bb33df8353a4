//! Catalog models: mushrooms, database products and the display product.
//!
//! `Mushroom` and `DatabaseProduct` mirror the Supabase rows. `Product` is
//! what the storefront renders and what the cart holds.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{MushroomId, Price, ProductId, price};

/// Stock photo used when neither the product nor its mushroom has an image.
pub const DEFAULT_PRODUCT_IMAGE: &str =
    "https://images.pexels.com/photos/8142034/pexels-photo-8142034.jpeg?auto=compress&cs=tinysrgb&w=800";

/// Price of a product synthesized from a mushroom with no product row.
pub const DEFAULT_MUSHROOM_PRICE_CENTS: i64 = 2999;

pub const DEFAULT_CATEGORY: &str = "supplement";

/// A mushroom species from the `mushrooms` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Mushroom {
    pub id: MushroomId,
    pub name: String,
    pub scientific_name: String,
    pub region_medicine: String,
    pub expected_effects: Vec<String>,
    pub story_behind_consumption: String,
    pub impact_on_life: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub video_url: Option<String>,
    pub photo_url: Option<String>,
}

/// A sellable supplement from the `products` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct DatabaseProduct {
    pub id: ProductId,
    pub name: String,
    pub main_ingredient: String,
    pub format: String,
    pub pills_per_container: i32,
    pub daily_dose: String,
    pub use_instructions: String,
    pub key_benefits: Vec<String>,
    pub short_description: String,
    pub certifications_notes: String,
    pub price: Decimal,
    pub mushroom_id: Option<MushroomId>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Product as rendered by the storefront and held in the cart.
///
/// Serializes with `price` as a plain number so the JSON API accepts the
/// same cart payloads the browser sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(with = "price::as_number")]
    pub price: Price,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(rename = "inStock", default = "default_in_stock")]
    pub in_stock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_ingredient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pills_per_container: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_dose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certifications_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mushroom_id: Option<MushroomId>,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_owned()
}

const fn default_in_stock() -> bool {
    true
}

impl Product {
    /// A minimal product with the storefront defaults filled in.
    #[must_use]
    pub fn basic(id: impl Into<ProductId>, name: impl Into<String>, price: Price) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            image: DEFAULT_PRODUCT_IMAGE.to_owned(),
            video: None,
            description: String::new(),
            benefits: Vec::new(),
            tags: default_tags(),
            category: default_category(),
            in_stock: true,
            main_ingredient: None,
            format: None,
            pills_per_container: None,
            daily_dose: None,
            use_instructions: None,
            certifications_notes: None,
            mushroom_id: None,
        }
    }
}

fn default_tags() -> Vec<String> {
    vec!["Organic".to_owned(), "Premium".to_owned()]
}

impl From<DatabaseProduct> for Product {
    fn from(row: DatabaseProduct) -> Self {
        Self {
            id: row.id,
            name: row.name,
            price: Price::usd(row.price),
            image: row
                .image_url
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| DEFAULT_PRODUCT_IMAGE.to_owned()),
            video: None,
            description: row.short_description,
            benefits: row.key_benefits,
            tags: default_tags(),
            category: default_category(),
            in_stock: true,
            main_ingredient: Some(row.main_ingredient),
            format: Some(row.format),
            pills_per_container: Some(row.pills_per_container),
            daily_dose: Some(row.daily_dose),
            use_instructions: Some(row.use_instructions),
            certifications_notes: Some(row.certifications_notes),
            mushroom_id: row.mushroom_id,
        }
    }
}

/// A mushroom paired with the product sold for it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MushroomProduct {
    pub mushroom: Mushroom,
    pub product: Option<Product>,
}

impl MushroomProduct {
    #[must_use]
    pub const fn new(mushroom: Mushroom, product: Option<Product>) -> Self {
        Self { mushroom, product }
    }

    /// The product shown in the home carousel for this mushroom.
    ///
    /// Uses the linked product when there is one, borrowing the mushroom's
    /// photo and video. Otherwise builds a product from the mushroom itself.
    #[must_use]
    pub fn display_product(&self) -> Product {
        let mushroom = &self.mushroom;
        let photo = mushroom.photo_url.clone().filter(|url| !url.is_empty());

        if let Some(product) = &self.product {
            let mut display = product.clone();
            if display.image.is_empty() || display.image == DEFAULT_PRODUCT_IMAGE {
                display.image = photo.unwrap_or_else(|| DEFAULT_PRODUCT_IMAGE.to_owned());
            }
            display.video.clone_from(&mushroom.video_url);
            return display;
        }

        let tags = if mushroom.expected_effects.is_empty() {
            vec!["Natural".to_owned(), "Organic".to_owned()]
        } else {
            mushroom.expected_effects.iter().take(3).cloned().collect()
        };
        let description = if mushroom.story_behind_consumption.is_empty() {
            "Premium mushroom supplement".to_owned()
        } else {
            mushroom.story_behind_consumption.clone()
        };

        Product {
            id: ProductId::new(mushroom.id.as_str()),
            name: mushroom.name.clone(),
            price: Price::from_minor_units(DEFAULT_MUSHROOM_PRICE_CENTS),
            image: photo.unwrap_or_else(|| DEFAULT_PRODUCT_IMAGE.to_owned()),
            video: mushroom.video_url.clone(),
            description,
            benefits: mushroom.expected_effects.clone(),
            tags,
            category: default_category(),
            in_stock: true,
            main_ingredient: None,
            format: None,
            pills_per_container: None,
            daily_dose: None,
            use_instructions: None,
            certifications_notes: None,
            mushroom_id: Some(mushroom.id.clone()),
        }
    }
}
