//! Matching cart products to Stripe catalog entries.
//!
//! Stripe products are created out of band and carry loose metadata, so a
//! cart product is matched by trying several heuristics in a fixed order.

use serde::{Deserialize, Serialize};

use crate::cart::CartItem;
use crate::catalog::Product;
use crate::types::{Price, price};

/// Stripe product flattened with its default price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StripeProduct {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Major units; zero when the product has no default price.
    #[serde(with = "price::as_number")]
    pub price: Price,
    /// Empty when the product has no default price.
    pub price_id: String,
    pub image: String,
    pub metadata: StripeProductMetadata,
}

/// Metadata keys written by the catalog sync. Missing keys are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripeProductMetadata {
    #[serde(default)]
    pub mushroom_id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub benefits: String,
    #[serde(default)]
    pub product_id: String,
}

/// Which heuristic produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchHeuristic {
    /// `metadata.product_id` equals the cart product ID.
    ProductId,
    /// `metadata.mushroom_id` equals the cart product's mushroom ID.
    MushroomId,
    /// Well-known mushroom name mapped to a `metadata.mushroom_id` key.
    MushroomName,
    /// Slug of the product name equals `metadata.product_id`.
    NameSlug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripeMatch<'a> {
    pub product: &'a StripeProduct,
    pub heuristic: MatchHeuristic,
}

const NAME_KEYS: [(&str, &str); 15] = [
    ("reishi", "reishi"),
    ("lion's mane", "lions_mane"),
    ("lions mane", "lions_mane"),
    ("cordyceps", "cordyceps"),
    ("chaga", "chaga"),
    ("maitake", "maitake"),
    ("shiitake", "shiitake"),
    ("turkey tail", "turkey_tail"),
    ("tremella", "tremella"),
    ("agaricus blazei", "agaricus_blazei"),
    ("poria", "poria"),
    ("king trumpet", "king_trumpet"),
    ("enoki", "enoki"),
    ("mesima", "mesima"),
    ("polyporus", "polyporus"),
];

/// Stripe `mushroom_id` key for a product name, matched exactly after
/// lower-casing.
#[must_use]
pub fn stripe_key_for_name(name: &str) -> Option<&'static str> {
    let name = name.trim().to_lowercase();
    NAME_KEYS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, key)| *key)
}

/// Lower-case, ASCII alphanumerics separated by single hyphens.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if ch != '\'' && !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Find the Stripe product for a cart product, trying each heuristic in order.
#[must_use]
pub fn match_product<'a>(
    product: &Product,
    catalog: &'a [StripeProduct],
) -> Option<StripeMatch<'a>> {
    let id = product.id.as_str();
    find_by(catalog, MatchHeuristic::ProductId, |sp| {
        !sp.metadata.product_id.is_empty() && sp.metadata.product_id == id
    })
    .or_else(|| {
        let mushroom_id = product.mushroom_id.as_ref()?.as_str();
        find_by(catalog, MatchHeuristic::MushroomId, |sp| {
            !sp.metadata.mushroom_id.is_empty() && sp.metadata.mushroom_id == mushroom_id
        })
    })
    .or_else(|| {
        let key = stripe_key_for_name(&product.name)?;
        find_by(catalog, MatchHeuristic::MushroomName, |sp| {
            sp.metadata.mushroom_id == key
        })
    })
    .or_else(|| {
        let slug = slugify(&product.name);
        if slug.is_empty() {
            return None;
        }
        find_by(catalog, MatchHeuristic::NameSlug, |sp| {
            sp.metadata.product_id == slug
        })
    })
}

fn find_by(
    catalog: &[StripeProduct],
    heuristic: MatchHeuristic,
    pred: impl Fn(&StripeProduct) -> bool,
) -> Option<StripeMatch<'_>> {
    catalog
        .iter()
        .find(|candidate| pred(candidate))
        .map(|product| StripeMatch { product, heuristic })
}

/// A checkout line as displayed, preferring Stripe's name, price and image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    pub product_id: String,
    pub name: String,
    pub price: Price,
    pub image: String,
    pub quantity: u32,
    pub matched: Option<MatchHeuristic>,
}

impl DisplayLine {
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price * self.quantity
    }
}

/// Build the checkout display for a cart line and its optional match.
///
/// Empty Stripe fields and a zero Stripe price fall back to the cart product.
#[must_use]
pub fn display_line(item: &CartItem, matched: Option<&StripeMatch<'_>>) -> DisplayLine {
    let product = &item.product;
    let stripe = matched.map(|m| m.product);

    let name = stripe
        .map(|sp| sp.name.as_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(&product.name)
        .to_owned();
    let price = stripe
        .map(|sp| sp.price)
        .filter(|price| !price.is_zero())
        .unwrap_or(product.price);
    let image = stripe
        .map(|sp| sp.image.as_str())
        .filter(|image| !image.is_empty())
        .unwrap_or(&product.image)
        .to_owned();

    DisplayLine {
        product_id: product.id.to_string(),
        name,
        price,
        image,
        quantity: item.quantity,
        matched: matched.map(|m| m.heuristic),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::product;
    use crate::types::MushroomId;

    fn stripe(id: &str, name: &str, cents: i64, mushroom_id: &str, product_id: &str) -> StripeProduct {
        StripeProduct {
            id: id.to_owned(),
            name: name.to_owned(),
            description: String::new(),
            price: Price::from_minor_units(cents),
            price_id: format!("price_{id}"),
            image: format!("https://files.stripe.com/{id}.png"),
            metadata: StripeProductMetadata {
                mushroom_id: mushroom_id.to_owned(),
                product_id: product_id.to_owned(),
                ..StripeProductMetadata::default()
            },
        }
    }

    #[test]
    fn test_product_id_wins_over_other_heuristics() {
        let catalog = vec![
            stripe("prod_a", "Lion's Mane Focus", 2999, "lions_mane", ""),
            stripe("prod_b", "Lion's Mane", 3199, "", "lions-mane"),
        ];
        let mut cart_product = product("Lion's Mane", 2999);
        cart_product.id = "lions-mane".into();

        let m = match_product(&cart_product, &catalog).expect("match");
        assert_eq!(m.product.id, "prod_b");
        assert_eq!(m.heuristic, MatchHeuristic::ProductId);
    }

    #[test]
    fn test_mushroom_id_then_name_table() {
        let catalog = vec![
            stripe("prod_uuid", "Reishi Capsules", 3499, "m-uuid-1", ""),
            stripe("prod_key", "Turkey Tail", 2799, "turkey_tail", ""),
        ];

        let mut reishi = product("Reishi Calm", 3499);
        reishi.mushroom_id = Some(MushroomId::new("m-uuid-1"));
        let m = match_product(&reishi, &catalog).expect("match");
        assert_eq!(m.heuristic, MatchHeuristic::MushroomId);

        let turkey = product("Turkey Tail", 2999);
        let m = match_product(&turkey, &catalog).expect("match");
        assert_eq!(m.product.id, "prod_key");
        assert_eq!(m.heuristic, MatchHeuristic::MushroomName);
    }

    #[test]
    fn test_slug_fallback_and_no_match() {
        let catalog = vec![stripe("prod_s", "Golden Oyster", 2499, "", "golden-oyster")];
        let mut golden = product("Golden Oyster", 2499);
        golden.id = "db-uuid".into();
        let m = match_product(&golden, &catalog).expect("match");
        assert_eq!(m.heuristic, MatchHeuristic::NameSlug);

        assert!(match_product(&product("Enoki", 2599), &catalog).is_none());
    }

    #[test]
    fn test_empty_metadata_never_matches() {
        let catalog = vec![stripe("prod_blank", "Blank", 1000, "", "")];
        let mut p = product("Unknown Blend", 1000);
        p.mushroom_id = Some(MushroomId::new(""));
        assert!(match_product(&p, &catalog).is_none());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Lion's Mane"), "lions-mane");
        assert_eq!(slugify("  Turkey  Tail! "), "turkey-tail");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn test_display_line_prefers_stripe_fields() {
        let catalog = vec![stripe("prod_c", "Cordyceps Energy", 3999, "cordyceps", "")];
        let item = CartItem {
            product: product("Cordyceps", 2999),
            quantity: 2,
        };
        let m = match_product(&item.product, &catalog);
        let line = display_line(&item, m.as_ref());
        assert_eq!(line.name, "Cordyceps Energy");
        assert_eq!(line.price.display(), "$39.99");
        assert_eq!(line.image, "https://files.stripe.com/prod_c.png");
        assert_eq!(line.line_total().display(), "$79.98");
        assert_eq!(line.matched, Some(MatchHeuristic::MushroomName));

        let unmatched = display_line(&item, None);
        assert_eq!(unmatched.name, "Cordyceps");
        assert_eq!(unmatched.price.display(), "$29.99");
        assert_eq!(unmatched.matched, None);
    }
}
