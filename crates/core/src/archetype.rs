//! Archetype bundles: sets of mushrooms that unlock an order discount.
//!
//! Completion uses exact (case-insensitive) product names, while the
//! promotion suggestion uses substring matching. A cart holding
//! "Reishi Extract" therefore counts towards a suggestion but never
//! completes a bundle on its own.

use crate::cart::Cart;
use crate::types::Price;

/// Discount applied to the whole order when any archetype is completed.
pub const BUNDLE_DISCOUNT_PERCENT: u32 = 20;

/// Per-item price quoted in the promotion banner.
pub const PROMOTION_ITEM_PRICE_CENTS: i64 = 2999;

/// A marketing bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Archetype {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
    pub required: &'static [&'static str],
    pub discount_percent: u32,
}

pub const ARCHETYPES: [Archetype; 6] = [
    Archetype {
        id: "mentalist",
        name: "Mentalist",
        icon: "/static/images/icons/brain.png",
        description: "Cognitive Power & Focus",
        required: &["Lion's Mane", "Cordyceps", "Reishi"],
        discount_percent: BUNDLE_DISCOUNT_PERCENT,
    },
    Archetype {
        id: "guardian",
        name: "Guardian",
        icon: "/static/images/icons/shield.png",
        description: "Immunity & Wellness Protection",
        required: &["Reishi", "Turkey Tail", "Chaga"],
        discount_percent: BUNDLE_DISCOUNT_PERCENT,
    },
    Archetype {
        id: "athlete",
        name: "Athlete",
        icon: "/static/images/icons/lightning.png",
        description: "Energy, Vitality & Fitness",
        required: &["Cordyceps", "King Trumpet", "Maitake"],
        discount_percent: BUNDLE_DISCOUNT_PERCENT,
    },
    Archetype {
        id: "radiant",
        name: "Radiant",
        icon: "/static/images/icons/lotus.png",
        description: "Beauty, Skin & Longevity",
        required: &["Tremella", "Chaga", "Shiitake"],
        discount_percent: BUNDLE_DISCOUNT_PERCENT,
    },
    Archetype {
        id: "zen_seeker",
        name: "Zen Seeker",
        icon: "/static/images/icons/spiral.png",
        description: "Calm, Stress Relief & Sleep",
        required: &["Reishi", "Poria", "Maitake"],
        discount_percent: BUNDLE_DISCOUNT_PERCENT,
    },
    Archetype {
        id: "gut_guru",
        name: "Gut Guru",
        icon: "/static/images/icons/drop.png",
        description: "Digestive & Gut Health",
        required: &["Shiitake", "Turkey Tail", "Enoki"],
        discount_percent: BUNDLE_DISCOUNT_PERCENT,
    },
];

/// Look up an archetype by its ID.
#[must_use]
pub fn find(id: &str) -> Option<&'static Archetype> {
    ARCHETYPES.iter().find(|archetype| archetype.id == id)
}

/// Archetypes whose required mushrooms are all in the cart by exact name.
#[must_use]
pub fn completed(cart: &Cart) -> Vec<&'static Archetype> {
    let names: Vec<String> = cart.product_names().map(str::to_lowercase).collect();
    ARCHETYPES
        .iter()
        .filter(|archetype| {
            archetype
                .required
                .iter()
                .all(|required| names.contains(&required.to_lowercase()))
        })
        .collect()
}

/// The bundle closest to completion, as shown in the promotion banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSuggestion {
    pub archetype: &'static Archetype,
    pub missing: Vec<&'static str>,
    pub owned: usize,
}

impl BundleSuggestion {
    /// Fraction of required mushrooms already in the cart.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> f64 {
        self.owned as f64 / self.archetype.required.len() as f64
    }

    /// Progress as a whole percentage, for progress bars.
    #[must_use]
    pub fn progress_percent(&self) -> usize {
        self.owned * 100 / self.archetype.required.len().max(1)
    }

    #[must_use]
    pub fn additional_cost(&self) -> Price {
        additional_cost(&self.missing)
    }

    /// Call-to-action sentence naming the missing items.
    #[must_use]
    pub fn call_to_action(&self) -> String {
        format!(
            "Add {} to unlock the {} achievement",
            format_product_list(&self.missing),
            self.archetype.name
        )
    }
}

/// Pick the archetype with the strictly highest progress among those with at
/// least one mushroom owned and at least one missing. Ties keep the earlier
/// archetype.
#[must_use]
pub fn best_suggestion(cart: &Cart) -> Option<BundleSuggestion> {
    let names: Vec<String> = cart.product_names().map(str::to_lowercase).collect();
    let mut best: Option<BundleSuggestion> = None;

    for archetype in &ARCHETYPES {
        let (owned, missing): (Vec<&'static str>, Vec<&'static str>) =
            archetype.required.iter().copied().partition(|required| {
                let required = required.to_lowercase();
                names.iter().any(|name| name.contains(&required))
            });

        if owned.is_empty() || missing.is_empty() {
            continue;
        }

        let beats_best = best.as_ref().is_none_or(|current| {
            owned.len() * current.archetype.required.len()
                > current.owned * archetype.required.len()
        });
        if beats_best {
            best = Some(BundleSuggestion {
                archetype,
                missing,
                owned: owned.len(),
            });
        }
    }

    best
}

/// Order discount: the largest discount among completed archetypes.
#[must_use]
pub fn discount(total: Price, completed: &[&Archetype]) -> Price {
    completed
        .iter()
        .map(|archetype| archetype.discount_percent)
        .max()
        .map_or_else(Price::zero, |pct| total.percent(pct).round_cents())
}

/// Join names as `"A"`, `"A" and "B"` or `"A", "B" and "C"`.
#[must_use]
pub fn format_product_list(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [only] => format!("\"{only}\""),
        [init @ .., last] => {
            let head = init
                .iter()
                .map(|name| format!("\"{name}\""))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{head} and \"{last}\"")
        }
    }
}

/// Promotion price for the missing items.
#[must_use]
pub fn additional_cost(missing: &[&str]) -> Price {
    Price::from_minor_units(PROMOTION_ITEM_PRICE_CENTS)
        * u32::try_from(missing.len()).unwrap_or(u32::MAX)
}

/// A bundle item used when the mushroom has no product row in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleItem {
    pub key: &'static str,
    pub id: &'static str,
    pub name: &'static str,
    pub price_cents: i64,
}

impl BundleItem {
    #[must_use]
    pub fn price(&self) -> Price {
        Price::from_minor_units(self.price_cents)
    }
}

pub const BUNDLE_CATALOG: [BundleItem; 11] = [
    BundleItem { key: "lion's mane", id: "lions-mane", name: "Lion's Mane", price_cents: 2999 },
    BundleItem { key: "cordyceps", id: "cordyceps", name: "Cordyceps", price_cents: 3999 },
    BundleItem { key: "reishi", id: "reishi", name: "Reishi", price_cents: 3499 },
    BundleItem { key: "turkey tail", id: "turkey-tail", name: "Turkey Tail", price_cents: 2799 },
    BundleItem { key: "chaga", id: "chaga", name: "Chaga", price_cents: 3299 },
    BundleItem { key: "king trumpet", id: "king-trumpet", name: "King Trumpet", price_cents: 2999 },
    BundleItem { key: "maitake", id: "maitake", name: "Maitake", price_cents: 3199 },
    BundleItem { key: "tremella", id: "tremella", name: "Tremella", price_cents: 2899 },
    BundleItem { key: "shiitake", id: "shiitake", name: "Shiitake", price_cents: 2699 },
    BundleItem { key: "poria", id: "poria", name: "Poria", price_cents: 3099 },
    BundleItem { key: "enoki", id: "enoki", name: "Enoki", price_cents: 2599 },
];

/// Look up a fallback bundle item by mushroom name, case-insensitively.
#[must_use]
pub fn bundle_item(name: &str) -> Option<&'static BundleItem> {
    let key = name.trim().to_lowercase();
    BUNDLE_CATALOG.iter().find(|item| item.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::product;

    fn cart_of(names: &[&str]) -> Cart {
        let mut cart = Cart::new();
        for name in names {
            cart.add(product(name, 2999));
        }
        cart
    }

    #[test]
    fn test_completed_requires_exact_names() {
        let cart = cart_of(&["Lion's Mane", "cordyceps", "REISHI"]);
        let done: Vec<_> = completed(&cart).iter().map(|a| a.id).collect();
        assert_eq!(done, vec!["mentalist"]);

        let partial = cart_of(&["Lion's Mane Extract", "Cordyceps", "Reishi"]);
        assert!(completed(&partial).is_empty());
    }

    #[test]
    fn test_best_suggestion_picks_highest_progress() {
        let cart = cart_of(&["Reishi", "Turkey Tail"]);
        let suggestion = best_suggestion(&cart).expect("suggestion");
        assert_eq!(suggestion.archetype.id, "guardian");
        assert_eq!(suggestion.missing, vec!["Chaga"]);
        assert_eq!(suggestion.progress_percent(), 66);
        assert!((suggestion.progress() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_best_suggestion_ties_keep_first_archetype() {
        let cart = cart_of(&["Reishi Extract"]);
        let suggestion = best_suggestion(&cart).expect("suggestion");
        assert_eq!(suggestion.archetype.id, "mentalist");
        assert_eq!(suggestion.missing, vec!["Lion's Mane", "Cordyceps"]);
    }

    #[test]
    fn test_best_suggestion_skips_complete_and_empty() {
        assert!(best_suggestion(&Cart::new()).is_none());
        assert!(best_suggestion(&cart_of(&["Oyster"])).is_none());

        let cart = cart_of(&["Shiitake", "Turkey Tail", "Enoki"]);
        let suggestion = best_suggestion(&cart).expect("suggestion");
        assert_ne!(suggestion.archetype.id, "gut_guru");
    }

    #[test]
    fn test_discount_is_twenty_percent_when_completed() {
        let cart = cart_of(&["Reishi", "Poria", "Maitake"]);
        let done = completed(&cart);
        let total = cart.total();
        let off = discount(total, &done);
        assert_eq!(off.display(), "$17.99");
        assert_eq!((total - off).display(), "$71.98");

        assert!(discount(total, &[]).is_zero());
    }

    #[test]
    fn test_format_product_list() {
        assert_eq!(format_product_list(&[]), "");
        assert_eq!(format_product_list(&["Chaga"]), "\"Chaga\"");
        assert_eq!(
            format_product_list(&["Chaga", "Reishi"]),
            "\"Chaga\" and \"Reishi\""
        );
        assert_eq!(
            format_product_list(&["Chaga", "Reishi", "Poria"]),
            "\"Chaga\", \"Reishi\" and \"Poria\""
        );
    }

    #[test]
    fn test_additional_cost_and_bundle_items() {
        assert_eq!(additional_cost(&["Chaga", "Poria"]).display(), "$59.98");
        let item = bundle_item("Turkey Tail").expect("known item");
        assert_eq!(item.id, "turkey-tail");
        assert_eq!(item.price().display(), "$27.99");
        assert!(bundle_item("Oyster").is_none());
    }
}
