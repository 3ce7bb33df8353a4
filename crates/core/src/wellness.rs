//! Wellness categories and the "Your Enhanced Self" scores.

use crate::cart::Cart;

/// Highest score a category can reach.
pub const MAX_CATEGORY_SCORE: u32 = 10;

/// Points each unit in the cart adds to every category its effects touch.
const POINTS_PER_UNIT: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WellnessCategory {
    pub name: &'static str,
    pub icon: &'static str,
    pub effects: &'static [&'static str],
}

pub const CATEGORIES: [WellnessCategory; 7] = [
    WellnessCategory {
        name: "Immunity & Disease Support",
        icon: "/static/images/icons/shield.png",
        effects: &[
            "immunity",
            "immunity boost",
            "immune support",
            "immune regulation",
            "anti-tumor",
            "cancer support",
            "anti-cancer",
        ],
    },
    WellnessCategory {
        name: "Cognitive & Mental Health",
        icon: "/static/images/icons/brain.png",
        effects: &[
            "brain health",
            "focus",
            "memory",
            "neuroprotection",
            "better focus",
            "mental resilience",
            "mental balance",
            "stress relief",
            "stress resilience",
            "calm",
            "sleep",
            "sleep improvement",
            "adaptogen",
        ],
    },
    WellnessCategory {
        name: "Vitality, Energy & Physical Performance",
        icon: "/static/images/icons/lightning.png",
        effects: &[
            "vitality",
            "stamina",
            "energy",
            "endurance",
            "athletic support",
            "muscle recovery support",
            "recovery",
        ],
    },
    WellnessCategory {
        name: "Metabolic, Digestive & Detox",
        icon: "/static/images/icons/drop.png",
        effects: &[
            "metabolic health",
            "metabolism",
            "gut health",
            "digestion",
            "digestive improvement",
            "detoxification",
            "detox",
            "diuretic",
        ],
    },
    WellnessCategory {
        name: "Beauty, Skin & Anti-Aging",
        icon: "/static/images/icons/lotus.png",
        effects: &[
            "skin hydration",
            "beauty",
            "youthfulness",
            "hydration",
            "skin glow",
            "anti-aging",
        ],
    },
    WellnessCategory {
        name: "Cardiovascular & Circulatory Health",
        icon: "/static/images/icons/heart.png",
        effects: &[
            "heart health",
            "cholesterol",
            "cardiovascular health",
            "circulatory and vascular support",
        ],
    },
    WellnessCategory {
        name: "General Wellness & Anti-inflammatory",
        icon: "/static/images/icons/spiral.png",
        effects: &["wellness", "resilience", "anti-inflammatory"],
    },
];

/// First category whose vocabulary overlaps `effect` in either direction.
///
/// Blank effects match nothing.
#[must_use]
pub fn category_for_effect(effect: &str) -> Option<&'static WellnessCategory> {
    let normalized = effect.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    CATEGORIES.iter().find(|category| {
        category
            .effects
            .iter()
            .any(|term| normalized.contains(term) || term.contains(normalized.as_str()))
    })
}

/// Distinct categories touched by a list of effects, in first-seen order.
#[must_use]
pub fn categories_for_effects<S: AsRef<str>>(effects: &[S]) -> Vec<&'static WellnessCategory> {
    let mut found: Vec<&'static WellnessCategory> = Vec::new();
    for category in effects
        .iter()
        .filter_map(|effect| category_for_effect(effect.as_ref()))
    {
        if !found.iter().any(|seen| seen.name == category.name) {
            found.push(category);
        }
    }
    found
}

/// Effects attributed to a cart product, keyed on its name.
#[must_use]
pub fn mushroom_effects(name: &str) -> &'static [&'static str] {
    let name = name.to_lowercase();
    if name.contains("reishi") {
        &["immunity", "stress relief", "sleep"]
    } else if name.contains("lion's mane") {
        &["focus", "memory", "brain health"]
    } else if name.contains("cordyceps") {
        &["energy", "stamina", "vitality"]
    } else if name.contains("chaga") {
        &["immunity", "anti-inflammatory"]
    } else if name.contains("turkey tail") {
        &["immunity", "gut health"]
    } else if name.contains("maitake") {
        &["metabolic health", "immunity"]
    } else if name.contains("shiitake") {
        &["immunity", "cardiovascular health"]
    } else if name.contains("oyster") {
        &["cholesterol", "anti-inflammatory"]
    } else {
        &["wellness", "anti-inflammatory"]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryScore {
    pub category: &'static WellnessCategory,
    pub score: u32,
    pub max_score: u32,
}

impl CategoryScore {
    /// Bar width as a percentage of the maximum.
    #[must_use]
    pub const fn percent(&self) -> u32 {
        if self.max_score == 0 {
            0
        } else {
            self.score * 100 / self.max_score
        }
    }
}

/// Score every category from the cart contents; zero scores are omitted.
#[must_use]
pub fn category_scores(cart: &Cart) -> Vec<CategoryScore> {
    let mut scores = [0u32; CATEGORIES.len()];

    for item in cart.items() {
        let points = item.quantity.saturating_mul(POINTS_PER_UNIT);
        for effect in mushroom_effects(&item.product.name) {
            let Some(index) = category_for_effect(effect)
                .and_then(|category| CATEGORIES.iter().position(|c| c.name == category.name))
            else {
                continue;
            };
            if let Some(score) = scores.get_mut(index) {
                *score = score.saturating_add(points).min(MAX_CATEGORY_SCORE);
            }
        }
    }

    CATEGORIES
        .iter()
        .zip(scores)
        .filter(|(_, score)| *score > 0)
        .map(|(category, score)| CategoryScore {
            category,
            score,
            max_score: MAX_CATEGORY_SCORE,
        })
        .collect()
}

/// An effect contributed to a category by a cart product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectSource {
    pub effect: &'static str,
    pub mushroom: String,
}

/// Effects from the cart that land in `category_name`.
#[must_use]
pub fn effects_in_category(cart: &Cart, category_name: &str) -> Vec<EffectSource> {
    cart.items()
        .iter()
        .flat_map(|item| {
            mushroom_effects(&item.product.name)
                .iter()
                .copied()
                .filter(move |effect| {
                    category_for_effect(effect).is_some_and(|c| c.name == category_name)
                })
                .map(move |effect| EffectSource {
                    effect,
                    mushroom: item.product.name.clone(),
                })
        })
        .collect()
}

/// Canned explanation shown when a visitor taps "Ask AI" on an effect.
#[must_use]
pub fn explain_effect(effect: &str, mushroom: &str) -> String {
    match effect.trim().to_lowercase().as_str() {
        "focus" => format!(
            "{mushroom} enhances focus through its unique compounds called hericenones and erinacines, which stimulate nerve growth factor (NGF) production. This promotes the growth and maintenance of neurons, leading to improved cognitive function and sustained attention."
        ),
        "memory" => format!(
            "{mushroom} supports memory formation by promoting neuroplasticity - the brain's ability to form new neural connections. The bioactive compounds help protect existing neurons while encouraging the growth of new ones, particularly in areas crucial for memory processing."
        ),
        "brain health" => format!(
            "{mushroom} provides comprehensive brain health support through neuroprotective compounds that reduce inflammation, support myelin sheath repair, and enhance overall cognitive resilience against age-related decline."
        ),
        "stress relief" => format!(
            "{mushroom} acts as an adaptogen, helping your body manage stress more effectively by regulating cortisol levels and supporting the hypothalamic-pituitary-adrenal (HPA) axis. This leads to a calmer, more balanced stress response."
        ),
        "immunity" => format!(
            "{mushroom} contains powerful beta-glucans and other polysaccharides that modulate immune system function, enhancing your body's natural defense mechanisms while maintaining immune balance."
        ),
        "energy" => format!(
            "{mushroom} supports cellular energy production by improving oxygen utilization and ATP synthesis in mitochondria, leading to sustained energy without the crash associated with stimulants."
        ),
        "stamina" => format!(
            "{mushroom} enhances physical endurance by improving oxygen delivery to muscles and supporting efficient energy metabolism, allowing for better performance during physical activities."
        ),
        "vitality" => format!(
            "{mushroom} promotes overall vitality through its adaptogenic properties, supporting multiple body systems simultaneously for enhanced well-being and resilience."
        ),
        _ => format!(
            "{mushroom} provides {effect} benefits through its unique bioactive compounds that work synergistically with your body's natural processes."
        ),
    }
}

/// Follow-up reply in the "Ask AI" panel after the visitor asks a question.
#[must_use]
pub fn effect_follow_up(effect: &str) -> String {
    format!(
        "That's a great question about {effect}! Based on current research, the effects typically become noticeable within 2-4 weeks of consistent use. The key is maintaining a regular supplementation schedule to allow the bioactive compounds to build up in your system."
    )
}
