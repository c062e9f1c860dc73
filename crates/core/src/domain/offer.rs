use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::parts::PartCondition;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BrandTier {
    #[serde(rename = "OEM")]
    Oem,
    #[serde(rename = "Premium")]
    Premium,
    #[serde(rename = "OE Equivalent")]
    OeEquivalent,
    #[serde(rename = "Standard")]
    Standard,
    #[serde(rename = "Economy")]
    Economy,
}

const PREMIUM_BRANDS: &[&str] = &[
    "BREMBO",
    "AKEBONO",
    "BOSCH",
    "DENSO",
    "NGK",
    "BILSTEIN",
    "LEMFORDER",
    "LEMFÖRDER",
    "SACHS",
    "CONTINENTAL",
    "HELLA",
    "VALEO",
];

const OE_EQUIVALENT_BRANDS: &[&str] = &[
    "ATE",
    "MOOG",
    "CENTRIC",
    "WAGNER",
    "BENDIX",
    "RAYBESTOS",
    "MOTORCRAFT",
    "ACDELCO",
    "AC DELCO",
    "MANN",
    "MAHLE",
];

const OEM_MARKERS: &[&str] = &["OEM", "GENUINE", "ORIGINAL"];
const ECONOMY_MARKERS: &[&str] = &["ECONOMY", "VALUE", "BUDGET", "GENERIC"];

impl BrandTier {
    /// Brand component of the vendor score, 0-10.
    pub fn score(&self) -> f64 {
        match self {
            Self::Oem => 10.0,
            Self::Premium => 9.0,
            Self::OeEquivalent => 8.0,
            Self::Standard => 6.0,
            Self::Economy => 4.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Oem => "OEM",
            Self::Premium => "Premium",
            Self::OeEquivalent => "OE Equivalent",
            Self::Standard => "Standard",
            Self::Economy => "Economy",
        }
    }

    /// Parses a vendor-supplied tier label; anything unrecognised is `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_uppercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "OEM" | "GENUINE" | "OE" => Some(Self::Oem),
            "PREMIUM" => Some(Self::Premium),
            "OE EQUIVALENT" | "OES" | "OE EQUIV" => Some(Self::OeEquivalent),
            "STANDARD" | "AFTERMARKET" => Some(Self::Standard),
            "ECONOMY" | "VALUE" | "BUDGET" => Some(Self::Economy),
            _ => None,
        }
    }

    /// Tier for sources whose listings carry no tier, inferred from brand and description.
    pub fn infer(brand: &str, description: &str) -> Self {
        let brand_upper = brand.trim().to_uppercase();
        let text = format!("{brand_upper} {}", description.to_uppercase());
        let words: Vec<&str> =
            text.split(|ch: char| !ch.is_alphanumeric()).filter(|word| !word.is_empty()).collect();
        let has_word = |marker: &str| words.iter().any(|word| *word == marker);

        if OEM_MARKERS.iter().any(|marker| has_word(marker)) {
            return Self::Oem;
        }
        if PREMIUM_BRANDS.iter().any(|name| brand_upper == *name) {
            return Self::Premium;
        }
        if OE_EQUIVALENT_BRANDS.iter().any(|name| brand_upper == *name) {
            return Self::OeEquivalent;
        }
        if ECONOMY_MARKERS.iter().any(|marker| has_word(marker)) {
            return Self::Economy;
        }
        Self::Standard
    }
}

/// Brand score used when a listing carries no recognised tier.
pub const UNKNOWN_TIER_SCORE: f64 = 5.0;

pub fn brand_score(tier: Option<BrandTier>) -> f64 {
    tier.map(|tier| tier.score()).unwrap_or(UNKNOWN_TIER_SCORE)
}

const UNAVAILABLE_PHRASES: &[&str] = &[
    "not in stock",
    "no stock",
    "not available",
    "unavailable",
    "out of stock",
    "out",
    "sold out",
    "backorder",
    "backordered",
    "back order",
    "back ordered",
];
const LIMITED_PHRASES: &[&str] = &["limited", "low", "few", "last one"];
const SPECIAL_ORDER_PHRASES: &[&str] = &["special order", "special", "order only"];
const IN_STOCK_PHRASES: &[&str] = &["in stock", "instock", "available", "yes"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LimitedStock,
    OutOfStock,
    SpecialOrder,
    Unknown,
}

impl StockStatus {
    /// Maps the free-text stock vocabulary used by scraped vendor portals. Negated and
    /// unavailable phrasings are checked first; markers match whole words only.
    pub fn from_text(text: &str) -> Self {
        let lowered = text.to_ascii_lowercase();
        let words: Vec<&str> = lowered
            .split(|ch: char| !ch.is_ascii_alphanumeric())
            .filter(|word| !word.is_empty())
            .collect();
        let padded = format!(" {} ", words.join(" "));
        let has = |phrase: &str| padded.contains(&format!(" {phrase} "));

        if UNAVAILABLE_PHRASES.iter().any(|phrase| has(phrase)) {
            Self::OutOfStock
        } else if LIMITED_PHRASES.iter().any(|phrase| has(phrase)) {
            Self::LimitedStock
        } else if SPECIAL_ORDER_PHRASES.iter().any(|phrase| has(phrase)) {
            Self::SpecialOrder
        } else if IN_STOCK_PHRASES.iter().any(|phrase| has(phrase)) {
            Self::InStock
        } else {
            Self::Unknown
        }
    }
}

/// Point-in-time snapshot of one vendor listing, normalised from the vendor's native schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VendorOffer {
    pub vendor_id: String,
    pub vendor_name: String,
    pub oem_number: String,
    pub brand: String,
    pub brand_tier: Option<BrandTier>,
    pub price: Decimal,
    pub stock_status: StockStatus,
    pub stock_quantity: Option<u32>,
    pub warehouse_distance_miles: f64,
    pub delivery_option: Option<String>,
    pub warranty_term: Option<String>,
    pub raw_description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    Primary,
    Backup,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredOffer {
    pub offer: VendorOffer,
    pub condition: PartCondition,
    pub brand_score: f64,
    pub price_score: f64,
    pub distance_score: f64,
    pub composite_score: f64,
    pub selection: Option<Selection>,
}
