use serde::{Deserialize, Serialize};

use crate::domain::offer::BrandTier;

/// Row returned by the part catalog for a (vehicle, description) lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub oem_number: String,
    pub description: String,
    pub brand: Option<String>,
    pub brand_tier: Option<BrandTier>,
    #[serde(default)]
    pub is_primary: bool,
    pub position: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OemCandidate {
    pub oem_number: String,
    pub description: String,
    pub brand: Option<String>,
    pub brand_tier: Option<BrandTier>,
}

impl From<&CatalogEntry> for OemCandidate {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            oem_number: entry.oem_number.clone(),
            description: entry.description.clone(),
            brand: entry.brand.clone(),
            brand_tier: entry.brand_tier,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartRequest {
    pub description: String,
    pub primary: OemCandidate,
    pub alternates: Vec<OemCandidate>,
    pub position: Option<String>,
    pub quantity: u32,
}

impl PartRequest {
    /// Primary first, then alternates in catalog order.
    pub fn candidates(&self) -> impl Iterator<Item = &OemCandidate> {
        std::iter::once(&self.primary).chain(self.alternates.iter())
    }

    pub fn oem_numbers(&self) -> Vec<String> {
        self.candidates().map(|candidate| candidate.oem_number.clone()).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Condition {
    New,
    Remanufactured,
    Unknown,
}

impl Condition {
    pub fn display_tag(&self) -> &'static str {
        match self {
            Self::New => "[NEW]",
            Self::Remanufactured => "[REMANUFACTURED]",
            Self::Unknown => "[CONDITION UNKNOWN]",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionConfidence {
    High,
    Medium,
    Low,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartCondition {
    pub condition: Condition,
    pub confidence: ConditionConfidence,
    pub matched_keyword: Option<String>,
    pub requires_manual_selection: bool,
}

impl PartCondition {
    pub fn display_tag(&self) -> &'static str {
        self.condition.display_tag()
    }
}
