pub mod compliance;
pub mod estimate;
pub mod job;
pub mod labor;
pub mod offer;
pub mod parts;
pub mod vehicle;

use serde::{Deserialize, Serialize};

/// Stage identity attached to errors, audit events and routing history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Intake,
    VehicleIdentity,
    Compliance,
    JobClassification,
    Labor,
    AddOns,
    PartCatalog,
    VendorPricing,
    PartCondition,
    VendorSelection,
    EstimateCalculation,
    Confidence,
    Dispatch,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::VehicleIdentity => "vehicle_identity",
            Self::Compliance => "compliance",
            Self::JobClassification => "job_classification",
            Self::Labor => "labor",
            Self::AddOns => "add_ons",
            Self::PartCatalog => "part_catalog",
            Self::VendorPricing => "vendor_pricing",
            Self::PartCondition => "part_condition",
            Self::VendorSelection => "vendor_selection",
            Self::EstimateCalculation => "estimate_calculation",
            Self::Confidence => "confidence",
            Self::Dispatch => "dispatch",
        }
    }
}
