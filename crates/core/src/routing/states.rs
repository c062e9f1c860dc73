use serde::{Deserialize, Serialize};

/// Ordered from least to most restrictive; transitions only ever move right.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingDecision {
    AutoProceed,
    QuickReview,
    HumanRequired,
    Blocked,
}

impl RoutingDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoProceed => "AUTO_PROCEED",
            Self::QuickReview => "QUICK_REVIEW",
            Self::HumanRequired => "HUMAN_REQUIRED",
            Self::Blocked => "BLOCKED",
        }
    }

    pub fn is_absorbing(&self) -> bool {
        matches!(self, Self::HumanRequired | Self::Blocked)
    }

    /// Only an auto-proceed result may be pushed downstream without a person looking at it.
    pub fn allows_dispatch(&self) -> bool {
        matches!(self, Self::AutoProceed)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoutingEvent {
    RedComplianceFlag { title: String },
    UnknownPartCondition { oem_number: String },
    NoOffersAvailable { description: String },
    PartNotFound { description: String },
    LaborNotFound { job_code: String },
    LaborCatalogUnavailable { job_code: String },
    PartCatalogUnavailable { description: String },
    ComplianceIncomplete { reason: String },
}

impl RoutingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RedComplianceFlag { .. } => "red_compliance_flag",
            Self::UnknownPartCondition { .. } => "unknown_part_condition",
            Self::NoOffersAvailable { .. } => "no_offers_available",
            Self::PartNotFound { .. } => "part_not_found",
            Self::LaborNotFound { .. } => "labor_not_found",
            Self::LaborCatalogUnavailable { .. } => "labor_catalog_unavailable",
            Self::PartCatalogUnavailable { .. } => "part_catalog_unavailable",
            Self::ComplianceIncomplete { .. } => "compliance_incomplete",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: RoutingDecision,
    pub to: RoutingDecision,
    pub event: RoutingEvent,
}

impl TransitionOutcome {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}
