use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    BrakeService,
    EngineRepair,
    AcService,
    Transmission,
    Suspension,
    Electrical,
    Maintenance,
    Cooling,
    General,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BrakeService => "brake_service",
            Self::EngineRepair => "engine_repair",
            Self::AcService => "ac_service",
            Self::Transmission => "transmission",
            Self::Suspension => "suspension",
            Self::Electrical => "electrical",
            Self::Maintenance => "maintenance",
            Self::Cooling => "cooling",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobClassification {
    pub category: JobType,
    pub job_code: String,
    pub confidence: f64,
    pub matched_keywords: Vec<String>,
}
