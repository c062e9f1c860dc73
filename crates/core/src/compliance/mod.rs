pub mod recall;
pub mod warranty;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::collaborators::RecallRegistry;
use crate::domain::compliance::{ComplianceFlag, RecallRecord};
use crate::vin::Vin;

pub use recall::{match_complaint, screen_recalls};
pub use warranty::{check_warranty, WarrantyInput};

/// Outcome of the recall registry lookup for one run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecallScreening {
    pub open_recalls: Vec<RecallRecord>,
    pub flags: Vec<ComplianceFlag>,
    /// Set when the registry could not be reached; no recall flags can be trusted.
    pub unavailable: Option<String>,
}

impl RecallScreening {
    pub fn is_complete(&self) -> bool {
        self.unavailable.is_none()
    }
}

pub async fn screen_recall_registry(
    registry: &dyn RecallRegistry,
    vin: &Vin,
    complaint: &str,
) -> RecallScreening {
    match registry.open_recalls(vin).await {
        Ok(open_recalls) => {
            let flags = screen_recalls(complaint, &open_recalls);
            RecallScreening { open_recalls, flags, unavailable: None }
        }
        Err(error) => {
            warn!(
                event_name = "compliance.recall_registry_unavailable",
                vin = %vin,
                error = %error,
                "recall registry lookup failed"
            );
            RecallScreening {
                open_recalls: Vec::new(),
                flags: Vec::new(),
                unavailable: Some(error.to_string()),
            }
        }
    }
}
