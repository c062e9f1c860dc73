use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collaborators::LaborCatalog;
use crate::domain::labor::LaborItem;
use crate::domain::vehicle::VehicleIdentity;
use crate::domain::PipelineStage;
use crate::errors::EstimateError;

/// Labor line plus the parts its procedure consumes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLabor {
    pub item: LaborItem,
    pub part_descriptions: Vec<String>,
}

/// Looks up book hours for the exact vehicle and job code. There is no generic fallback.
pub async fn resolve_labor(
    catalog: &dyn LaborCatalog,
    vehicle: &VehicleIdentity,
    job_code: &str,
    labor_rate: Decimal,
) -> Result<ResolvedLabor, EstimateError> {
    let record = catalog.lookup(vehicle, job_code).await.map_err(|error| {
        EstimateError::CollaboratorUnavailable {
            stage: PipelineStage::Labor,
            collaborator: "labor catalog".to_owned(),
            reason: error.to_string(),
        }
    })?;

    let Some(record) = record else {
        return Err(EstimateError::LaborNotFound {
            vehicle: vehicle.describe(),
            job_code: job_code.to_owned(),
        });
    };

    if record.hours < Decimal::ZERO {
        return Err(EstimateError::InvalidEstimateInput {
            field: "labor.hours".to_owned(),
            value: record.hours.to_string(),
        });
    }

    debug!(
        event_name = "labor.resolved",
        vin = %vehicle.vin,
        job_code,
        hours = %record.hours,
        source = %record.source,
        "labor time resolved"
    );
    Ok(ResolvedLabor {
        item: LaborItem::from_record(job_code, &record, labor_rate),
        part_descriptions: record.part_descriptions,
    })
}
