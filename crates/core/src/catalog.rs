use std::collections::BTreeSet;

use crate::collaborators::PartCatalog;
use crate::domain::parts::{CatalogEntry, OemCandidate, PartRequest};
use crate::domain::vehicle::VehicleIdentity;
use crate::domain::PipelineStage;
use crate::errors::EstimateError;

pub async fn resolve_part(
    catalog: &dyn PartCatalog,
    vehicle: &VehicleIdentity,
    description: &str,
) -> Result<PartRequest, EstimateError> {
    let entries = catalog.lookup(vehicle, description).await.map_err(|error| {
        EstimateError::CollaboratorUnavailable {
            stage: PipelineStage::PartCatalog,
            collaborator: "part catalog".to_owned(),
            reason: error.to_string(),
        }
    })?;

    build_part_request(description, &entries).ok_or_else(|| EstimateError::PartNotFound {
        vehicle: vehicle.describe(),
        description: description.to_owned(),
    })
}

/// Primary is the entry flagged primary (or the first one); the rest become alternates
/// in catalog order with duplicate part numbers removed.
pub fn build_part_request(description: &str, entries: &[CatalogEntry]) -> Option<PartRequest> {
    let primary_index = entries.iter().position(|entry| entry.is_primary).unwrap_or(0);
    let primary_entry = entries.get(primary_index)?;

    let mut seen = BTreeSet::from([primary_entry.oem_number.clone()]);
    let alternates = entries
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != primary_index)
        .filter(|(_, entry)| seen.insert(entry.oem_number.clone()))
        .map(|(_, entry)| OemCandidate::from(entry))
        .collect();

    Some(PartRequest {
        description: description.to_owned(),
        primary: OemCandidate::from(primary_entry),
        alternates,
        position: primary_entry.position.clone(),
        quantity: primary_entry.quantity.max(1),
    })
}
