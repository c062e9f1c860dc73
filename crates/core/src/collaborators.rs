//! Contracts for the external data sources the estimate pipeline consumes.

use async_trait::async_trait;

use crate::domain::compliance::RecallRecord;
use crate::domain::job::JobClassification;
use crate::domain::labor::LaborRecord;
use crate::domain::offer::VendorOffer;
use crate::domain::parts::CatalogEntry;
use crate::domain::vehicle::VehicleIdentity;
use crate::errors::CollaboratorError;
use crate::pipeline::PipelineResult;
use crate::vin::Vin;

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Returns every plausible decode; more than one variant is ambiguous.
#[async_trait]
pub trait VehicleDecoder: Send + Sync {
    async fn decode(&self, vin: &Vin) -> CollaboratorResult<Vec<VehicleIdentity>>;
}

#[async_trait]
pub trait RecallRegistry: Send + Sync {
    async fn open_recalls(&self, vin: &Vin) -> CollaboratorResult<Vec<RecallRecord>>;
}

#[async_trait]
pub trait JobClassifier: Send + Sync {
    async fn classify(&self, service_request: &str) -> CollaboratorResult<JobClassification>;
}

#[async_trait]
pub trait LaborCatalog: Send + Sync {
    async fn lookup(
        &self,
        vehicle: &VehicleIdentity,
        job_code: &str,
    ) -> CollaboratorResult<Option<LaborRecord>>;
}

#[async_trait]
pub trait PartCatalog: Send + Sync {
    async fn lookup(
        &self,
        vehicle: &VehicleIdentity,
        description: &str,
    ) -> CollaboratorResult<Vec<CatalogEntry>>;
}

/// One pricing source. Implementations map their native listing shape into `VendorOffer`.
#[async_trait]
pub trait VendorSource: Send + Sync {
    fn vendor_id(&self) -> &str;
    fn vendor_name(&self) -> &str;
    async fn query(&self, oem_number: &str) -> CollaboratorResult<Vec<VendorOffer>>;
}

/// Downstream persistence of finished estimates; returns the external record id.
#[async_trait]
pub trait EstimateSink: Send + Sync {
    async fn push_estimate(&self, result: &PipelineResult) -> CollaboratorResult<String>;
}
