use thiserror::Error;

use crate::domain::PipelineStage;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EstimateError {
    #[error("invalid intake field `{field}`: {reason}")]
    InvalidIntake { field: String, reason: String },
    #[error("invalid vehicle identifier `{vin}`: {reason}")]
    InvalidIdentifier { vin: String, reason: String },
    #[error("vehicle decode unavailable for `{vin}`: {reason}")]
    DecodeUnavailable { vin: String, reason: String },
    #[error("vehicle decode for `{vin}` is ambiguous between {}", candidates.join(", "))]
    AmbiguousDecode { vin: String, candidates: Vec<String> },
    #[error("no labor time for job `{job_code}` on {vehicle}")]
    LaborNotFound { vehicle: String, job_code: String },
    #[error("no catalog part matches `{description}` on {vehicle}")]
    PartNotFound { vehicle: String, description: String },
    #[error(
        "vendor `{vendor_id}` unavailable for `{oem_number}` after {attempts} attempt(s): {reason}"
    )]
    VendorUnavailable { vendor_id: String, oem_number: String, attempts: u32, reason: String },
    #[error("no vendor offers for `{description}` (oem numbers: {})", oem_numbers.join(", "))]
    NoOffersAvailable { description: String, oem_numbers: Vec<String> },
    #[error("invalid vendor weights: {reason}")]
    InvalidWeights { reason: String },
    #[error("invalid estimate input `{field}`: `{value}`")]
    InvalidEstimateInput { field: String, value: String },
    #[error("{collaborator} unavailable during {}: {reason}", stage.as_str())]
    CollaboratorUnavailable { stage: PipelineStage, collaborator: String, reason: String },
}

impl EstimateError {
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::InvalidIntake { .. } => PipelineStage::Intake,
            Self::InvalidIdentifier { .. }
            | Self::DecodeUnavailable { .. }
            | Self::AmbiguousDecode { .. } => PipelineStage::VehicleIdentity,
            Self::LaborNotFound { .. } => PipelineStage::Labor,
            Self::PartNotFound { .. } => PipelineStage::PartCatalog,
            Self::VendorUnavailable { .. } => PipelineStage::VendorPricing,
            Self::NoOffersAvailable { .. } | Self::InvalidWeights { .. } => {
                PipelineStage::VendorSelection
            }
            Self::InvalidEstimateInput { .. } => PipelineStage::EstimateCalculation,
            Self::CollaboratorUnavailable { stage, .. } => *stage,
        }
    }

    /// Stable machine-readable code used in flags and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidIntake { .. } => "invalid_intake",
            Self::InvalidIdentifier { .. } => "invalid_identifier",
            Self::DecodeUnavailable { .. } => "decode_unavailable",
            Self::AmbiguousDecode { .. } => "ambiguous_decode",
            Self::LaborNotFound { .. } => "labor_not_found",
            Self::PartNotFound { .. } => "part_not_found",
            Self::VendorUnavailable { .. } => "vendor_unavailable",
            Self::NoOffersAvailable { .. } => "no_offers_available",
            Self::InvalidWeights { .. } => "invalid_weights",
            Self::InvalidEstimateInput { .. } => "invalid_estimate_input",
            Self::CollaboratorUnavailable { .. } => "collaborator_unavailable",
        }
    }
}

/// Failure reported by an external collaborator (decoder, catalog, vendor, sink).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("collaborator timed out after {0} ms")]
    Timeout(u64),
    #[error("malformed collaborator response: {0}")]
    Malformed(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl CollaboratorError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Estimate(#[from] EstimateError),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The estimate request could not be processed. Check the VIN and service request."
            }
            Self::ServiceUnavailable { .. } => {
                "A parts or vehicle data source is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = "unassigned".to_owned();
        match value {
            ApplicationError::Estimate(
                error @ (EstimateError::DecodeUnavailable { .. }
                | EstimateError::VendorUnavailable { .. }
                | EstimateError::CollaboratorUnavailable { .. }),
            ) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id: unassigned }
            }
            ApplicationError::Estimate(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id: unassigned }
            }
            ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::PipelineStage;
    use crate::errors::{ApplicationError, CollaboratorError, EstimateError, InterfaceError};

    #[test]
    fn invalid_identifier_maps_to_bad_request_with_correlation_id() {
        let interface = ApplicationError::from(EstimateError::InvalidIdentifier {
            vin: "123".to_owned(),
            reason: "expected 17 characters, found 3".to_owned(),
        })
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The estimate request could not be processed. Check the VIN and service request."
        );
    }

    #[test]
    fn decode_outage_maps_to_service_unavailable() {
        let interface = ApplicationError::from(EstimateError::DecodeUnavailable {
            vin: "1HGBH41JXMN109186".to_owned(),
            reason: "timeout".to_owned(),
        })
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.correlation_id(), "req-2");
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface = ApplicationError::Configuration("tax rate out of range".to_owned())
            .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }

    #[test]
    fn errors_carry_stage_identity() {
        let error = EstimateError::NoOffersAvailable {
            description: "Front brake pads".to_owned(),
            oem_numbers: vec!["45022-TVA-A01".to_owned(), "45022-TVA-A02".to_owned()],
        };
        assert_eq!(error.stage(), PipelineStage::VendorSelection);
        assert!(error.to_string().contains("45022-TVA-A01, 45022-TVA-A02"));

        let error = EstimateError::CollaboratorUnavailable {
            stage: PipelineStage::Compliance,
            collaborator: "recall registry".to_owned(),
            reason: "503".to_owned(),
        };
        assert_eq!(error.stage(), PipelineStage::Compliance);
        assert_eq!(error.to_string(), "recall registry unavailable during compliance: 503");
    }

    #[test]
    fn only_transient_collaborator_errors_retry() {
        assert!(CollaboratorError::Timeout(5000).is_retryable());
        assert!(CollaboratorError::Unavailable("reset".to_owned()).is_retryable());
        assert!(!CollaboratorError::Malformed("bad json".to_owned()).is_retryable());
        assert!(!CollaboratorError::NotFound("45022".to_owned()).is_retryable());
    }
}
