pub mod addons;
pub mod audit;
pub mod catalog;
pub mod classifier;
pub mod collaborators;
pub mod compliance;
pub mod condition;
pub mod config;
pub mod domain;
pub mod errors;
pub mod fixtures;
pub mod integrations;
pub mod labor;
pub mod pipeline;
pub mod pricing;
pub mod routing;
pub mod scoring;
pub mod vendors;
pub mod vin;

pub use addons::{AddOnEngine, AddOnPart, AddOnRule, DetectedAddOn};
pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink, NoopAuditSink};
pub use classifier::{classify_text, KeywordJobClassifier};
pub use collaborators::{
    CollaboratorResult, EstimateSink, JobClassifier, LaborCatalog, PartCatalog, RecallRegistry,
    VehicleDecoder, VendorSource,
};
pub use condition::{classify_condition, classify_offer};
pub use config::{AppConfig, ConfigOverrides, LoadOptions, PipelineConfig};
pub use domain::estimate::{EstimateBreakdown, PricedPart};
pub use domain::offer::{BrandTier, ScoredOffer, Selection, StockStatus, VendorOffer};
pub use domain::parts::{Condition, PartCondition, PartRequest};
pub use domain::vehicle::VehicleIdentity;
pub use domain::PipelineStage;
pub use errors::{ApplicationError, CollaboratorError, EstimateError, InterfaceError};
pub use pipeline::{
    DispatchOutcome, EstimateIntake, EstimatePipeline, PipelineCollaborators, PipelineResult,
};
pub use pricing::{calculate_estimate, DeterministicEstimateCalculator, EstimateCalculator};
pub use routing::{RoutingDecision, RoutingEngine, RoutingEvent};
pub use scoring::{score_offers, VendorWeights};
pub use vendors::{PartPricing, VendorPricingAggregator};
pub use vin::{validate_vin, Vin};
