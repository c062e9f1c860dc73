//! End-to-end estimate generation: one intake in, one immutable `PipelineResult` out.
//!
//! Vehicle decode, recall screening and job classification run concurrently; everything
//! after that is sequenced because each stage consumes the previous one's output. Only
//! identity problems and invalid intake abort a run. Every other failure becomes a flag,
//! a stage issue and (where it matters) a routing event.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::addons::AddOnEngine;
use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink, NoopAuditSink};
use crate::catalog::resolve_part;
use crate::classifier::classify_text;
use crate::collaborators::{
    EstimateSink, JobClassifier, LaborCatalog, PartCatalog, RecallRegistry, VehicleDecoder,
    VendorSource,
};
use crate::compliance::{check_warranty, screen_recall_registry, WarrantyInput};
use crate::condition::classify_offer;
use crate::config::PipelineConfig;
use crate::domain::compliance::{ComplianceFlag, RecallRecord};
use crate::domain::estimate::{EstimateBreakdown, PricedPart};
use crate::domain::job::JobClassification;
use crate::domain::labor::LaborItem;
use crate::domain::offer::{ScoredOffer, Selection};
use crate::domain::parts::{Condition, PartRequest};
use crate::domain::vehicle::VehicleIdentity;
use crate::domain::PipelineStage;
use crate::errors::{CollaboratorError, EstimateError};
use crate::labor::resolve_labor;
use crate::pricing::{
    DeterministicEstimateCalculator, EstimateCalculator, EstimateInputs, PricingTrace,
};
use crate::routing::{
    confidence_score, ConfidenceSignals, Deduction, RoutingDecision, RoutingEngine, RoutingEvent,
    TransitionOutcome,
};
use crate::scoring::{score_offers, VendorWeights};
use crate::vendors::{PartPricing, VendorPricingAggregator};
use crate::vin::Vin;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstimateIntake {
    pub vin: String,
    pub service_request: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_phone: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub odometer: Option<u32>,
    #[serde(default)]
    pub vendor_weights: Option<VendorWeights>,
}

impl EstimateIntake {
    /// blake3 over the canonical JSON encoding, so identical intakes share a digest.
    pub fn digest(&self) -> String {
        match serde_json::to_vec(self) {
            Ok(bytes) => blake3::hash(&bytes).to_hex().to_string(),
            Err(_) => blake3::hash(self.vin.as_bytes()).to_hex().to_string(),
        }
    }

    fn validate(&self) -> Result<(), EstimateError> {
        if self.vin.trim().is_empty() {
            return Err(EstimateError::InvalidIntake {
                field: "vin".to_owned(),
                reason: "is required".to_owned(),
            });
        }
        if self.service_request.trim().is_empty() {
            return Err(EstimateError::InvalidIntake {
                field: "service_request".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        if let Some(email) = self.customer_email.as_deref().map(str::trim) {
            if !email.is_empty() && !email.contains('@') {
                return Err(EstimateError::InvalidIntake {
                    field: "customer_email".to_owned(),
                    reason: format!("`{email}` is not an email address"),
                });
            }
        }
        Ok(())
    }
}

/// Offers ranked for one part request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartSelection {
    pub request: PartRequest,
    pub ranked: Vec<ScoredOffer>,
}

impl PartSelection {
    pub fn primary(&self) -> Option<&ScoredOffer> {
        self.ranked.iter().find(|offer| offer.selection == Some(Selection::Primary))
    }

    pub fn backup(&self) -> Option<&ScoredOffer> {
        self.ranked.iter().find(|offer| offer.selection == Some(Selection::Backup))
    }

    /// Selected offers whose condition could not be read from the listing.
    pub fn needs_manual_selection(&self) -> bool {
        self.ranked
            .iter()
            .filter(|offer| offer.selection.is_some())
            .any(|offer| offer.condition.requires_manual_selection)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnpricedPart {
    pub description: String,
    pub oem_numbers: Vec<String>,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageIssue {
    pub stage: PipelineStage,
    pub code: String,
    pub message: String,
}

impl From<&EstimateError> for StageIssue {
    fn from(error: &EstimateError) -> Self {
        Self { stage: error.stage(), code: error.code().to_owned(), message: error.to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub run_id: String,
    pub correlation_id: String,
    pub input_digest: String,
    pub generated_at: DateTime<Utc>,
    pub vehicle: VehicleIdentity,
    pub compliance_flags: Vec<ComplianceFlag>,
    pub open_recalls: Vec<RecallRecord>,
    pub classification: JobClassification,
    pub labor_items: Vec<LaborItem>,
    pub priced_parts: Vec<PricedPart>,
    pub selections: Vec<PartSelection>,
    pub unpriced_parts: Vec<UnpricedPart>,
    pub breakdown: EstimateBreakdown,
    pub pricing_trace: PricingTrace,
    pub confidence_score: f64,
    pub confidence_deductions: Vec<Deduction>,
    pub routing: RoutingDecision,
    pub routing_history: Vec<TransitionOutcome>,
    pub flags: Vec<String>,
    pub stage_issues: Vec<StageIssue>,
}

impl PipelineResult {
    /// The line items the breakdown was computed from.
    pub fn estimate_inputs(&self) -> EstimateInputs {
        EstimateInputs {
            labor: self.labor_items.clone(),
            parts: self.priced_parts.clone(),
            job_type: self.classification.category,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Dispatched { record_id: String },
    Held { decision: RoutingDecision },
}

/// External data sources a pipeline is wired to.
pub struct PipelineCollaborators {
    pub decoder: Arc<dyn VehicleDecoder>,
    pub recalls: Arc<dyn RecallRegistry>,
    pub classifier: Arc<dyn JobClassifier>,
    pub labor: Arc<dyn LaborCatalog>,
    pub parts: Arc<dyn PartCatalog>,
    pub vendors: Vec<Arc<dyn VendorSource>>,
}

pub struct EstimatePipeline {
    decoder: Arc<dyn VehicleDecoder>,
    recalls: Arc<dyn RecallRegistry>,
    classifier: Arc<dyn JobClassifier>,
    labor: Arc<dyn LaborCatalog>,
    parts: Arc<dyn PartCatalog>,
    vendors: VendorPricingAggregator,
    add_ons: AddOnEngine,
    calculator: Arc<dyn EstimateCalculator>,
    routing: RoutingEngine,
    config: PipelineConfig,
    audit_sink: Arc<dyn AuditSink>,
    reference_year: Option<i32>,
    actor: String,
}

/// Mutable state of one run while it moves through the stages.
#[derive(Default)]
struct RunNotes {
    flags: Vec<String>,
    issues: Vec<StageIssue>,
    events: Vec<RoutingEvent>,
}

impl RunNotes {
    fn issue(&mut self, error: &EstimateError) {
        self.issues.push(StageIssue::from(error));
    }
}

impl EstimatePipeline {
    pub fn new(collaborators: PipelineCollaborators, config: PipelineConfig) -> Self {
        Self {
            decoder: collaborators.decoder,
            recalls: collaborators.recalls,
            classifier: collaborators.classifier,
            labor: collaborators.labor,
            parts: collaborators.parts,
            vendors: VendorPricingAggregator::new(collaborators.vendors, &config.vendors),
            add_ons: AddOnEngine::standard(),
            calculator: Arc::new(DeterministicEstimateCalculator::from_shop(&config.shop)),
            routing: RoutingEngine::new(&config.routing),
            config,
            audit_sink: Arc::new(NoopAuditSink),
            reference_year: None,
            actor: "estimate-pipeline".to_owned(),
        }
    }

    pub fn with_add_ons(mut self, add_ons: AddOnEngine) -> Self {
        self.add_ons = add_ons;
        self
    }

    pub fn with_calculator(mut self, calculator: Arc<dyn EstimateCalculator>) -> Self {
        self.calculator = calculator;
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = sink;
        self
    }

    /// Pins the calendar year used for vehicle age; defaults to the current UTC year.
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = Some(year);
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn generate_estimate(
        &self,
        intake: EstimateIntake,
    ) -> Result<PipelineResult, EstimateError> {
        let correlation_id = Uuid::new_v4().to_string();
        self.generate_estimate_with_correlation(intake, &correlation_id).await
    }

    pub async fn generate_estimate_with_correlation(
        &self,
        intake: EstimateIntake,
        correlation_id: &str,
    ) -> Result<PipelineResult, EstimateError> {
        let run_id = Uuid::new_v4().to_string();
        let audit = AuditContext::new(
            run_id.clone(),
            Some(intake.vin.trim().to_uppercase()),
            correlation_id,
            self.actor.clone(),
        );
        self.audit_sink.emit(
            audit
                .event("pipeline.run_started", AuditCategory::Intake, AuditOutcome::Success)
                .with_metadata("input_digest", intake.digest()),
        );

        let result = self.run(intake, &run_id, &audit).await;
        match &result {
            Ok(result) => {
                info!(
                    event_name = "pipeline.run_completed",
                    run_id = %run_id,
                    vin = %result.vehicle.vin,
                    routing = result.routing.as_str(),
                    grand_total = %result.breakdown.grand_total,
                    flags = result.flags.len(),
                    "estimate generated"
                );
                let outcome = if result.flags.is_empty() {
                    AuditOutcome::Success
                } else {
                    AuditOutcome::Degraded
                };
                self.audit_sink.emit(
                    audit
                        .event("pipeline.run_completed", AuditCategory::System, outcome)
                        .with_metadata("routing", result.routing.as_str())
                        .with_metadata("grand_total", result.breakdown.grand_total.to_string()),
                );
            }
            Err(error) => {
                warn!(
                    event_name = "pipeline.run_failed",
                    run_id = %run_id,
                    stage = error.stage().as_str(),
                    code = error.code(),
                    error = %error,
                    "estimate generation aborted"
                );
                self.audit_sink.emit(
                    audit
                        .event(
                            "pipeline.run_failed",
                            AuditCategory::from(error.stage()),
                            AuditOutcome::Failed,
                        )
                        .with_metadata("stage", error.stage().as_str())
                        .with_metadata("code", error.code())
                        .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }

    async fn run(
        &self,
        intake: EstimateIntake,
        run_id: &str,
        audit: &AuditContext,
    ) -> Result<PipelineResult, EstimateError> {
        intake.validate()?;
        let input_digest = intake.digest();
        let vin = Vin::parse(&intake.vin)?;
        let weights = intake.vendor_weights.unwrap_or_else(|| self.config.scoring.weights());
        weights.normalized()?;

        let mut notes = RunNotes::default();

        let (decoded, screening, classification) = tokio::join!(
            self.decoder.decode(&vin),
            screen_recall_registry(self.recalls.as_ref(), &vin, &intake.service_request),
            self.classifier.classify(&intake.service_request),
        );

        let vehicle = select_decode(&vin, decoded)?;
        self.emit_stage(
            audit,
            PipelineStage::VehicleIdentity,
            AuditOutcome::Success,
            &[("vehicle", vehicle.describe())],
        );

        let classification = match classification {
            Ok(classification) => classification,
            Err(error) => {
                warn!(
                    event_name = "pipeline.classifier_fallback",
                    run_id,
                    error = %error,
                    "classifier unavailable, using keyword rules"
                );
                notes.flags.push(format!("classifier_fallback: {error}"));
                notes.issue(&EstimateError::CollaboratorUnavailable {
                    stage: PipelineStage::JobClassification,
                    collaborator: "job classifier".to_owned(),
                    reason: error.to_string(),
                });
                classify_text(&intake.service_request)
            }
        };

        let mut compliance_flags = screening.flags.clone();
        if let Some(reason) = &screening.unavailable {
            notes.flags.push("recall_check_unavailable".to_owned());
            notes.issue(&EstimateError::CollaboratorUnavailable {
                stage: PipelineStage::Compliance,
                collaborator: "recall registry".to_owned(),
                reason: reason.clone(),
            });
            notes.events.push(RoutingEvent::ComplianceIncomplete { reason: reason.clone() });
        }
        match intake.odometer {
            Some(mileage) => compliance_flags.extend(check_warranty(&WarrantyInput {
                model_year: vehicle.year,
                as_of_year: self.reference_year.unwrap_or_else(|| Utc::now().year()),
                make: &vehicle.make,
                mileage,
                complaint: &intake.service_request,
            })),
            None => notes.flags.push("warranty_check_skipped: no odometer".to_owned()),
        }
        notes.events.extend(compliance_flags.iter().filter(|flag| flag.is_red()).map(|flag| {
            RoutingEvent::RedComplianceFlag { title: flag.title.clone() }
        }));
        let compliance_outcome = if screening.is_complete() {
            AuditOutcome::Success
        } else {
            AuditOutcome::Degraded
        };
        self.emit_stage(
            audit,
            PipelineStage::Compliance,
            compliance_outcome,
            &[("flags", compliance_flags.len().to_string())],
        );

        let mut labor_items = Vec::new();
        let mut part_descriptions = Vec::new();
        match resolve_labor(
            self.labor.as_ref(),
            &vehicle,
            &classification.job_code,
            self.config.shop.labor_rate,
        )
        .await
        {
            Ok(resolved) => {
                labor_items.push(resolved.item);
                part_descriptions = resolved.part_descriptions;
            }
            Err(error) => {
                let job_code = classification.job_code.clone();
                notes.issue(&error);
                if matches!(error, EstimateError::CollaboratorUnavailable { .. }) {
                    notes.flags.push(format!("labor_catalog_unavailable: {job_code}"));
                    notes.events.push(RoutingEvent::LaborCatalogUnavailable { job_code });
                } else {
                    notes.flags.push(format!("{}: {job_code}", error.code()));
                    notes.events.push(RoutingEvent::LaborNotFound { job_code });
                }
            }
        }

        let markup_pct = self.config.shop.parts_markup_pct;
        let mut priced_parts: Vec<PricedPart> = Vec::new();
        for labor in &labor_items {
            for detected in self.add_ons.detect(labor) {
                priced_parts.push(PricedPart {
                    oem_number: detected.part.part_number,
                    description: detected.part.part_name,
                    condition: None,
                    vendor_id: None,
                    vendor_cost: detected.part.unit_cost,
                    markup_pct,
                    quantity: Decimal::from(detected.part.quantity),
                    reason_badge: Some(detected.reason_badge),
                });
            }
        }

        let mut selections = Vec::new();
        let mut unpriced_parts = Vec::new();
        for description in &part_descriptions {
            match self.select_part(&vehicle, description, &weights, &mut notes).await {
                Ok(selection) => {
                    if let Some(primary) = selection.primary() {
                        priced_parts.push(PricedPart {
                            oem_number: primary.offer.oem_number.clone(),
                            description: selection.request.description.clone(),
                            condition: Some(primary.condition.condition),
                            vendor_id: Some(primary.offer.vendor_id.clone()),
                            vendor_cost: primary.offer.price,
                            markup_pct,
                            quantity: Decimal::from(selection.request.quantity),
                            reason_badge: None,
                        });
                    }
                    selections.push(selection);
                }
                Err(unpriced) => unpriced_parts.push(unpriced),
            }
        }

        let manual: Vec<&PartSelection> =
            selections.iter().filter(|selection| selection.needs_manual_selection()).collect();
        if !manual.is_empty() {
            notes.flags.push(format!("manual_selection_required: {} part(s)", manual.len()));
        }
        for selection in manual {
            notes.events.push(RoutingEvent::UnknownPartCondition {
                oem_number: selection
                    .primary()
                    .map(|primary| primary.offer.oem_number.clone())
                    .unwrap_or_else(|| selection.request.primary.oem_number.clone()),
            });
        }
        self.emit_stage(
            audit,
            PipelineStage::VendorSelection,
            AuditOutcome::Success,
            &[
                ("priced", selections.len().to_string()),
                ("unpriced", unpriced_parts.len().to_string()),
            ],
        );

        let calculation = self.calculator.calculate(EstimateInputs {
            labor: labor_items,
            parts: priced_parts,
            job_type: classification.category,
        })?;
        self.emit_stage(
            audit,
            PipelineStage::EstimateCalculation,
            AuditOutcome::Success,
            &[("grand_total", calculation.breakdown.grand_total.to_string())],
        );

        let confidence = confidence_score(
            &ConfidenceSignals {
                vin_valid: true,
                classification_confidence: classification.confidence,
                customer_name: &intake.customer_name,
                customer_phone: &intake.customer_phone,
                service_request: &intake.service_request,
            },
            &self.config.routing,
        );
        let initial = self.routing.initial_state(classification.confidence);
        let (routing, routing_history) =
            self.routing.resolve(initial, &notes.events, self.audit_sink.as_ref(), audit);

        Ok(PipelineResult {
            run_id: run_id.to_owned(),
            correlation_id: audit.correlation_id.clone(),
            input_digest,
            generated_at: Utc::now(),
            vehicle,
            compliance_flags,
            open_recalls: screening.open_recalls,
            classification,
            labor_items: calculation.inputs.labor,
            priced_parts: calculation.inputs.parts,
            selections,
            unpriced_parts,
            breakdown: calculation.breakdown,
            pricing_trace: calculation.trace,
            confidence_score: confidence.score,
            confidence_deductions: confidence.deductions,
            routing,
            routing_history,
            flags: notes.flags,
            stage_issues: notes.issues,
        })
    }

    /// Catalog lookup, vendor fan-out, condition tagging and ranking for one part.
    async fn select_part(
        &self,
        vehicle: &VehicleIdentity,
        description: &str,
        weights: &VendorWeights,
        notes: &mut RunNotes,
    ) -> Result<PartSelection, UnpricedPart> {
        let request = match resolve_part(self.parts.as_ref(), vehicle, description).await {
            Ok(request) => request,
            Err(error) => {
                let description = description.to_owned();
                notes.issue(&error);
                if matches!(error, EstimateError::CollaboratorUnavailable { .. }) {
                    notes.flags.push(format!("part_catalog_unavailable: {description}"));
                    notes.events.push(RoutingEvent::PartCatalogUnavailable {
                        description: description.clone(),
                    });
                } else {
                    notes.flags.push(format!("part_not_found: {description}"));
                    notes
                        .events
                        .push(RoutingEvent::PartNotFound { description: description.clone() });
                }
                return Err(UnpricedPart {
                    description,
                    oem_numbers: Vec::new(),
                    reason: error.code().to_owned(),
                });
            }
        };

        let pricing: PartPricing = self.vendors.price_part(&request).await;
        notes.flags.extend(pricing.flags());
        for failure in &pricing.failures {
            notes.issue(&EstimateError::from(failure.clone()));
        }

        let offers = pricing
            .offers
            .into_iter()
            .map(|offer| {
                let condition = classify_offer(&offer);
                (offer, condition)
            })
            .collect();

        match score_offers(&request.description, &request.oem_numbers(), offers, weights) {
            Ok(ranked) => Ok(PartSelection { request, ranked }),
            Err(error) => {
                notes.flags.push(format!("no_offers_available: {description}"));
                notes.issue(&error);
                notes.events.push(RoutingEvent::NoOffersAvailable {
                    description: description.to_owned(),
                });
                Err(UnpricedPart {
                    description: description.to_owned(),
                    oem_numbers: request.oem_numbers(),
                    reason: error.code().to_owned(),
                })
            }
        }
    }

    /// Pushes the result downstream only when routing allows it; anything else is held.
    pub async fn dispatch(
        &self,
        result: &PipelineResult,
        sink: &dyn EstimateSink,
    ) -> Result<DispatchOutcome, EstimateError> {
        let audit = AuditContext::new(
            result.run_id.clone(),
            Some(result.vehicle.vin.to_string()),
            result.correlation_id.clone(),
            self.actor.clone(),
        );
        if !result.routing.allows_dispatch() {
            self.audit_sink.emit(
                audit
                    .event(
                        "pipeline.dispatch_held",
                        AuditCategory::Dispatch,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("routing", result.routing.as_str()),
            );
            return Ok(DispatchOutcome::Held { decision: result.routing });
        }

        match sink.push_estimate(result).await {
            Ok(record_id) => {
                self.audit_sink.emit(
                    audit
                        .event(
                            "pipeline.dispatched",
                            AuditCategory::Dispatch,
                            AuditOutcome::Success,
                        )
                        .with_metadata("record_id", record_id.clone()),
                );
                Ok(DispatchOutcome::Dispatched { record_id })
            }
            Err(error) => {
                self.audit_sink.emit(
                    audit
                        .event(
                            "pipeline.dispatch_failed",
                            AuditCategory::Dispatch,
                            AuditOutcome::Failed,
                        )
                        .with_metadata("error", error.to_string()),
                );
                Err(EstimateError::CollaboratorUnavailable {
                    stage: PipelineStage::Dispatch,
                    collaborator: "estimate sink".to_owned(),
                    reason: error.to_string(),
                })
            }
        }
    }

    fn emit_stage(
        &self,
        audit: &AuditContext,
        stage: PipelineStage,
        outcome: AuditOutcome,
        metadata: &[(&str, String)],
    ) {
        let mut event = audit
            .event("pipeline.stage_completed", AuditCategory::from(stage), outcome)
            .with_metadata("stage", stage.as_str());
        for (key, value) in metadata {
            event = event.with_metadata(*key, value.clone());
        }
        self.audit_sink.emit(event);
    }
}

fn select_decode(
    vin: &Vin,
    decoded: Result<Vec<VehicleIdentity>, CollaboratorError>,
) -> Result<VehicleIdentity, EstimateError> {
    let mut variants = decoded.map_err(|error| EstimateError::DecodeUnavailable {
        vin: vin.to_string(),
        reason: error.to_string(),
    })?;
    match variants.len() {
        0 => Err(EstimateError::DecodeUnavailable {
            vin: vin.to_string(),
            reason: "decoder returned no vehicle record".to_owned(),
        }),
        1 => Ok(variants.remove(0)),
        _ => Err(EstimateError::AmbiguousDecode {
            vin: vin.to_string(),
            candidates: variants.iter().map(VehicleIdentity::describe).collect(),
        }),
    }
}

/// Whether any priced part is tagged remanufactured; surfaced in renderings as a disclosure.
pub fn has_remanufactured_parts(result: &PipelineResult) -> bool {
    result.priced_parts.iter().any(|part| part.condition == Some(Condition::Remanufactured))
}
