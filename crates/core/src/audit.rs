use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::PipelineStage;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditCategory {
    Intake,
    Vehicle,
    Compliance,
    Pricing,
    Routing,
    Dispatch,
    System,
}

impl From<PipelineStage> for AuditCategory {
    fn from(stage: PipelineStage) -> Self {
        match stage {
            PipelineStage::Intake | PipelineStage::JobClassification => Self::Intake,
            PipelineStage::VehicleIdentity => Self::Vehicle,
            PipelineStage::Compliance => Self::Compliance,
            PipelineStage::Labor
            | PipelineStage::AddOns
            | PipelineStage::PartCatalog
            | PipelineStage::VendorPricing
            | PipelineStage::PartCondition
            | PipelineStage::VendorSelection
            | PipelineStage::EstimateCalculation => Self::Pricing,
            PipelineStage::Confidence => Self::Routing,
            PipelineStage::Dispatch => Self::Dispatch,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Degraded,
    Rejected,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    pub run_id: String,
    pub vin: Option<String>,
    pub correlation_id: String,
    pub actor: String,
}

impl AuditContext {
    pub fn new(
        run_id: impl Into<String>,
        vin: Option<String>,
        correlation_id: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            vin,
            correlation_id: correlation_id.into(),
            actor: actor.into(),
        }
    }

    pub fn event(
        &self,
        event_type: impl Into<String>,
        category: AuditCategory,
        outcome: AuditOutcome,
    ) -> AuditEvent {
        AuditEvent::new(
            Some(self.run_id.clone()),
            self.vin.clone(),
            self.correlation_id.clone(),
            event_type,
            category,
            self.actor.clone(),
            outcome,
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub run_id: Option<String>,
    pub vin: Option<String>,
    pub correlation_id: String,
    pub event_type: String,
    pub category: AuditCategory,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        run_id: Option<String>,
        vin: Option<String>,
        correlation_id: impl Into<String>,
        event_type: impl Into<String>,
        category: AuditCategory,
        actor: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            run_id,
            vin,
            correlation_id: correlation_id.into(),
            event_type: event_type.into(),
            category,
            actor: actor.into(),
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Sink that drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn emit(&self, _event: AuditEvent) {}
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn event_types(&self) -> Vec<String> {
        self.events().into_iter().map(|event| event.event_type).collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink, InMemoryAuditSink},
        domain::PipelineStage,
    };

    #[test]
    fn in_memory_sink_records_events_with_run_fields() {
        let sink = InMemoryAuditSink::default();
        let vin = Some("1HGBH41JXMN109186".to_owned());
        let context = AuditContext::new("run-42", vin, "req-123", "pipeline");
        sink.emit(
            context
                .event("vendor.pricing_completed", AuditCategory::Pricing, AuditOutcome::Degraded)
                .with_metadata("vendor_unavailable", "ssf"),
        );

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].correlation_id, "req-123");
        assert_eq!(events[0].run_id.as_deref(), Some("run-42"));
        assert_eq!(events[0].vin.as_deref(), Some("1HGBH41JXMN109186"));
        assert_eq!(events[0].metadata.get("vendor_unavailable").map(String::as_str), Some("ssf"));
        assert_eq!(sink.event_types(), vec!["vendor.pricing_completed".to_owned()]);
    }

    #[test]
    fn stages_map_to_audit_categories() {
        assert_eq!(AuditCategory::from(PipelineStage::VendorPricing), AuditCategory::Pricing);
        assert_eq!(AuditCategory::from(PipelineStage::Compliance), AuditCategory::Compliance);
        assert_eq!(AuditCategory::from(PipelineStage::Dispatch), AuditCategory::Dispatch);
    }
}
