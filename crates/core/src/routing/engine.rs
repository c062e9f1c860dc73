use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::config::RoutingConfig;
use crate::routing::states::{RoutingDecision, RoutingEvent, TransitionOutcome};

pub struct RoutingEngine {
    quick_review_threshold: f64,
    auto_proceed_threshold: f64,
}

impl Default for RoutingEngine {
    fn default() -> Self {
        Self::new(&RoutingConfig::default())
    }
}

impl RoutingEngine {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            quick_review_threshold: config.quick_review_threshold,
            auto_proceed_threshold: config.auto_proceed_threshold,
        }
    }

    /// Band of the job classification confidence. Lower bounds are inclusive.
    pub fn initial_state(&self, classification_confidence: f64) -> RoutingDecision {
        if classification_confidence >= self.auto_proceed_threshold {
            RoutingDecision::AutoProceed
        } else if classification_confidence >= self.quick_review_threshold {
            RoutingDecision::QuickReview
        } else {
            RoutingDecision::HumanRequired
        }
    }

    pub fn apply(&self, current: RoutingDecision, event: &RoutingEvent) -> TransitionOutcome {
        TransitionOutcome { from: current, to: transition(current, event), event: event.clone() }
    }

    pub fn apply_with_audit<S>(
        &self,
        current: RoutingDecision,
        event: &RoutingEvent,
        sink: &S,
        audit: &AuditContext,
    ) -> TransitionOutcome
    where
        S: AuditSink + ?Sized,
    {
        let outcome = self.apply(current, event);
        let (event_type, audit_outcome) = if outcome.changed() {
            ("routing.transition_applied", AuditOutcome::Success)
        } else {
            ("routing.transition_absorbed", AuditOutcome::Rejected)
        };
        sink.emit(
            audit
                .event(event_type, AuditCategory::Routing, audit_outcome)
                .with_metadata("from", outcome.from.as_str())
                .with_metadata("to", outcome.to.as_str())
                .with_metadata("event", event.name()),
        );
        outcome
    }

    /// Folds every event over the initial state, keeping the transitions that changed it.
    pub fn resolve<S>(
        &self,
        initial: RoutingDecision,
        events: &[RoutingEvent],
        sink: &S,
        audit: &AuditContext,
    ) -> (RoutingDecision, Vec<TransitionOutcome>)
    where
        S: AuditSink + ?Sized,
    {
        let mut current = initial;
        let mut history = Vec::new();
        for event in events {
            let outcome = self.apply_with_audit(current, event, sink, audit);
            current = outcome.to;
            if outcome.changed() {
                history.push(outcome);
            }
        }
        (current, history)
    }
}

fn transition(current: RoutingDecision, event: &RoutingEvent) -> RoutingDecision {
    use RoutingDecision::{AutoProceed, Blocked, HumanRequired, QuickReview};

    match (current, event) {
        (Blocked, _) => Blocked,
        (_, RoutingEvent::RedComplianceFlag { .. }) => Blocked,
        (HumanRequired, _) => HumanRequired,
        (_, RoutingEvent::LaborNotFound { .. } | RoutingEvent::LaborCatalogUnavailable { .. }) => {
            HumanRequired
        }
        (AutoProceed, _) => QuickReview,
        (QuickReview, _) => QuickReview,
    }
}
