pub mod confidence;
pub mod engine;
pub mod states;

pub use confidence::{confidence_score, ConfidenceScore, ConfidenceSignals, Deduction};
pub use engine::RoutingEngine;
pub use states::{RoutingDecision, RoutingEvent, TransitionOutcome};
