//! Intake-quality score: 100 points less fixed deductions, floored at zero, reported as 0-1.

use serde::{Deserialize, Serialize};

use crate::config::RoutingConfig;

const INVALID_VIN_POINTS: u32 = 30;
const LOW_CLASSIFICATION_POINTS: u32 = 20;
const MISSING_PHONE_POINTS: u32 = 15;
const MISSING_NAME_POINTS: u32 = 10;
const SHORT_DESCRIPTION_POINTS: u32 = 15;

#[derive(Clone, Debug, PartialEq)]
pub struct ConfidenceSignals<'a> {
    pub vin_valid: bool,
    pub classification_confidence: f64,
    pub customer_name: &'a str,
    pub customer_phone: &'a str,
    pub service_request: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deduction {
    pub reason: String,
    pub points: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    pub score: f64,
    pub deductions: Vec<Deduction>,
}

pub fn confidence_score(
    signals: &ConfidenceSignals<'_>,
    config: &RoutingConfig,
) -> ConfidenceScore {
    let mut deductions = Vec::new();
    let mut deduct = |reason: &str, points: u32| {
        deductions.push(Deduction { reason: reason.to_owned(), points });
    };

    if !signals.vin_valid {
        deduct("invalid_vin", INVALID_VIN_POINTS);
    }
    if signals.classification_confidence < config.quick_review_threshold {
        deduct("low_classification_confidence", LOW_CLASSIFICATION_POINTS);
    }
    if signals.customer_phone.trim().is_empty() {
        deduct("missing_phone", MISSING_PHONE_POINTS);
    }
    if signals.customer_name.trim().is_empty() {
        deduct("missing_name", MISSING_NAME_POINTS);
    }
    if signals.service_request.trim().chars().count() < config.min_description_chars {
        deduct("short_description", SHORT_DESCRIPTION_POINTS);
    }

    ConfidenceScore { score: f64::from(remaining_points(&deductions)) / 100.0, deductions }
}

fn remaining_points(deductions: &[Deduction]) -> u32 {
    let total = deductions
        .iter()
        .fold(0_u32, |sum, deduction| sum.saturating_add(deduction.points));
    100_u32.saturating_sub(total)
}

#[cfg(test)]
mod tests {
    use super::{confidence_score, remaining_points, ConfidenceSignals, Deduction};
    use crate::config::RoutingConfig;

    fn complete() -> ConfidenceSignals<'static> {
        ConfidenceSignals {
            vin_valid: true,
            classification_confidence: 0.92,
            customer_name: "Dana Ortiz",
            customer_phone: "555-0142",
            service_request: "Front brake pads squealing",
        }
    }

    #[test]
    fn complete_intake_scores_full_confidence() {
        let score = confidence_score(&complete(), &RoutingConfig::default());
        assert_eq!(score.score, 1.0);
        assert!(score.deductions.is_empty());
    }

    #[test]
    fn missing_contact_details_deduct() {
        let signals = ConfidenceSignals { customer_name: "", customer_phone: " ", ..complete() };
        let score = confidence_score(&signals, &RoutingConfig::default());
        assert_eq!(score.score, 0.75);
        assert_eq!(score.deductions.len(), 2);
    }

    #[test]
    fn every_deduction_applies_in_a_fixed_order() {
        let signals = ConfidenceSignals {
            vin_valid: false,
            classification_confidence: 0.35,
            customer_name: "",
            customer_phone: "",
            service_request: "noise",
        };
        let score = confidence_score(&signals, &RoutingConfig::default());
        assert_eq!(score.score, 0.1);
        assert_eq!(
            score.deductions.iter().map(|deduction| deduction.reason.as_str()).collect::<Vec<_>>(),
            vec![
                "invalid_vin",
                "low_classification_confidence",
                "missing_phone",
                "missing_name",
                "short_description",
            ]
        );
    }

    #[test]
    fn deductions_past_one_hundred_points_floor_at_zero() {
        let deduction = |points| Deduction { reason: "manual".to_owned(), points };
        assert_eq!(remaining_points(&[deduction(60), deduction(55)]), 0);
        assert_eq!(remaining_points(&[deduction(u32::MAX), deduction(1)]), 0);
        assert_eq!(remaining_points(&[deduction(40)]), 60);
    }
}
