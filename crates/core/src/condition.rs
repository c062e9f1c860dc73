//! NEW / REMANUFACTURED disclosure from vendor description text.
//!
//! Rules are checked in a fixed order and the first hit wins: remanufactured keywords,
//! then explicit "new" phrases, then a bare `NEW` token. Anything else needs a human.

use std::sync::OnceLock;

use regex::Regex;
use tracing::error;

use crate::domain::offer::VendorOffer;
use crate::domain::parts::{Condition, ConditionConfidence, PartCondition};

const REMAN_KEYWORDS: &[&str] = &[
    "REMANUFACTURED",
    "RECONDITIONED",
    "REFURBISHED",
    "CORE CHARGE",
    "EXCHANGE",
    "REBUILT",
    "REFURB",
    "REMAN",
    "RMFD",
    "RECO",
    "RMN",
    "RFB",
];

const STRONG_NEW_PHRASES: &[&str] =
    &["100% NEW", "BRAND NEW", "NEW OEM", "NEW AFTERMARKET", "FACTORY NEW", "GENUINE NEW"];

struct ConditionRule {
    condition: Condition,
    confidence: ConditionConfidence,
    pattern: Regex,
}

fn keyword_pattern(keywords: &[&str]) -> Result<Regex, regex::Error> {
    let alternation = keywords
        .iter()
        .map(|keyword| {
            keyword.split_whitespace().map(regex::escape).collect::<Vec<_>>().join(r"\s+")
        })
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?:^|[^A-Z0-9])({alternation})(?:$|[^A-Z0-9])"))
}

fn build_rules() -> Result<Vec<ConditionRule>, regex::Error> {
    Ok(vec![
        ConditionRule {
            condition: Condition::Remanufactured,
            confidence: ConditionConfidence::High,
            pattern: keyword_pattern(REMAN_KEYWORDS)?,
        },
        ConditionRule {
            condition: Condition::New,
            confidence: ConditionConfidence::High,
            pattern: keyword_pattern(STRONG_NEW_PHRASES)?,
        },
        ConditionRule {
            condition: Condition::New,
            confidence: ConditionConfidence::Medium,
            pattern: keyword_pattern(&["NEW"])?,
        },
    ])
}

fn rules() -> Option<&'static [ConditionRule]> {
    static RULES: OnceLock<Option<Vec<ConditionRule>>> = OnceLock::new();
    RULES
        .get_or_init(|| match build_rules() {
            Ok(rules) => Some(rules),
            Err(err) => {
                error!(
                    event_name = "condition.rules_invalid",
                    error = %err,
                    "condition rules failed to compile"
                );
                None
            }
        })
        .as_deref()
}

fn unknown() -> PartCondition {
    PartCondition {
        condition: Condition::Unknown,
        confidence: ConditionConfidence::Low,
        matched_keyword: None,
        requires_manual_selection: true,
    }
}

pub fn classify_condition(description: &str) -> PartCondition {
    let text = description.to_uppercase();
    if text.trim().is_empty() {
        return unknown();
    }
    let Some(rules) = rules() else {
        return unknown();
    };

    for rule in rules {
        if let Some(captures) = rule.pattern.captures(&text) {
            let keyword = captures
                .get(1)
                .map(|matched| matched.as_str().split_whitespace().collect::<Vec<_>>().join(" "));
            return PartCondition {
                condition: rule.condition,
                confidence: rule.confidence,
                matched_keyword: keyword,
                requires_manual_selection: false,
            };
        }
    }

    unknown()
}

/// Brand is appended so listings like "Cardone Reman" are caught even with a bare description.
pub fn classify_offer(offer: &VendorOffer) -> PartCondition {
    classify_condition(&format!("{} {}", offer.raw_description, offer.brand))
}

#[cfg(test)]
mod tests {
    use super::classify_condition;
    use crate::domain::parts::{Condition, ConditionConfidence};

    #[test]
    fn reman_keyword_wins_over_bare_new() {
        let result = classify_condition("REBUILT ALTERNATOR - NEW CORE");
        assert_eq!(result.condition, Condition::Remanufactured);
        assert_eq!(result.confidence, ConditionConfidence::High);
        assert_eq!(result.matched_keyword.as_deref(), Some("REBUILT"));
    }

    #[test]
    fn reman_keyword_wins_over_strong_new_phrase() {
        let result = classify_condition("Brand new housing, core charge applies");
        assert_eq!(result.condition, Condition::Remanufactured);
        assert_eq!(result.matched_keyword.as_deref(), Some("CORE CHARGE"));
    }

    #[test]
    fn strong_new_phrases_are_high_confidence() {
        for description in ["100% New Starter", "brand   new caliper", "Genuine New OE pad set"] {
            let result = classify_condition(description);
            assert_eq!(result.condition, Condition::New, "{description}");
            assert_eq!(result.confidence, ConditionConfidence::High, "{description}");
        }
    }

    #[test]
    fn bare_new_is_medium_confidence() {
        let result = classify_condition("Ceramic pad set (new)");
        assert_eq!(result.condition, Condition::New);
        assert_eq!(result.confidence, ConditionConfidence::Medium);
        assert!(!result.requires_manual_selection);
    }

    #[test]
    fn keywords_need_word_boundaries() {
        let result = classify_condition("Renewed bracket, recommended torque spec, heat exchanger");
        assert_eq!(result.condition, Condition::Unknown);
        assert_eq!(result.confidence, ConditionConfidence::Low);
        assert!(result.requires_manual_selection);
        assert_eq!(result.matched_keyword, None);
    }

    #[test]
    fn blank_description_is_unknown() {
        assert!(classify_condition("   ").requires_manual_selection);
    }
}
