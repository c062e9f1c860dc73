use crate::domain::compliance::{ComplianceFlag, FlagKind, FlagSeverity, RecallRecord};

const RECALL_ACTION: &str = "Verify with dealer; repair may be free under recall";

/// Component families; a complaint and a recall match when both mention the same family.
const COMPONENT_FAMILIES: &[(&str, &[&str])] = &[
    ("brake", &["brake", "braking", "abs", "stopping"]),
    ("fuel", &["fuel", "gasoline", "fuel leak"]),
    ("engine", &["engine", "motor", "stall"]),
    ("steering", &["steering", "handling"]),
    ("airbag", &["airbag", "air bag", "srs"]),
    ("electrical", &["electrical", "battery", "short circuit", "fire"]),
    ("transmission", &["transmission", "gear", "shift"]),
    ("suspension", &["suspension", "shock", "strut"]),
    ("tire", &["tire", "tyre"]),
    ("cooling", &["coolant", "radiator", "overheat"]),
];

/// Keyword occurrence that starts a word, so "stall" does not fire inside "install".
fn mentions(text: &str, keyword: &str) -> bool {
    text.match_indices(keyword).any(|(index, _)| {
        text[..index].chars().next_back().map_or(true, |previous| !previous.is_alphanumeric())
    })
}

fn families_in(text: &str) -> Vec<&'static str> {
    COMPONENT_FAMILIES
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|keyword| mentions(text, keyword)))
        .map(|(family, _)| *family)
        .collect()
}

/// Returns the recalls whose component or summary shares a component family with the complaint.
pub fn match_complaint<'a>(complaint: &str, recalls: &'a [RecallRecord]) -> Vec<&'a RecallRecord> {
    let complaint_lower = complaint.to_lowercase();
    if complaint_lower.trim().is_empty() {
        return Vec::new();
    }
    let complaint_families = families_in(&complaint_lower);
    if complaint_families.is_empty() {
        return Vec::new();
    }

    recalls
        .iter()
        .filter(|recall| {
            let recall_text =
                format!("{} {}", recall.component, recall.summary).to_lowercase();
            families_in(&recall_text).iter().any(|family| complaint_families.contains(family))
        })
        .collect()
}

pub fn recall_flag(recall: &RecallRecord) -> ComplianceFlag {
    ComplianceFlag {
        kind: FlagKind::Recall,
        severity: FlagSeverity::Red,
        title: "Recall alert".to_owned(),
        message: format!(
            "Possible recall match: campaign {} ({})",
            recall.campaign_number,
            recall.component.trim()
        ),
        recommended_action: RECALL_ACTION.to_owned(),
        campaign_number: Some(recall.campaign_number.clone()),
        coverage: None,
    }
}

pub fn screen_recalls(complaint: &str, recalls: &[RecallRecord]) -> Vec<ComplianceFlag> {
    match_complaint(complaint, recalls).into_iter().map(recall_flag).collect()
}

#[cfg(test)]
mod tests {
    use super::{match_complaint, screen_recalls};
    use crate::domain::compliance::{FlagSeverity, RecallRecord};

    fn recall(campaign: &str, component: &str, summary: &str) -> RecallRecord {
        RecallRecord {
            campaign_number: campaign.to_owned(),
            component: component.to_owned(),
            summary: summary.to_owned(),
            consequence: String::new(),
            remedy: String::new(),
        }
    }

    #[test]
    fn brake_complaint_matches_brake_recall() {
        let recalls = vec![
            recall("21V123000", "SERVICE BRAKES, HYDRAULIC", "Brake master cylinder may leak."),
            recall("20V456000", "AIR BAGS", "Passenger air bag inflator may rupture."),
        ];

        let flags = screen_recalls("Grinding when braking, front brake pads worn", &recalls);

        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].severity, FlagSeverity::Red);
        assert_eq!(flags[0].campaign_number.as_deref(), Some("21V123000"));
        assert!(flags[0].recommended_action.contains("free under recall"));
    }

    #[test]
    fn matching_is_case_insensitive_on_component_text() {
        let recalls = vec![recall("19V001000", "FUEL SYSTEM, GASOLINE", "Fuel pump may fail.")];
        assert_eq!(match_complaint("FUEL PUMP whining", &recalls).len(), 1);
    }

    #[test]
    fn unrelated_recalls_and_empty_complaints_do_not_match() {
        let recalls =
            vec![recall("20V456000", "AIR BAGS", "Passenger air bag inflator may rupture.")];
        assert!(screen_recalls("oil change", &recalls).is_empty());
        assert!(screen_recalls("   ", &recalls).is_empty());
    }

    #[test]
    fn shared_filler_words_do_not_match_unrelated_recalls() {
        let recalls = vec![recall(
            "20V456000",
            "AIR BAGS",
            "Passenger air bag inflator may rupture and also send fragments during a crash.",
        )];
        let complaint = "Front brake pads grinding, also rotate tires during service";
        assert!(screen_recalls(complaint, &recalls).is_empty());
    }

    #[test]
    fn family_keywords_must_start_a_word() {
        let recalls = vec![recall("22V100000", "ENGINE", "Engine may stall at idle.")];
        assert!(match_complaint("install new wiper blades", &recalls).is_empty());
        assert_eq!(match_complaint("car stalls at lights", &recalls).len(), 1);
    }
}
