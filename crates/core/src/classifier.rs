//! Keyword classification of free-text service requests into job codes.

use async_trait::async_trait;

use crate::collaborators::{CollaboratorResult, JobClassifier};
use crate::domain::job::{JobClassification, JobType};

pub const GENERAL_DIAGNOSIS: &str = "GEN-DIAG";

const PHRASE_CONFIDENCE: f64 = 0.92;
const WORD_CONFIDENCE: f64 = 0.78;
const EXTRA_KEYWORD_BONUS: f64 = 0.03;
const MAX_CONFIDENCE: f64 = 0.98;
const CONFLICT_PENALTY: f64 = 0.15;
const FALLBACK_CONFIDENCE: f64 = 0.35;

struct JobRule {
    job_code: &'static str,
    title: &'static str,
    category: JobType,
    keywords: &'static [&'static str],
}

/// Evaluated in order; the first rule with a keyword hit wins.
const RULES: &[JobRule] = &[
    JobRule {
        job_code: "BRAKE-PAD",
        title: "Brake pad replacement",
        category: JobType::BrakeService,
        keywords: &["brake pads", "brake pad", "pads", "squeal", "squeak", "grinding"],
    },
    JobRule {
        job_code: "BRAKE-ROTOR",
        title: "Brake rotor replacement",
        category: JobType::BrakeService,
        keywords: &["brake rotors", "brake rotor", "rotors", "rotor", "pulsation"],
    },
    JobRule {
        job_code: "BRAKE-CALIPER",
        title: "Brake caliper replacement",
        category: JobType::BrakeService,
        keywords: &["brake caliper", "caliper", "sticking brake"],
    },
    JobRule {
        job_code: "OIL-CHANGE",
        title: "Engine oil and filter change",
        category: JobType::Maintenance,
        keywords: &["oil change", "oil and filter", "change oil", "oil service"],
    },
    JobRule {
        job_code: "TIMING-BELT",
        title: "Timing belt replacement",
        category: JobType::EngineRepair,
        keywords: &["timing belt", "timing chain", "timing"],
    },
    JobRule {
        job_code: "VALVE-COVER",
        title: "Valve cover gasket replacement",
        category: JobType::EngineRepair,
        keywords: &["valve cover gasket", "valve cover", "oil leak"],
    },
    JobRule {
        job_code: "INTAKE-GASKET",
        title: "Intake manifold gasket replacement",
        category: JobType::EngineRepair,
        keywords: &["intake manifold", "intake gasket", "plenum", "vacuum leak"],
    },
    JobRule {
        job_code: "COOLANT-FLUSH",
        title: "Cooling system flush",
        category: JobType::Cooling,
        keywords: &["coolant flush", "radiator flush", "coolant", "overheating", "thermostat"],
    },
    JobRule {
        job_code: "TRANS-SERVICE",
        title: "Transmission fluid service",
        category: JobType::Transmission,
        keywords: &["transmission fluid", "transmission service", "trans flush", "transmission"],
    },
    JobRule {
        job_code: "SUSP-STRUT",
        title: "Strut assembly replacement",
        category: JobType::Suspension,
        keywords: &["struts", "strut", "shocks", "shock absorber", "bouncy ride"],
    },
    JobRule {
        job_code: "AC-SERVICE",
        title: "A/C system service",
        category: JobType::AcService,
        keywords: &["air conditioning", "a/c", "ac not cold", "ac recharge", "compressor"],
    },
    JobRule {
        job_code: "BATTERY",
        title: "Battery replacement",
        category: JobType::Electrical,
        keywords: &["battery", "won't start", "dead battery"],
    },
    JobRule {
        job_code: "ALTERNATOR",
        title: "Alternator replacement",
        category: JobType::Electrical,
        keywords: &["alternator", "charging system", "battery light"],
    },
    JobRule {
        job_code: "STARTER",
        title: "Starter motor replacement",
        category: JobType::Electrical,
        keywords: &["starter motor", "starter", "clicking"],
    },
    JobRule {
        job_code: "EXHAUST",
        title: "Exhaust system repair",
        category: JobType::General,
        keywords: &["exhaust", "muffler", "catalytic converter"],
    },
];

pub fn job_title(job_code: &str) -> &'static str {
    RULES
        .iter()
        .find(|rule| rule.job_code.eq_ignore_ascii_case(job_code))
        .map(|rule| rule.title)
        .unwrap_or("General diagnosis")
}

pub fn job_type_for(job_code: &str) -> JobType {
    RULES
        .iter()
        .find(|rule| rule.job_code.eq_ignore_ascii_case(job_code))
        .map(|rule| rule.category)
        .unwrap_or(JobType::General)
}

/// Word-boundary containment so "pads" does not fire on "launchpads".
fn contains_term(haystack: &str, term: &str) -> bool {
    let is_boundary = |ch: Option<char>| ch.map(|ch| !ch.is_alphanumeric()).unwrap_or(true);
    haystack.match_indices(term).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + matched.len()..].chars().next();
        is_boundary(before) && is_boundary(after)
    })
}

fn matched_keywords(rule: &JobRule, text: &str) -> Vec<String> {
    let mut matched: Vec<String> = Vec::new();
    for keyword in rule.keywords {
        let subsumed = matched.iter().any(|existing| existing.contains(keyword));
        if !subsumed && contains_term(text, keyword) {
            matched.push((*keyword).to_owned());
        }
    }
    matched
}

pub fn classify_text(service_request: &str) -> JobClassification {
    let text = service_request.trim().to_lowercase();
    let hits: Vec<(&JobRule, Vec<String>)> = RULES
        .iter()
        .map(|rule| (rule, matched_keywords(rule, &text)))
        .filter(|(_, keywords)| !keywords.is_empty())
        .collect();

    let Some((rule, keywords)) = hits.first() else {
        return JobClassification {
            category: JobType::General,
            job_code: GENERAL_DIAGNOSIS.to_owned(),
            confidence: FALLBACK_CONFIDENCE,
            matched_keywords: Vec::new(),
        };
    };

    let strongest_is_phrase = keywords.iter().any(|keyword| keyword.contains(' '));
    let mut confidence = if strongest_is_phrase { PHRASE_CONFIDENCE } else { WORD_CONFIDENCE };
    confidence += EXTRA_KEYWORD_BONUS * (keywords.len().saturating_sub(1)) as f64;
    confidence = confidence.min(MAX_CONFIDENCE);

    let conflicting = hits.iter().skip(1).any(|(other, _)| other.category != rule.category);
    if conflicting {
        confidence -= CONFLICT_PENALTY;
    }

    JobClassification {
        category: rule.category,
        job_code: rule.job_code.to_owned(),
        confidence: (confidence * 100.0).round() / 100.0,
        matched_keywords: keywords.clone(),
    }
}

/// In-process classifier used when no external classification service is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordJobClassifier;

#[async_trait]
impl JobClassifier for KeywordJobClassifier {
    async fn classify(&self, service_request: &str) -> CollaboratorResult<JobClassification> {
        Ok(classify_text(service_request))
    }
}
