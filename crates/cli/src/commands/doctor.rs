use estimaro_core::collaborators::VehicleDecoder;
use estimaro_core::config::{AppConfig, LoadOptions};
use estimaro_core::fixtures::demo_pipeline;
use estimaro_core::integrations::{NhtsaClient, ScraperClient};
use estimaro_core::pipeline::EstimateIntake;
use estimaro_core::vin::Vin;
use serde::Serialize;
use tokio::runtime::Runtime;

use super::{escape_json, runtime, CommandResult};

const PROBE_VIN: &str = "1HGBH41JXMN109186";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Skipped, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(options: LoadOptions, json_output: bool, probe: bool) -> CommandResult {
    let report = build_report(options, probe);
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\
                 \"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: LoadOptions, probe: bool) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks
                .push(DoctorCheck::pass("config_validation", "configuration loaded and validated"));
            checks.push(check_scoring_weights(&config));
            checks.push(check_vendor_policy(&config));
            match runtime("doctor") {
                Ok(runtime) => {
                    checks.push(check_demo_pipeline(&config, &runtime));
                    checks.push(check_scraper(&config, &runtime, probe));
                    checks.push(check_nhtsa(&config, &runtime, probe));
                }
                Err(result) => checks.push(DoctorCheck::fail("async_runtime", result.output)),
            }
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            for name in ["scoring_weights", "vendor_policy", "demo_pipeline", "scraper", "nhtsa"] {
                checks.push(DoctorCheck::skipped(
                    name,
                    "skipped because configuration did not load",
                ));
            }
        }
    }

    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let (overall_status, summary) = if any_failed {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed".to_owned())
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed".to_owned())
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_scoring_weights(config: &AppConfig) -> DoctorCheck {
    match config.scoring.weights().normalized() {
        Ok(weights) => DoctorCheck::pass(
            "scoring_weights",
            format!(
                "brand {:.1} / price {:.1} / distance {:.1}",
                weights.brand, weights.price, weights.distance
            ),
        ),
        Err(error) => DoctorCheck::fail("scoring_weights", error.to_string()),
    }
}

fn check_vendor_policy(config: &AppConfig) -> DoctorCheck {
    let vendors = &config.vendors;
    let attempts = u64::from(vendors.max_retries) + 1;
    let backoff: u64 = (0..vendors.max_retries)
        .map(|attempt| {
            let multiplier = 1_u64 << attempt.min(16);
            vendors.retry_backoff_ms.saturating_mul(multiplier).min(vendors.max_backoff_ms)
        })
        .sum();
    let worst_case = attempts.saturating_mul(vendors.call_timeout_ms).saturating_add(backoff);
    let note = if worst_case > vendors.part_timeout_ms {
        "; later retries are cut off by the part deadline"
    } else {
        ""
    };
    DoctorCheck::pass(
        "vendor_policy",
        format!(
            "{} retries, {}ms per call, {}ms per part, worst case {}ms{}",
            vendors.max_retries,
            vendors.call_timeout_ms,
            vendors.part_timeout_ms,
            worst_case,
            note
        ),
    )
}

fn check_demo_pipeline(config: &AppConfig, runtime: &Runtime) -> DoctorCheck {
    let pipeline = demo_pipeline(config.pipeline()).with_actor("doctor");
    let intake = EstimateIntake {
        vin: PROBE_VIN.to_owned(),
        service_request: "Front brake pads grinding".to_owned(),
        customer_name: "Doctor Check".to_owned(),
        customer_phone: "555-0100".to_owned(),
        customer_email: None,
        odometer: Some(30_000),
        vendor_weights: None,
    };

    match runtime.block_on(pipeline.generate_estimate(intake)) {
        Ok(result) => DoctorCheck::pass(
            "demo_pipeline",
            format!(
                "demo estimate {} routed {}",
                result.breakdown.grand_total,
                result.routing.as_str()
            ),
        ),
        Err(error) => DoctorCheck::fail("demo_pipeline", error.to_string()),
    }
}

fn check_scraper(config: &AppConfig, runtime: &Runtime, probe: bool) -> DoctorCheck {
    let client = match ScraperClient::from_config(&config.integrations) {
        Ok(Some(client)) => client,
        Ok(None) => {
            return DoctorCheck::skipped("scraper", "scraper_base_url/scraper_api_key not set")
        }
        Err(error) => return DoctorCheck::fail("scraper", error.to_string()),
    };
    if !probe {
        return DoctorCheck::pass("scraper", "configured (pass --probe to call /health)");
    }
    match runtime.block_on(client.health()) {
        Ok(()) => DoctorCheck::pass("scraper", "/health answered"),
        Err(error) => DoctorCheck::fail("scraper", error.to_string()),
    }
}

fn check_nhtsa(config: &AppConfig, runtime: &Runtime, probe: bool) -> DoctorCheck {
    if !probe {
        return DoctorCheck::skipped("nhtsa", "pass --probe to decode a known VIN");
    }
    let client = match NhtsaClient::new(&config.integrations) {
        Ok(client) => client,
        Err(error) => return DoctorCheck::fail("nhtsa", error.to_string()),
    };
    let vin = match Vin::parse(PROBE_VIN) {
        Ok(vin) => vin,
        Err(error) => return DoctorCheck::fail("nhtsa", error.to_string()),
    };
    match runtime.block_on(client.decode(&vin)) {
        Ok(variants) if !variants.is_empty() => {
            DoctorCheck::pass("nhtsa", format!("decoded {PROBE_VIN} via vPIC"))
        }
        Ok(_) => DoctorCheck::fail("nhtsa", "vPIC returned no vehicle record"),
        Err(error) => DoctorCheck::fail("nhtsa", error.to_string()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
