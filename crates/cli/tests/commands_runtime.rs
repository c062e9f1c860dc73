use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use estimaro_cli::commands::estimate::EstimateArgs;
use estimaro_cli::commands::score::ScoreArgs;
use estimaro_cli::commands::{config, doctor, estimate, score, vin};
use estimaro_core::config::{AppConfig, LoadOptions};
use serde_json::Value;

fn brake_args() -> EstimateArgs {
    EstimateArgs {
        vin: "1HGBH41JXMN109186".to_owned(),
        service_request: "Front brake pads grinding when stopping".to_owned(),
        customer_name: "Dana Whitfield".to_owned(),
        customer_phone: "555-0142".to_owned(),
        customer_email: None,
        odometer: Some(42_000),
        weights: None,
        live: false,
        dispatch: false,
        json: true,
    }
}

fn load_config() -> AppConfig {
    AppConfig::load(LoadOptions::default()).expect("default config should load")
}

#[test]
fn estimate_returns_ranked_vendors_against_demo_catalog() {
    with_env(&[], || {
        let result = estimate::run(brake_args(), &load_config());
        assert_eq!(result.exit_code, 0, "expected successful estimate");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "estimate");
        assert_eq!(payload["status"], "ok");

        let estimate = &payload["data"]["result"];
        assert_eq!(estimate["routing"], "AUTO_PROCEED");
        assert_eq!(estimate["classification"]["job_code"], "BRAKE-PAD");
        let ranked = estimate["selections"][0]["ranked"].as_array().expect("ranked offers");
        assert_eq!(ranked[0]["offer"]["brand"], "Bosch");
        assert_eq!(ranked[0]["selection"], "primary");
        assert_eq!(ranked[1]["selection"], "backup");
    });
}

#[test]
fn estimate_dispatch_reports_sink_record() {
    with_env(&[], || {
        let mut args = brake_args();
        args.dispatch = true;

        let payload = parse_payload(&estimate::run(args, &load_config()).output);
        assert_eq!(payload["data"]["dispatch"]["status"], "dispatched");
        assert_eq!(payload["data"]["dispatch"]["record_id"], "EST-0001");
    });
}

#[test]
fn estimate_human_output_tags_part_condition() {
    with_env(&[], || {
        let mut args = brake_args();
        args.json = false;

        let result = estimate::run(args, &load_config());
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("routing: AUTO_PROCEED"));
        assert!(result.output.contains("[NEW] Front brake pad set 45022-TVA-A01"));
        assert!(result.output.contains("Brake Service → Brake Cleaner"));
    });
}

#[test]
fn estimate_rejects_bad_check_digit_with_input_exit_code() {
    with_env(&[], || {
        let mut args = brake_args();
        args.vin = "1HGBH41J1MN109186".to_owned();

        let result = estimate::run(args, &load_config());
        assert_eq!(result.exit_code, 3);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "invalid_identifier");
    });
}

#[test]
fn live_estimate_requires_scraper_configuration() {
    with_env(&[], || {
        let mut args = brake_args();
        args.live = true;

        let result = estimate::run(args, &load_config());
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "integration_unconfigured");
    });
}

#[test]
fn vin_decodes_demo_vehicle() {
    with_env(&[], || {
        let result = vin::run("1hgbh41jxmn109186", true, false, &load_config());
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["message"], "1HGBH41JXMN109186 decodes to 2021 Honda Accord EX-L");
        assert_eq!(payload["data"]["world_manufacturer_identifier"], "1HG");
    });
}

#[test]
fn vin_failure_suggests_expected_check_digit() {
    with_env(&[], || {
        let result = vin::run("1HGBH41J1MN109186", false, false, &load_config());
        assert_eq!(result.exit_code, 3);

        let payload = parse_payload(&result.output);
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("check digit should be `X`"), "{message}");
    });
}

#[test]
fn score_ranks_offers_from_file() {
    with_env(&[], || {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("offers.json");
        let offers = serde_json::json!({
            "part_description": "Front brake pad set",
            "oem_numbers": ["45022-TVA-A01"],
            "offers": [
                offer("ssf", "Akebono", "Premium", "94.50", 25.0, "ProACT pads, brand new"),
                offer("worldpac", "Bosch", "OE Equivalent", "89.99", 12.0, "QuietCast - NEW"),
            ]
        });
        fs::write(&path, offers.to_string()).expect("write offers");

        let result = score::run(ScoreArgs { offers: path, weights: None }, &load_config());
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["ranked"][0]["offer"]["brand"], "Bosch");
        assert_eq!(payload["data"]["ranked"][0]["composite_score"], 86.0);
        assert_eq!(payload["data"]["ranked"][1]["composite_score"], 48.5);
    });
}

#[test]
fn score_reports_unreadable_input() {
    with_env(&[], || {
        let args = ScoreArgs { offers: "does-not-exist.json".into(), weights: None };
        let result = score::run(args, &load_config());
        assert_eq!(result.exit_code, 3);
        assert_eq!(parse_payload(&result.output)["error_class"], "input");
    });
}

#[test]
fn config_attributes_env_overrides() {
    let vars =
        [("ESTIMARO_SHOP_LABOR_RATE", "165"), ("ESTIMARO_SCRAPER_API_KEY", "sk-live-0123456789")];
    with_env(&vars, || {
        let output = config::run(LoadOptions::default());
        assert!(
            output.contains("- shop.labor_rate = 165 (source: env (ESTIMARO_SHOP_LABOR_RATE))")
        );
        assert!(output.contains("- shop.tax_rate = 0.0925 (source: default)"));
        assert!(output.contains("integrations.scraper_api_key = sk-l***"));
        assert!(!output.contains("0123456789"));
    });
}

#[test]
fn config_reports_validation_failure() {
    with_env(&[("ESTIMARO_SHOP_TAX_RATE", "1.5")], || {
        let output = config::run(LoadOptions::default());
        assert!(output.starts_with("config validation failed"));
    });
}

#[test]
fn doctor_passes_offline_and_skips_probes() {
    with_env(&[], || {
        let result = doctor::run(LoadOptions::default(), true, false);
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let report = parse_payload(&result.output);
        assert_eq!(report["overall_status"], "pass");
        let checks = report["checks"].as_array().expect("checks");
        let status_of = |name: &str| {
            checks
                .iter()
                .find(|check| check["name"] == name)
                .map(|check| check["status"].clone())
                .unwrap_or(Value::Null)
        };
        assert_eq!(status_of("demo_pipeline"), "pass");
        assert_eq!(status_of("scraper"), "skipped");
        assert_eq!(status_of("nhtsa"), "skipped");
    });
}

#[test]
fn doctor_fails_on_invalid_weights() {
    with_env(&[("ESTIMARO_SCORING_BRAND_WEIGHT", "-5")], || {
        let result = doctor::run(LoadOptions::default(), false, false);
        assert_eq!(result.exit_code, 1);
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [fail] config_validation"));
    });
}

fn offer(
    vendor_id: &str,
    brand: &str,
    tier: &str,
    price: &str,
    distance: f64,
    description: &str,
) -> Value {
    serde_json::json!({
        "vendor_id": vendor_id,
        "vendor_name": vendor_id,
        "oem_number": "45022-TVA-A01",
        "brand": brand,
        "brand_tier": tier,
        "price": price,
        "stock_status": "in_stock",
        "stock_quantity": 4,
        "warehouse_distance_miles": distance,
        "delivery_option": null,
        "warranty_term": null,
        "raw_description": description
    })
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "ESTIMARO_SHOP_LABOR_RATE",
        "ESTIMARO_SHOP_PARTS_MARKUP_PCT",
        "ESTIMARO_SHOP_TAX_RATE",
        "ESTIMARO_SHOP_PARTS_ROUNDING",
        "ESTIMARO_SCORING_BRAND_WEIGHT",
        "ESTIMARO_SCORING_PRICE_WEIGHT",
        "ESTIMARO_SCORING_DISTANCE_WEIGHT",
        "ESTIMARO_VENDORS_CALL_TIMEOUT_MS",
        "ESTIMARO_VENDORS_PART_TIMEOUT_MS",
        "ESTIMARO_VENDORS_MAX_RETRIES",
        "ESTIMARO_VENDORS_RETRY_BACKOFF_MS",
        "ESTIMARO_VENDORS_REQUESTS_PER_SECOND",
        "ESTIMARO_ROUTING_QUICK_REVIEW_THRESHOLD",
        "ESTIMARO_ROUTING_AUTO_PROCEED_THRESHOLD",
        "ESTIMARO_ROUTING_MIN_DESCRIPTION_CHARS",
        "ESTIMARO_NHTSA_DECODE_URL",
        "ESTIMARO_NHTSA_RECALLS_URL",
        "ESTIMARO_SCRAPER_BASE_URL",
        "ESTIMARO_SCRAPER_API_KEY",
        "ESTIMARO_HTTP_TIMEOUT_SECS",
        "ESTIMARO_LOGGING_LEVEL",
        "ESTIMARO_LOGGING_FORMAT",
        "ESTIMARO_LOG_LEVEL",
        "ESTIMARO_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
