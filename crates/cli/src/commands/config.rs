use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use estimaro_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run(options: LoadOptions) -> String {
    let explicit_path = options.config_path.clone();
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(explicit_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let shop = &config.shop;
    let scoring = &config.scoring;
    let vendors = &config.vendors;
    let routing = &config.routing;
    let integrations = &config.integrations;
    let scraper_api_key = integrations
        .scraper_api_key
        .as_ref()
        .map(|key| redact_key(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_owned());

    let fields: Vec<(&str, String, &str)> = vec![
        ("shop.labor_rate", shop.labor_rate.to_string(), "ESTIMARO_SHOP_LABOR_RATE"),
        (
            "shop.parts_markup_pct",
            shop.parts_markup_pct.to_string(),
            "ESTIMARO_SHOP_PARTS_MARKUP_PCT",
        ),
        ("shop.tax_rate", shop.tax_rate.to_string(), "ESTIMARO_SHOP_TAX_RATE"),
        (
            "shop.parts_rounding",
            format!("{:?}", shop.parts_rounding),
            "ESTIMARO_SHOP_PARTS_ROUNDING",
        ),
        ("scoring.brand_weight", scoring.brand_weight.to_string(), "ESTIMARO_SCORING_BRAND_WEIGHT"),
        ("scoring.price_weight", scoring.price_weight.to_string(), "ESTIMARO_SCORING_PRICE_WEIGHT"),
        (
            "scoring.distance_weight",
            scoring.distance_weight.to_string(),
            "ESTIMARO_SCORING_DISTANCE_WEIGHT",
        ),
        (
            "vendors.call_timeout_ms",
            vendors.call_timeout_ms.to_string(),
            "ESTIMARO_VENDORS_CALL_TIMEOUT_MS",
        ),
        (
            "vendors.part_timeout_ms",
            vendors.part_timeout_ms.to_string(),
            "ESTIMARO_VENDORS_PART_TIMEOUT_MS",
        ),
        ("vendors.max_retries", vendors.max_retries.to_string(), "ESTIMARO_VENDORS_MAX_RETRIES"),
        (
            "vendors.retry_backoff_ms",
            vendors.retry_backoff_ms.to_string(),
            "ESTIMARO_VENDORS_RETRY_BACKOFF_MS",
        ),
        (
            "vendors.requests_per_second",
            vendors
                .requests_per_second
                .map(|rps| rps.to_string())
                .unwrap_or_else(|| "<unlimited>".to_owned()),
            "ESTIMARO_VENDORS_REQUESTS_PER_SECOND",
        ),
        (
            "routing.quick_review_threshold",
            routing.quick_review_threshold.to_string(),
            "ESTIMARO_ROUTING_QUICK_REVIEW_THRESHOLD",
        ),
        (
            "routing.auto_proceed_threshold",
            routing.auto_proceed_threshold.to_string(),
            "ESTIMARO_ROUTING_AUTO_PROCEED_THRESHOLD",
        ),
        (
            "integrations.nhtsa_decode_base_url",
            integrations.nhtsa_decode_base_url.clone(),
            "ESTIMARO_NHTSA_DECODE_URL",
        ),
        (
            "integrations.nhtsa_recalls_base_url",
            integrations.nhtsa_recalls_base_url.clone(),
            "ESTIMARO_NHTSA_RECALLS_URL",
        ),
        (
            "integrations.scraper_base_url",
            integrations.scraper_base_url.clone().unwrap_or_else(|| "<unset>".to_owned()),
            "ESTIMARO_SCRAPER_BASE_URL",
        ),
        ("integrations.scraper_api_key", scraper_api_key, "ESTIMARO_SCRAPER_API_KEY"),
        (
            "integrations.http_timeout_secs",
            integrations.http_timeout_secs.to_string(),
            "ESTIMARO_HTTP_TIMEOUT_SECS",
        ),
        ("logging.level", config.logging.level.clone(), "ESTIMARO_LOGGING_LEVEL"),
        ("logging.format", format!("{:?}", config.logging.format), "ESTIMARO_LOGGING_FORMAT"),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_owned()];
    for (key, value, env_key) in fields {
        let source =
            field_source(key, env_key, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }

    lines.join("\n")
}

fn detect_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then_some(path);
    }

    [PathBuf::from("estimaro.toml"), PathBuf::from("config/estimaro.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_owned());
            return format!("file ({file_path})");
        }
    }

    "default".to_owned()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the first four characters so operators can tell keys apart.
fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_owned();
    }
    if trimmed.chars().count() > 8 {
        let prefix: String = trimmed.chars().take(4).collect();
        return format!("{prefix}***");
    }

    "<redacted>".to_owned()
}
