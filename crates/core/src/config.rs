use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scoring::VendorWeights;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub shop: ShopConfig,
    pub scoring: ScoringConfig,
    pub vendors: VendorConfig,
    pub routing: RoutingConfig,
    pub integrations: IntegrationsConfig,
    pub logging: LoggingConfig,
}

/// Shop-level money settings threaded through every estimate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopConfig {
    pub labor_rate: Decimal,
    pub parts_markup_pct: Decimal,
    pub tax_rate: Decimal,
    pub parts_rounding: PartsRounding,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub brand_weight: f64,
    pub price_weight: f64,
    pub distance_weight: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorConfig {
    pub call_timeout_ms: u64,
    pub part_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub requests_per_second: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub quick_review_threshold: f64,
    pub auto_proceed_threshold: f64,
    pub min_description_chars: usize,
}

#[derive(Clone, Debug)]
pub struct IntegrationsConfig {
    pub nhtsa_decode_base_url: String,
    pub nhtsa_recalls_base_url: String,
    pub scraper_base_url: Option<String>,
    pub scraper_api_key: Option<SecretString>,
    pub http_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// When markup results are rounded to cents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartsRounding {
    /// Sum unrounded line totals, round once.
    #[default]
    Aggregate,
    /// Round every line to cents before summing.
    PerLine,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Everything a single pipeline run reads from configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub shop: ShopConfig,
    pub scoring: ScoringConfig,
    pub vendors: VendorConfig,
    pub routing: RoutingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        AppConfig::default().pipeline()
    }
}

impl Default for ShopConfig {
    fn default() -> Self {
        AppConfig::default().shop
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        AppConfig::default().scoring
    }
}

impl Default for VendorConfig {
    fn default() -> Self {
        AppConfig::default().vendors
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        AppConfig::default().routing
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub labor_rate: Option<Decimal>,
    pub parts_markup_pct: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub parts_rounding: Option<PartsRounding>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub scraper_base_url: Option<String>,
    pub scraper_api_key: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            shop: ShopConfig {
                labor_rate: Decimal::new(150, 0),
                parts_markup_pct: Decimal::new(30, 0),
                tax_rate: Decimal::new(925, 4),
                parts_rounding: PartsRounding::Aggregate,
            },
            scoring: ScoringConfig {
                brand_weight: 40.0,
                price_weight: 35.0,
                distance_weight: 25.0,
            },
            vendors: VendorConfig {
                call_timeout_ms: 5_000,
                part_timeout_ms: 10_000,
                max_retries: 3,
                retry_backoff_ms: 100,
                max_backoff_ms: 2_000,
                requests_per_second: None,
            },
            routing: RoutingConfig {
                quick_review_threshold: 0.70,
                auto_proceed_threshold: 0.90,
                min_description_chars: 10,
            },
            integrations: IntegrationsConfig {
                nhtsa_decode_base_url: "https://vpic.nhtsa.dot.gov/api/vehicles".to_owned(),
                nhtsa_recalls_base_url: "https://api.nhtsa.gov/recalls".to_owned(),
                scraper_base_url: None,
                scraper_api_key: None,
                http_timeout_secs: 30,
            },
            logging: LoggingConfig { level: "info".to_owned(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl FromStr for PartsRounding {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "aggregate" => Ok(Self::Aggregate),
            "per_line" => Ok(Self::PerLine),
            other => Err(ConfigError::Validation(format!(
                "unsupported parts rounding `{other}` (expected aggregate|per_line)"
            ))),
        }
    }
}

impl ScoringConfig {
    pub fn weights(&self) -> VendorWeights {
        VendorWeights::new(self.brand_weight, self.price_weight, self.distance_weight)
    }
}

impl VendorConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn part_timeout(&self) -> Duration {
        Duration::from_millis(self.part_timeout_ms)
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("estimaro.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            shop: self.shop.clone(),
            scoring: self.scoring.clone(),
            vendors: self.vendors.clone(),
            routing: self.routing.clone(),
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(shop) = patch.shop {
            if let Some(labor_rate) = shop.labor_rate {
                self.shop.labor_rate = labor_rate;
            }
            if let Some(parts_markup_pct) = shop.parts_markup_pct {
                self.shop.parts_markup_pct = parts_markup_pct;
            }
            if let Some(tax_rate) = shop.tax_rate {
                self.shop.tax_rate = tax_rate;
            }
            if let Some(parts_rounding) = shop.parts_rounding {
                self.shop.parts_rounding = parts_rounding;
            }
        }

        if let Some(scoring) = patch.scoring {
            if let Some(brand_weight) = scoring.brand_weight {
                self.scoring.brand_weight = brand_weight;
            }
            if let Some(price_weight) = scoring.price_weight {
                self.scoring.price_weight = price_weight;
            }
            if let Some(distance_weight) = scoring.distance_weight {
                self.scoring.distance_weight = distance_weight;
            }
        }

        if let Some(vendors) = patch.vendors {
            if let Some(call_timeout_ms) = vendors.call_timeout_ms {
                self.vendors.call_timeout_ms = call_timeout_ms;
            }
            if let Some(part_timeout_ms) = vendors.part_timeout_ms {
                self.vendors.part_timeout_ms = part_timeout_ms;
            }
            if let Some(max_retries) = vendors.max_retries {
                self.vendors.max_retries = max_retries;
            }
            if let Some(retry_backoff_ms) = vendors.retry_backoff_ms {
                self.vendors.retry_backoff_ms = retry_backoff_ms;
            }
            if let Some(max_backoff_ms) = vendors.max_backoff_ms {
                self.vendors.max_backoff_ms = max_backoff_ms;
            }
            if let Some(requests_per_second) = vendors.requests_per_second {
                self.vendors.requests_per_second = Some(requests_per_second);
            }
        }

        if let Some(routing) = patch.routing {
            if let Some(threshold) = routing.quick_review_threshold {
                self.routing.quick_review_threshold = threshold;
            }
            if let Some(threshold) = routing.auto_proceed_threshold {
                self.routing.auto_proceed_threshold = threshold;
            }
            if let Some(min_description_chars) = routing.min_description_chars {
                self.routing.min_description_chars = min_description_chars;
            }
        }

        if let Some(integrations) = patch.integrations {
            if let Some(url) = integrations.nhtsa_decode_base_url {
                self.integrations.nhtsa_decode_base_url = url;
            }
            if let Some(url) = integrations.nhtsa_recalls_base_url {
                self.integrations.nhtsa_recalls_base_url = url;
            }
            if let Some(url) = integrations.scraper_base_url {
                self.integrations.scraper_base_url = Some(url);
            }
            if let Some(scraper_api_key_value) = integrations.scraper_api_key {
                self.integrations.scraper_api_key = Some(secret_value(scraper_api_key_value));
            }
            if let Some(http_timeout_secs) = integrations.http_timeout_secs {
                self.integrations.http_timeout_secs = http_timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ESTIMARO_SHOP_LABOR_RATE") {
            self.shop.labor_rate = parse_decimal("ESTIMARO_SHOP_LABOR_RATE", &value)?;
        }
        if let Some(value) = read_env("ESTIMARO_SHOP_PARTS_MARKUP_PCT") {
            self.shop.parts_markup_pct = parse_decimal("ESTIMARO_SHOP_PARTS_MARKUP_PCT", &value)?;
        }
        if let Some(value) = read_env("ESTIMARO_SHOP_TAX_RATE") {
            self.shop.tax_rate = parse_decimal("ESTIMARO_SHOP_TAX_RATE", &value)?;
        }
        if let Some(value) = read_env("ESTIMARO_SHOP_PARTS_ROUNDING") {
            self.shop.parts_rounding = value.parse()?;
        }

        if let Some(value) = read_env("ESTIMARO_SCORING_BRAND_WEIGHT") {
            self.scoring.brand_weight = parse_f64("ESTIMARO_SCORING_BRAND_WEIGHT", &value)?;
        }
        if let Some(value) = read_env("ESTIMARO_SCORING_PRICE_WEIGHT") {
            self.scoring.price_weight = parse_f64("ESTIMARO_SCORING_PRICE_WEIGHT", &value)?;
        }
        if let Some(value) = read_env("ESTIMARO_SCORING_DISTANCE_WEIGHT") {
            self.scoring.distance_weight = parse_f64("ESTIMARO_SCORING_DISTANCE_WEIGHT", &value)?;
        }

        if let Some(value) = read_env("ESTIMARO_VENDORS_CALL_TIMEOUT_MS") {
            self.vendors.call_timeout_ms = parse_u64("ESTIMARO_VENDORS_CALL_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("ESTIMARO_VENDORS_PART_TIMEOUT_MS") {
            self.vendors.part_timeout_ms = parse_u64("ESTIMARO_VENDORS_PART_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("ESTIMARO_VENDORS_MAX_RETRIES") {
            self.vendors.max_retries = parse_u32("ESTIMARO_VENDORS_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("ESTIMARO_VENDORS_RETRY_BACKOFF_MS") {
            self.vendors.retry_backoff_ms = parse_u64("ESTIMARO_VENDORS_RETRY_BACKOFF_MS", &value)?;
        }
        if let Some(value) = read_env("ESTIMARO_VENDORS_REQUESTS_PER_SECOND") {
            self.vendors.requests_per_second =
                Some(parse_u32("ESTIMARO_VENDORS_REQUESTS_PER_SECOND", &value)?);
        }

        if let Some(value) = read_env("ESTIMARO_ROUTING_QUICK_REVIEW_THRESHOLD") {
            self.routing.quick_review_threshold =
                parse_f64("ESTIMARO_ROUTING_QUICK_REVIEW_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("ESTIMARO_ROUTING_AUTO_PROCEED_THRESHOLD") {
            self.routing.auto_proceed_threshold =
                parse_f64("ESTIMARO_ROUTING_AUTO_PROCEED_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("ESTIMARO_ROUTING_MIN_DESCRIPTION_CHARS") {
            self.routing.min_description_chars =
                parse_u64("ESTIMARO_ROUTING_MIN_DESCRIPTION_CHARS", &value)? as usize;
        }

        if let Some(value) = read_env("ESTIMARO_NHTSA_DECODE_URL") {
            self.integrations.nhtsa_decode_base_url = value;
        }
        if let Some(value) = read_env("ESTIMARO_NHTSA_RECALLS_URL") {
            self.integrations.nhtsa_recalls_base_url = value;
        }
        if let Some(value) = read_env("ESTIMARO_SCRAPER_BASE_URL") {
            self.integrations.scraper_base_url = Some(value);
        }
        if let Some(value) = read_env("ESTIMARO_SCRAPER_API_KEY") {
            self.integrations.scraper_api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("ESTIMARO_HTTP_TIMEOUT_SECS") {
            self.integrations.http_timeout_secs = parse_u64("ESTIMARO_HTTP_TIMEOUT_SECS", &value)?;
        }

        let log_level =
            read_env("ESTIMARO_LOGGING_LEVEL").or_else(|| read_env("ESTIMARO_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ESTIMARO_LOGGING_FORMAT").or_else(|| read_env("ESTIMARO_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(labor_rate) = overrides.labor_rate {
            self.shop.labor_rate = labor_rate;
        }
        if let Some(parts_markup_pct) = overrides.parts_markup_pct {
            self.shop.parts_markup_pct = parts_markup_pct;
        }
        if let Some(tax_rate) = overrides.tax_rate {
            self.shop.tax_rate = tax_rate;
        }
        if let Some(parts_rounding) = overrides.parts_rounding {
            self.shop.parts_rounding = parts_rounding;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(scraper_base_url) = overrides.scraper_base_url {
            self.integrations.scraper_base_url = Some(scraper_base_url);
        }
        if let Some(scraper_api_key) = overrides.scraper_api_key {
            self.integrations.scraper_api_key = Some(secret_value(scraper_api_key));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_shop(&self.shop)?;
        validate_scoring(&self.scoring)?;
        validate_vendors(&self.vendors)?;
        validate_routing(&self.routing)?;
        validate_integrations(&self.integrations)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("estimaro.toml"), PathBuf::from("config/estimaro.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_shop(shop: &ShopConfig) -> Result<(), ConfigError> {
    if shop.labor_rate <= Decimal::ZERO {
        return Err(ConfigError::Validation("shop.labor_rate must be greater than zero".to_owned()));
    }
    if shop.parts_markup_pct < Decimal::ZERO {
        return Err(ConfigError::Validation(
            "shop.parts_markup_pct must not be negative".to_owned(),
        ));
    }
    if shop.tax_rate < Decimal::ZERO || shop.tax_rate >= Decimal::ONE {
        return Err(ConfigError::Validation(
            "shop.tax_rate must be a fraction in range 0..1 (e.g. 0.0925)".to_owned(),
        ));
    }
    Ok(())
}

fn validate_scoring(scoring: &ScoringConfig) -> Result<(), ConfigError> {
    scoring
        .weights()
        .normalized()
        .map(|_| ())
        .map_err(|error| ConfigError::Validation(format!("scoring weights: {error}")))
}

fn validate_vendors(vendors: &VendorConfig) -> Result<(), ConfigError> {
    if vendors.call_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "vendors.call_timeout_ms must be greater than zero".to_owned(),
        ));
    }
    if vendors.part_timeout_ms < vendors.call_timeout_ms {
        return Err(ConfigError::Validation(
            "vendors.part_timeout_ms must be at least vendors.call_timeout_ms".to_owned(),
        ));
    }
    if vendors.max_retries > 10 {
        return Err(ConfigError::Validation(
            "vendors.max_retries must be in range 0..=10".to_owned(),
        ));
    }
    if vendors.requests_per_second == Some(0) {
        return Err(ConfigError::Validation(
            "vendors.requests_per_second must be greater than zero when set".to_owned(),
        ));
    }
    Ok(())
}

fn validate_routing(routing: &RoutingConfig) -> Result<(), ConfigError> {
    let quick = routing.quick_review_threshold;
    let auto = routing.auto_proceed_threshold;
    let ordered = (0.0..=1.0).contains(&quick) && (0.0..=1.0).contains(&auto) && quick <= auto;
    if !ordered {
        return Err(ConfigError::Validation(
            "routing thresholds must satisfy \
             0 <= quick_review_threshold <= auto_proceed_threshold <= 1"
                .to_owned(),
        ));
    }
    Ok(())
}

fn validate_integrations(integrations: &IntegrationsConfig) -> Result<(), ConfigError> {
    let urls = [
        ("integrations.nhtsa_decode_base_url", Some(&integrations.nhtsa_decode_base_url)),
        ("integrations.nhtsa_recalls_base_url", Some(&integrations.nhtsa_recalls_base_url)),
        ("integrations.scraper_base_url", integrations.scraper_base_url.as_ref()),
    ];
    for (key, url) in urls {
        if let Some(url) = url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Validation(format!(
                    "{key} must start with http:// or https://"
                )));
            }
        }
    }

    if integrations.scraper_base_url.is_some() {
        let missing = integrations
            .scraper_api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "integrations.scraper_api_key is required when scraper_base_url is set".to_owned(),
            ));
        }
    }

    if integrations.http_timeout_secs == 0 || integrations.http_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "integrations.http_timeout_secs must be in range 1..=300".to_owned(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_owned(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_owned(), value: value.to_owned() }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| invalid_override(key, value))
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    Decimal::from_str(value.trim()).map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    shop: Option<ShopPatch>,
    scoring: Option<ScoringPatch>,
    vendors: Option<VendorsPatch>,
    routing: Option<RoutingPatch>,
    integrations: Option<IntegrationsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ShopPatch {
    labor_rate: Option<Decimal>,
    parts_markup_pct: Option<Decimal>,
    tax_rate: Option<Decimal>,
    parts_rounding: Option<PartsRounding>,
}

#[derive(Debug, Default, Deserialize)]
struct ScoringPatch {
    brand_weight: Option<f64>,
    price_weight: Option<f64>,
    distance_weight: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct VendorsPatch {
    call_timeout_ms: Option<u64>,
    part_timeout_ms: Option<u64>,
    max_retries: Option<u32>,
    retry_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    requests_per_second: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RoutingPatch {
    quick_review_threshold: Option<f64>,
    auto_proceed_threshold: Option<f64>,
    min_description_chars: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct IntegrationsPatch {
    nhtsa_decode_base_url: Option<String>,
    nhtsa_recalls_base_url: Option<String>,
    scraper_base_url: Option<String>,
    scraper_api_key: Option<String>,
    http_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use rust_decimal::Decimal;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, PartsRounding};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_owned())
        }
    }

    #[test]
    fn defaults_match_shop_baseline() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_owned())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.shop.labor_rate == Decimal::new(150, 0), "default labor rate is 150")?;
        ensure(config.shop.tax_rate == Decimal::new(925, 4), "default tax rate is 9.25%")?;
        ensure(config.shop.parts_rounding == PartsRounding::Aggregate, "aggregate rounding")?;
        ensure(config.vendors.call_timeout_ms == 5_000, "vendor call timeout is 5s")?;
        ensure(config.vendors.part_timeout_ms == 10_000, "part timeout is 10s")?;
        ensure(config.vendors.max_retries == 3, "three retries by default")?;
        ensure(config.routing.auto_proceed_threshold == 0.90, "auto-proceed threshold")?;
        ensure(matches!(config.logging.format, LogFormat::Compact), "compact logs by default")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_owned())?;

        env::set_var("TEST_SCRAPER_KEY", "scraper-key-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("estimaro.toml");
            fs::write(
                &path,
                r#"
[shop]
labor_rate = 165
tax_rate = 0.08
parts_rounding = "per_line"

[integrations]
scraper_base_url = "http://localhost:8081"
scraper_api_key = "${TEST_SCRAPER_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.shop.labor_rate == Decimal::new(165, 0), "labor rate from file")?;
            ensure(config.shop.tax_rate == Decimal::new(8, 2), "tax rate from file")?;
            ensure(config.shop.parts_rounding == PartsRounding::PerLine, "rounding from file")?;
            ensure(
                config
                    .integrations
                    .scraper_api_key
                    .as_ref()
                    .map(|key| key.expose_secret() == "scraper-key-from-env")
                    .unwrap_or(false),
                "scraper key should be interpolated from the environment",
            )
        })();

        clear_vars(&["TEST_SCRAPER_KEY"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_owned())?;

        env::set_var("ESTIMARO_SHOP_LABOR_RATE", "170");
        env::set_var("ESTIMARO_SCORING_PRICE_WEIGHT", "50");
        env::set_var("ESTIMARO_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("estimaro.toml");
            fs::write(
                &path,
                r#"
[shop]
labor_rate = 160
parts_markup_pct = 35

[scoring]
price_weight = 20

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    labor_rate: Some(Decimal::new(180, 0)),
                    log_level: Some("debug".to_owned()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.shop.labor_rate == Decimal::new(180, 0), "override labor rate wins")?;
            ensure(config.shop.parts_markup_pct == Decimal::new(35, 0), "file markup kept")?;
            ensure(config.scoring.price_weight == 50.0, "env price weight wins over file")?;
            ensure(config.logging.level == "debug", "override log level wins")?;
            ensure(matches!(config.logging.format, LogFormat::Json), "env log format alias")
        })();

        clear_vars(&[
            "ESTIMARO_SHOP_LABOR_RATE",
            "ESTIMARO_SCORING_PRICE_WEIGHT",
            "ESTIMARO_LOG_FORMAT",
        ]);
        result
    }

    #[test]
    fn invalid_env_value_is_reported_with_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_owned())?;

        env::set_var("ESTIMARO_SHOP_TAX_RATE", "nine percent");

        let result = (|| -> Result<(), String> {
            match AppConfig::load(LoadOptions::default()) {
                Ok(_) => Err("expected env override failure".to_owned()),
                Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                    ensure(key == "ESTIMARO_SHOP_TAX_RATE", "error should name the env key")
                }
                Err(other) => Err(format!("unexpected error: {other}")),
            }
        })();

        clear_vars(&["ESTIMARO_SHOP_TAX_RATE"]);
        result
    }

    #[test]
    fn validation_rejects_zero_weights_and_bad_tax() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_owned())?;

        let mut config = AppConfig::default();
        config.scoring.brand_weight = 0.0;
        config.scoring.price_weight = 0.0;
        config.scoring.distance_weight = 0.0;
        let weights_error = config.validate();
        ensure(
            matches!(
                weights_error,
                Err(ConfigError::Validation(ref message)) if message.contains("scoring weights")
            ),
            "zero weights should fail validation",
        )?;

        let mut config = AppConfig::default();
        config.shop.tax_rate = Decimal::new(925, 2);
        ensure(
            matches!(
                config.validate(),
                Err(ConfigError::Validation(ref message)) if message.contains("shop.tax_rate")
            ),
            "a percentage instead of a fraction should fail validation",
        )
    }

    #[test]
    fn scraper_key_is_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_owned())?;

        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                scraper_base_url: Some("https://scraper.internal".to_owned()),
                scraper_api_key: Some("sk-very-secret".to_owned()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;
        let debug = format!("{config:?}");

        ensure(!debug.contains("sk-very-secret"), "debug output should not contain the api key")
    }

    #[test]
    fn scraper_url_without_key_fails_fast() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_owned())?;

        let error = match AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                scraper_base_url: Some("https://scraper.internal".to_owned()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected validation failure".to_owned()),
            Err(error) => error,
        };
        ensure(
            matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("scraper_api_key")
            ),
            "validation failure should mention scraper_api_key",
        )
    }
}
