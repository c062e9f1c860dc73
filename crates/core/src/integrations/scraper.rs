//! Client for the scraper service that fronts labor guides, parts catalogs and
//! storefront pricing. Every call authenticates with an `X-API-Key` header.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{http_client, read_body, transport_error};
use crate::classifier::job_title;
use crate::collaborators::{CollaboratorResult, LaborCatalog, PartCatalog, VendorSource};
use crate::config::IntegrationsConfig;
use crate::domain::labor::LaborRecord;
use crate::domain::offer::{BrandTier, VendorOffer};
use crate::domain::parts::CatalogEntry;
use crate::domain::vehicle::VehicleIdentity;
use crate::errors::CollaboratorError;
use crate::vendors::adapters::{ScrapedPriceItem, VendorListing};

const MANUAL_LOOKUP: &str = "MANUAL-LOOKUP";
pub const SCRAPER_VENDOR_ID: &str = "scraper";

#[derive(Clone, Debug)]
pub struct ScraperClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
    timeout_secs: u64,
}

impl ScraperClient {
    /// Returns `Ok(None)` when no scraper endpoint is configured.
    pub fn from_config(config: &IntegrationsConfig) -> Result<Option<Self>, CollaboratorError> {
        let (Some(base_url), Some(api_key)) = (&config.scraper_base_url, &config.scraper_api_key)
        else {
            return Ok(None);
        };
        Ok(Some(Self::new(base_url, api_key.clone(), config.http_timeout_secs)?))
    }

    pub fn new(
        base_url: &str,
        api_key: SecretString,
        timeout_secs: u64,
    ) -> Result<Self, CollaboratorError> {
        Ok(Self {
            http: http_client(timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
            timeout_secs,
        })
    }

    pub async fn health(&self) -> CollaboratorResult<()> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .http
            .get(url)
            .header("X-API-Key", self.api_key.expose_secret())
            .send()
            .await
            .map_err(|error| transport_error(error, self.timeout_secs))?;
        read_body(response, "/health", self.timeout_secs).await.map(|_| ())
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> CollaboratorResult<Envelope<T>> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header("X-API-Key", self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|error| {
                warn!(event_name = "integrations.scraper.request_failed", path, error = %error);
                transport_error(error, self.timeout_secs)
            })?;
        let text = read_body(response, path, self.timeout_secs).await?;
        parse_envelope(path, &text)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    payload: T,
}

fn parse_envelope<T: DeserializeOwned>(path: &str, body: &str) -> CollaboratorResult<Envelope<T>> {
    serde_json::from_str(body)
        .map_err(|error| CollaboratorError::Malformed(format!("{path} response: {error}")))
}

#[derive(Serialize)]
struct JobQuery<'a> {
    vin: &'a str,
    job_description: &'a str,
}

#[derive(Serialize)]
struct PricingQuery<'a> {
    part_numbers: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct LaborPayload {
    #[serde(default)]
    labor_hours: Option<f64>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    procedure_steps: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PartsPayload {
    #[serde(default)]
    parts: Vec<ScrapedPart>,
}

#[derive(Debug, Deserialize)]
struct ScrapedPart {
    part_number: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    manufacturer: Option<String>,
    #[serde(default)]
    is_oem: bool,
}

#[derive(Debug, Deserialize)]
struct PricingPayload {
    #[serde(default)]
    prices: Vec<ScrapedPriceItem>,
}

fn labor_record(
    envelope: Envelope<LaborPayload>,
    title: &str,
) -> CollaboratorResult<Option<LaborRecord>> {
    if !envelope.success {
        return match envelope.error {
            Some(error) if error.to_ascii_lowercase().contains("not found") => Ok(None),
            Some(error) => Err(CollaboratorError::Unavailable(error)),
            None => Ok(None),
        };
    }
    let Some(hours) = envelope.payload.labor_hours.filter(|hours| hours.is_finite()) else {
        return Ok(None);
    };
    let hours = Decimal::try_from(hours)
        .map_err(|_| CollaboratorError::Malformed(format!("labor hours {hours}")))?
        .round_dp(2);

    Ok(Some(LaborRecord {
        description: title.to_owned(),
        hours,
        source: envelope.payload.source.unwrap_or_else(|| "scraper".to_owned()),
        procedure_steps: envelope.payload.procedure_steps,
        disassembly_triggers: Default::default(),
        part_descriptions: Vec::new(),
    }))
}

fn catalog_entries(envelope: Envelope<PartsPayload>) -> CollaboratorResult<Vec<CatalogEntry>> {
    if !envelope.success {
        return Err(failure(envelope.error, "/scrape/parts"));
    }
    let mut entries = Vec::new();
    for part in envelope.payload.parts {
        let number = part.part_number.trim();
        if number.is_empty() || number.eq_ignore_ascii_case(MANUAL_LOOKUP) {
            continue;
        }
        entries.push(CatalogEntry {
            oem_number: number.to_owned(),
            brand_tier: part.is_oem.then_some(BrandTier::Oem),
            is_primary: entries.is_empty(),
            description: part.description,
            brand: part.manufacturer,
            position: None,
            quantity: 1,
        });
    }
    Ok(entries)
}

fn price_offers(envelope: Envelope<PricingPayload>) -> CollaboratorResult<Vec<VendorOffer>> {
    if !envelope.success {
        return Err(failure(envelope.error, "/scrape/pricing"));
    }
    envelope
        .payload
        .prices
        .into_iter()
        .map(|item| {
            let vendor_name = item.vendor.clone().unwrap_or_else(|| "Scraper".to_owned());
            item.into_offer(SCRAPER_VENDOR_ID, &vendor_name)
        })
        .collect()
}

fn failure(error: Option<String>, path: &str) -> CollaboratorError {
    CollaboratorError::Unavailable(error.unwrap_or_else(|| format!("{path} reported failure")))
}

#[async_trait]
impl LaborCatalog for ScraperClient {
    async fn lookup(
        &self,
        vehicle: &VehicleIdentity,
        job_code: &str,
    ) -> CollaboratorResult<Option<LaborRecord>> {
        let title = job_title(job_code);
        let query = JobQuery { vin: vehicle.vin.as_str(), job_description: title };
        let envelope = self.post("/scrape/labor", &query).await?;
        let record = labor_record(envelope, title)?;
        debug!(event_name = "integrations.scraper.labor", job_code, found = record.is_some());
        Ok(record)
    }
}

#[async_trait]
impl PartCatalog for ScraperClient {
    async fn lookup(
        &self,
        vehicle: &VehicleIdentity,
        description: &str,
    ) -> CollaboratorResult<Vec<CatalogEntry>> {
        let query = JobQuery { vin: vehicle.vin.as_str(), job_description: description };
        catalog_entries(self.post("/scrape/parts", &query).await?)
    }
}

#[async_trait]
impl VendorSource for ScraperClient {
    fn vendor_id(&self) -> &str {
        SCRAPER_VENDOR_ID
    }

    fn vendor_name(&self) -> &str {
        "Scraper service"
    }

    async fn query(&self, oem_number: &str) -> CollaboratorResult<Vec<VendorOffer>> {
        let query = PricingQuery { part_numbers: [oem_number] };
        price_offers(self.post("/scrape/pricing", &query).await?)
    }
}
