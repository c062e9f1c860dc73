//! NHTSA vPIC VIN decoding and the NHTSA recalls-by-vehicle API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{http_client, read_body, transport_error};
use crate::collaborators::{CollaboratorResult, RecallRegistry, VehicleDecoder};
use crate::config::IntegrationsConfig;
use crate::domain::compliance::RecallRecord;
use crate::domain::vehicle::VehicleIdentity;
use crate::errors::CollaboratorError;
use crate::vin::Vin;

#[derive(Clone, Debug)]
pub struct NhtsaClient {
    http: Client,
    decode_base_url: String,
    recalls_base_url: String,
    timeout_secs: u64,
}

impl NhtsaClient {
    pub fn new(config: &IntegrationsConfig) -> Result<Self, CollaboratorError> {
        Ok(Self {
            http: http_client(config.http_timeout_secs)?,
            decode_base_url: config.nhtsa_decode_base_url.trim_end_matches('/').to_owned(),
            recalls_base_url: config.nhtsa_recalls_base_url.trim_end_matches('/').to_owned(),
            timeout_secs: config.http_timeout_secs,
        })
    }

    async fn get(&self, url: &str, endpoint: &str) -> CollaboratorResult<String> {
        let response = self.http.get(url).send().await.map_err(|error| {
            warn!(event_name = "integrations.nhtsa.request_failed", endpoint, error = %error);
            transport_error(error, self.timeout_secs)
        })?;
        read_body(response, endpoint, self.timeout_secs).await
    }
}

#[async_trait]
impl VehicleDecoder for NhtsaClient {
    async fn decode(&self, vin: &Vin) -> CollaboratorResult<Vec<VehicleIdentity>> {
        let url = format!("{}/DecodeVin/{}?format=json", self.decode_base_url, vin);
        let body = self.get(&url, "vpic.decode_vin").await?;
        let decoded = parse_decode_response(vin, &body)?;
        debug!(event_name = "integrations.nhtsa.decoded", vin = %vin, variants = decoded.len());
        Ok(decoded)
    }
}

#[async_trait]
impl RecallRegistry for NhtsaClient {
    async fn open_recalls(&self, vin: &Vin) -> CollaboratorResult<Vec<RecallRecord>> {
        let url = format!("{}/recallsByVehicle?vin={}", self.recalls_base_url, vin);
        let body = self.get(&url, "recalls.by_vehicle").await?;
        parse_recalls_response(&body)
    }
}

#[derive(Deserialize)]
struct DecodeResponse {
    #[serde(rename = "Results", default)]
    results: Vec<DecodeVariable>,
}

#[derive(Deserialize)]
struct DecodeVariable {
    #[serde(rename = "Variable", default)]
    variable: Option<String>,
    #[serde(rename = "Value", default)]
    value: Option<String>,
}

/// vPIC answers with a single flat variable list. A response without year, make and model
/// is treated as "no decode" rather than an error.
pub fn parse_decode_response(vin: &Vin, body: &str) -> CollaboratorResult<Vec<VehicleIdentity>> {
    let response: DecodeResponse = serde_json::from_str(body)
        .map_err(|error| CollaboratorError::Malformed(format!("vPIC decode: {error}")))?;

    let lookup = |name: &str| -> Option<String> {
        response
            .results
            .iter()
            .find(|entry| entry.variable.as_deref() == Some(name))
            .and_then(|entry| entry.value.as_deref())
            .map(str::trim)
            .filter(|value| !value.is_empty() && *value != "Not Applicable")
            .map(str::to_owned)
    };

    let year = lookup("Model Year").and_then(|year| year.parse::<i32>().ok());
    let (Some(year), Some(make), Some(model)) = (year, lookup("Make"), lookup("Model")) else {
        return Ok(Vec::new());
    };

    Ok(vec![VehicleIdentity {
        vin: vin.clone(),
        year,
        make,
        model,
        trim: lookup("Trim"),
        engine: lookup("Engine Model").or_else(|| lookup("Engine Configuration")),
        drivetrain: lookup("Drive Type"),
        body_style: lookup("Body Class"),
    }])
}

#[derive(Deserialize)]
struct RecallsResponse {
    #[serde(default)]
    results: Vec<RecallEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecallEntry {
    #[serde(rename = "NHTSACampaignNumber", default)]
    campaign_number: String,
    #[serde(default)]
    component: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    consequence: String,
    #[serde(default)]
    remedy: String,
}

pub fn parse_recalls_response(body: &str) -> CollaboratorResult<Vec<RecallRecord>> {
    let response: RecallsResponse = serde_json::from_str(body)
        .map_err(|error| CollaboratorError::Malformed(format!("recalls response: {error}")))?;

    Ok(response
        .results
        .into_iter()
        .filter(|entry| !entry.campaign_number.trim().is_empty())
        .map(|entry| RecallRecord {
            campaign_number: entry.campaign_number.trim().to_owned(),
            component: entry.component,
            summary: entry.summary,
            consequence: entry.consequence,
            remedy: entry.remedy,
        })
        .collect())
}
