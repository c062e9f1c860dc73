//! In-memory collaborators and the built-in demo catalog.
//!
//! The CLI `demo` flows and the integration tests run the full pipeline against these
//! without any network access.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::classifier::KeywordJobClassifier;
use crate::collaborators::{
    CollaboratorResult, EstimateSink, LaborCatalog, PartCatalog, RecallRegistry, VehicleDecoder,
    VendorSource,
};
use crate::config::PipelineConfig;
use crate::domain::compliance::RecallRecord;
use crate::domain::labor::LaborRecord;
use crate::domain::offer::BrandTier;
use crate::domain::parts::CatalogEntry;
use crate::domain::vehicle::{VehicleIdentity, VehicleKey};
use crate::errors::CollaboratorError;
use crate::pipeline::{EstimatePipeline, PipelineCollaborators, PipelineResult};
use crate::vendors::adapters::{ListingVendor, SsfListing, WorldpacListing};
use crate::vin::Vin;

struct DemoVehicle {
    vin: &'static str,
    year: i32,
    make: &'static str,
    model: &'static str,
    trim: &'static str,
    engine: &'static str,
    drivetrain: &'static str,
    body_style: &'static str,
}

const DEMO_VEHICLES: &[DemoVehicle] = &[
    DemoVehicle {
        vin: "1HGBH41JXMN109186",
        year: 2021,
        make: "Honda",
        model: "Accord",
        trim: "EX-L",
        engine: "1.5L I4 Turbo",
        drivetrain: "FWD",
        body_style: "Sedan",
    },
    DemoVehicle {
        vin: "WBA5R1C56LFH12345",
        year: 2020,
        make: "BMW",
        model: "330i",
        trim: "Sport Line",
        engine: "2.0L I4 Turbo",
        drivetrain: "RWD",
        body_style: "Sedan",
    },
    DemoVehicle {
        vin: "5NPE34AF4JH123456",
        year: 2018,
        make: "Hyundai",
        model: "Sonata",
        trim: "SEL",
        engine: "2.4L I4",
        drivetrain: "FWD",
        body_style: "Sedan",
    },
    DemoVehicle {
        vin: "KNDJP3A57K7012345",
        year: 2019,
        make: "Kia",
        model: "Soul",
        trim: "+",
        engine: "2.0L I4",
        drivetrain: "FWD",
        body_style: "Hatchback",
    },
    DemoVehicle {
        vin: "2T1BURHE8JC123456",
        year: 2018,
        make: "Toyota",
        model: "Corolla",
        trim: "LE",
        engine: "1.8L I4",
        drivetrain: "FWD",
        body_style: "Sedan",
    },
];

/// Decoded identity for one of the built-in demo VINs.
pub fn demo_vehicle(vin: &str) -> Option<VehicleIdentity> {
    let demo = DEMO_VEHICLES.iter().find(|demo| demo.vin.eq_ignore_ascii_case(vin.trim()))?;
    let vin = Vin::parse(demo.vin).ok()?;
    Some(VehicleIdentity {
        vin,
        year: demo.year,
        make: demo.make.to_owned(),
        model: demo.model.to_owned(),
        trim: Some(demo.trim.to_owned()),
        engine: Some(demo.engine.to_owned()),
        drivetrain: Some(demo.drivetrain.to_owned()),
        body_style: Some(demo.body_style.to_owned()),
    })
}

pub fn demo_vins() -> Vec<&'static str> {
    DEMO_VEHICLES.iter().map(|demo| demo.vin).collect()
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryVehicleDecoder {
    variants: BTreeMap<String, Vec<VehicleIdentity>>,
}

impl InMemoryVehicleDecoder {
    pub fn demo() -> Self {
        DEMO_VEHICLES
            .iter()
            .filter_map(|demo| demo_vehicle(demo.vin))
            .fold(Self::default(), |decoder, vehicle| decoder.with_vehicle(vehicle))
    }

    pub fn with_vehicle(mut self, vehicle: VehicleIdentity) -> Self {
        self.variants.entry(vehicle.vin.to_string()).or_default().push(vehicle);
        self
    }
}

#[async_trait]
impl VehicleDecoder for InMemoryVehicleDecoder {
    async fn decode(&self, vin: &Vin) -> CollaboratorResult<Vec<VehicleIdentity>> {
        Ok(self.variants.get(vin.as_str()).cloned().unwrap_or_default())
    }
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryRecallRegistry {
    recalls: BTreeMap<String, Vec<RecallRecord>>,
    outage: Option<String>,
}

impl InMemoryRecallRegistry {
    pub fn with_recall(mut self, vin: &str, recall: RecallRecord) -> Self {
        self.recalls.entry(vin.trim().to_ascii_uppercase()).or_default().push(recall);
        self
    }

    /// Registry that fails every lookup.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self { recalls: BTreeMap::new(), outage: Some(reason.into()) }
    }
}

#[async_trait]
impl RecallRegistry for InMemoryRecallRegistry {
    async fn open_recalls(&self, vin: &Vin) -> CollaboratorResult<Vec<RecallRecord>> {
        if let Some(reason) = &self.outage {
            return Err(CollaboratorError::Unavailable(reason.clone()));
        }
        Ok(self.recalls.get(vin.as_str()).cloned().unwrap_or_default())
    }
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryLaborCatalog {
    records: BTreeMap<(VehicleKey, String), LaborRecord>,
}

impl InMemoryLaborCatalog {
    pub fn demo() -> Self {
        Self::default()
            .with_record(
                VehicleKey::new(2021, "Honda", "Accord"),
                "BRAKE-PAD",
                LaborRecord {
                    description: "Front brake pad replacement".to_owned(),
                    hours: Decimal::new(12, 1),
                    source: "demo labor guide".to_owned(),
                    procedure_steps: vec![
                        "Raise vehicle and remove front wheels".to_owned(),
                        "Remove caliper bolts and hang caliper".to_owned(),
                        "Replace brake pads and clean caliper bracket".to_owned(),
                        "Reinstall caliper, torque to spec and road test".to_owned(),
                    ],
                    disassembly_triggers: BTreeSet::from(["caliper removal".to_owned()]),
                    part_descriptions: vec!["Front brake pad set".to_owned()],
                },
            )
            .with_record(
                VehicleKey::new(2021, "Honda", "Accord"),
                "OIL-CHANGE",
                LaborRecord {
                    description: "Engine oil and filter change".to_owned(),
                    hours: Decimal::new(5, 1),
                    source: "demo labor guide".to_owned(),
                    procedure_steps: vec![
                        "Drain engine oil".to_owned(),
                        "Replace oil filter and refill".to_owned(),
                    ],
                    disassembly_triggers: BTreeSet::new(),
                    part_descriptions: vec!["Engine oil filter".to_owned()],
                },
            )
            .with_record(
                VehicleKey::new(2018, "Toyota", "Corolla"),
                "BRAKE-PAD",
                LaborRecord {
                    description: "Front brake pad replacement".to_owned(),
                    hours: Decimal::new(10, 1),
                    source: "demo labor guide".to_owned(),
                    procedure_steps: vec![
                        "Remove front wheels".to_owned(),
                        "Replace brake pads".to_owned(),
                    ],
                    disassembly_triggers: BTreeSet::new(),
                    part_descriptions: vec!["Front brake pad set".to_owned()],
                },
            )
    }

    pub fn with_record(mut self, vehicle: VehicleKey, job_code: &str, record: LaborRecord) -> Self {
        self.records.insert((vehicle, job_code.to_ascii_uppercase()), record);
        self
    }
}

#[async_trait]
impl LaborCatalog for InMemoryLaborCatalog {
    async fn lookup(
        &self,
        vehicle: &VehicleIdentity,
        job_code: &str,
    ) -> CollaboratorResult<Option<LaborRecord>> {
        let key = (vehicle.catalog_key(), job_code.to_ascii_uppercase());
        Ok(self.records.get(&key).cloned())
    }
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryPartCatalog {
    entries: BTreeMap<(VehicleKey, String), Vec<CatalogEntry>>,
}

fn catalog_entry(
    oem_number: &str,
    description: &str,
    brand: &str,
    is_primary: bool,
    position: Option<&str>,
) -> CatalogEntry {
    CatalogEntry {
        oem_number: oem_number.to_owned(),
        description: description.to_owned(),
        brand: Some(brand.to_owned()),
        brand_tier: Some(BrandTier::Oem),
        is_primary,
        position: position.map(str::to_owned),
        quantity: 1,
    }
}

impl InMemoryPartCatalog {
    pub fn demo() -> Self {
        let accord = VehicleKey::new(2021, "Honda", "Accord");
        Self::default()
            .with_entries(
                accord.clone(),
                "Front brake pad set",
                vec![
                    catalog_entry("45022-TVA-A01", "Pad set, front", "Honda", true, Some("front")),
                    catalog_entry("45022-TVA-A00", "Pad set, front", "Honda", false, Some("front")),
                ],
            )
            .with_entries(
                accord,
                "Engine oil filter",
                vec![catalog_entry("15400-PLM-A02", "Oil filter", "Honda", true, None)],
            )
            .with_entries(
                VehicleKey::new(2018, "Toyota", "Corolla"),
                "Front brake pad set",
                vec![catalog_entry("04465-02220", "Pad kit, front", "Toyota", true, Some("front"))],
            )
    }

    pub fn with_entries(
        mut self,
        vehicle: VehicleKey,
        description: &str,
        entries: Vec<CatalogEntry>,
    ) -> Self {
        self.entries.insert((vehicle, description.trim().to_lowercase()), entries);
        self
    }
}

#[async_trait]
impl PartCatalog for InMemoryPartCatalog {
    async fn lookup(
        &self,
        vehicle: &VehicleIdentity,
        description: &str,
    ) -> CollaboratorResult<Vec<CatalogEntry>> {
        let key = (vehicle.catalog_key(), description.trim().to_lowercase());
        Ok(self.entries.get(&key).cloned().unwrap_or_default())
    }
}

/// Worldpac-shaped demo vendor: Bosch pads at $89.99, 12 miles out.
pub fn demo_worldpac() -> ListingVendor<WorldpacListing> {
    ListingVendor::new("worldpac", "Worldpac")
        .with_listing(WorldpacListing {
            part_number: "45022-TVA-A01".to_owned(),
            brand: "Bosch".to_owned(),
            description: "QuietCast ceramic brake pad set - NEW".to_owned(),
            net_price: "$89.99".to_owned(),
            availability: "In Stock".to_owned(),
            qty_on_hand: Some(6),
            distance_miles: 12.0,
            delivery_option: Some("Same day".to_owned()),
            warranty_months: Some(24),
            quality_grade: Some("OE Equivalent".to_owned()),
        })
        .with_listing(WorldpacListing {
            part_number: "15400-PLM-A02".to_owned(),
            brand: "Honda".to_owned(),
            description: "Genuine new engine oil filter".to_owned(),
            net_price: "$9.49".to_owned(),
            availability: "In Stock".to_owned(),
            qty_on_hand: Some(40),
            distance_miles: 12.0,
            delivery_option: Some("Same day".to_owned()),
            warranty_months: Some(12),
            quality_grade: Some("OEM".to_owned()),
        })
}

/// SSF-shaped demo vendor: Akebono pads at $94.50, 25 miles (40.2336 km) out.
pub fn demo_ssf() -> ListingVendor<SsfListing> {
    ListingVendor::new("ssf", "SSF Auto Parts")
        .with_listing(SsfListing {
            part_no: "45022-TVA-A01".to_owned(),
            brand: "Akebono".to_owned(),
            desc: "ProACT ultra-premium ceramic pad set, brand new".to_owned(),
            unit_price_cents: 9450,
            stock_code: "Y".to_owned(),
            qty: Some(3),
            warehouse_km: 40.2336,
            delivery: Some("Next day".to_owned()),
            warranty: Some("Limited lifetime".to_owned()),
        })
        .with_listing(SsfListing {
            part_no: "04465-02220".to_owned(),
            brand: "Akebono".to_owned(),
            desc: "ProACT ceramic pad kit, new".to_owned(),
            unit_price_cents: 7825,
            stock_code: "L".to_owned(),
            qty: Some(1),
            warehouse_km: 40.2336,
            delivery: None,
            warranty: None,
        })
}

pub fn demo_vendors() -> Vec<Arc<dyn VendorSource>> {
    vec![Arc::new(demo_worldpac()) as Arc<dyn VendorSource>, Arc::new(demo_ssf())]
}

pub fn demo_collaborators() -> PipelineCollaborators {
    PipelineCollaborators {
        decoder: Arc::new(InMemoryVehicleDecoder::demo()),
        recalls: Arc::new(InMemoryRecallRegistry::default()),
        classifier: Arc::new(KeywordJobClassifier),
        labor: Arc::new(InMemoryLaborCatalog::demo()),
        parts: Arc::new(InMemoryPartCatalog::demo()),
        vendors: demo_vendors(),
    }
}

pub fn demo_pipeline(config: PipelineConfig) -> EstimatePipeline {
    EstimatePipeline::new(demo_collaborators(), config)
}

/// Sink that keeps every dispatched estimate and hands out sequential record ids.
#[derive(Debug, Default)]
pub struct InMemoryEstimateSink {
    records: Mutex<Vec<PipelineResult>>,
}

impl InMemoryEstimateSink {
    pub fn records(&self) -> Vec<PipelineResult> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl EstimateSink for InMemoryEstimateSink {
    async fn push_estimate(&self, result: &PipelineResult) -> CollaboratorResult<String> {
        let mut records = match self.records.lock() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push(result.clone());
        Ok(format!("EST-{:04}", records.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::{demo_vehicle, demo_vins, InMemoryPartCatalog, InMemoryVehicleDecoder};
    use crate::collaborators::{PartCatalog, VehicleDecoder};
    use crate::vin::Vin;

    #[test]
    fn every_demo_vin_passes_the_check_digit() {
        for vin in demo_vins() {
            assert!(Vin::parse(vin).is_ok(), "{vin} should validate");
            assert!(demo_vehicle(vin).is_some());
        }
        assert!(demo_vehicle("1HGCM82633A004352").is_none());
    }

    #[tokio::test]
    async fn demo_decoder_returns_a_single_variant() {
        let vin = Vin::parse("WBA5R1C56LFH12345").expect("valid vin");
        let decoded = InMemoryVehicleDecoder::demo().decode(&vin).await.expect("decode");
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].make, "BMW");
    }

    #[tokio::test]
    async fn part_lookup_ignores_description_case() {
        let vehicle = demo_vehicle("1HGBH41JXMN109186").expect("demo vehicle");
        let entries = InMemoryPartCatalog::demo()
            .lookup(&vehicle, "FRONT BRAKE PAD SET")
            .await
            .expect("lookup");
        assert_eq!(entries[0].oem_number, "45022-TVA-A01");
    }
}
