//! Native listing shapes of each pricing source and their mapping into `VendorOffer`.
//!
//! Field names, units and stock vocabulary are mapped explicitly per source.

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::collaborators::{CollaboratorResult, VendorSource};
use crate::domain::offer::{BrandTier, StockStatus, VendorOffer};
use crate::errors::CollaboratorError;
use crate::scoring::DISTANCE_CEILING_MILES;

const MILES_PER_KILOMETRE: f64 = 0.621371;

/// A native listing that knows how to become a `VendorOffer`.
pub trait VendorListing: Clone + Send + Sync {
    fn oem_number(&self) -> &str;
    fn into_offer(self, vendor_id: &str, vendor_name: &str) -> CollaboratorResult<VendorOffer>;
}

/// Parses storefront price text such as `$1,089.99`.
pub fn parse_price_text(text: &str) -> CollaboratorResult<Decimal> {
    let cleaned: String =
        text.chars().filter(|ch| !matches!(ch, '$' | ',' | ' ' | '\u{a0}')).collect();
    Decimal::from_str(&cleaned)
        .map_err(|_| CollaboratorError::Malformed(format!("unparseable price `{text}`")))
}

/// Worldpac-style listing: camelCase, price as display text, distance in miles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldpacListing {
    pub part_number: String,
    pub brand: String,
    pub description: String,
    pub net_price: String,
    pub availability: String,
    #[serde(default)]
    pub qty_on_hand: Option<u32>,
    pub distance_miles: f64,
    #[serde(default)]
    pub delivery_option: Option<String>,
    #[serde(default)]
    pub warranty_months: Option<u32>,
    #[serde(default)]
    pub quality_grade: Option<String>,
}

impl VendorListing for WorldpacListing {
    fn oem_number(&self) -> &str {
        &self.part_number
    }

    fn into_offer(self, vendor_id: &str, vendor_name: &str) -> CollaboratorResult<VendorOffer> {
        let price = parse_price_text(&self.net_price)?;
        let brand_tier = self
            .quality_grade
            .as_deref()
            .and_then(BrandTier::from_label)
            .unwrap_or_else(|| BrandTier::infer(&self.brand, &self.description));

        Ok(VendorOffer {
            vendor_id: vendor_id.to_owned(),
            vendor_name: vendor_name.to_owned(),
            oem_number: self.part_number,
            brand_tier: Some(brand_tier),
            price,
            stock_status: StockStatus::from_text(&self.availability),
            stock_quantity: self.qty_on_hand,
            warehouse_distance_miles: self.distance_miles,
            delivery_option: self.delivery_option,
            warranty_term: self.warranty_months.map(|months| format!("{months} months")),
            raw_description: self.description,
            brand: self.brand,
        })
    }
}

/// SSF-style listing: snake_case, price in cents, single-letter stock code, distance in km.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SsfListing {
    pub part_no: String,
    pub brand: String,
    pub desc: String,
    pub unit_price_cents: i64,
    pub stock_code: String,
    #[serde(default)]
    pub qty: Option<u32>,
    pub warehouse_km: f64,
    #[serde(default)]
    pub delivery: Option<String>,
    #[serde(default)]
    pub warranty: Option<String>,
}

pub fn ssf_stock_status(code: &str) -> StockStatus {
    match code.trim().to_ascii_uppercase().as_str() {
        "Y" => StockStatus::InStock,
        "L" => StockStatus::LimitedStock,
        "N" => StockStatus::OutOfStock,
        "S" => StockStatus::SpecialOrder,
        _ => StockStatus::Unknown,
    }
}

impl VendorListing for SsfListing {
    fn oem_number(&self) -> &str {
        &self.part_no
    }

    fn into_offer(self, vendor_id: &str, vendor_name: &str) -> CollaboratorResult<VendorOffer> {
        Ok(VendorOffer {
            vendor_id: vendor_id.to_owned(),
            vendor_name: vendor_name.to_owned(),
            oem_number: self.part_no,
            brand_tier: Some(BrandTier::infer(&self.brand, &self.desc)),
            price: Decimal::new(self.unit_price_cents, 2),
            stock_status: ssf_stock_status(&self.stock_code),
            stock_quantity: self.qty,
            warehouse_distance_miles: self.warehouse_km * MILES_PER_KILOMETRE,
            delivery_option: self.delivery,
            warranty_term: self.warranty,
            raw_description: self.desc,
            brand: self.brand,
        })
    }
}

/// Item of the scraper service `/scrape/pricing` feed. It carries no warehouse distance,
/// so offers are placed at the distance ceiling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScrapedPriceItem {
    #[serde(default)]
    pub vendor: Option<String>,
    pub part_number: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub stock_status: String,
    #[serde(default)]
    pub warehouse: Option<String>,
}

impl VendorListing for ScrapedPriceItem {
    fn oem_number(&self) -> &str {
        &self.part_number
    }

    fn into_offer(self, vendor_id: &str, vendor_name: &str) -> CollaboratorResult<VendorOffer> {
        let price = Decimal::try_from(self.price)
            .map_err(|_| {
                CollaboratorError::Malformed(format!("unrepresentable price {}", self.price))
            })?
            .round_dp(2);
        let description = if self.description.trim().is_empty() {
            format!("{} {}", self.brand, self.part_number).trim().to_owned()
        } else {
            self.description
        };

        Ok(VendorOffer {
            vendor_id: vendor_id.to_owned(),
            vendor_name: vendor_name.to_owned(),
            oem_number: self.part_number,
            brand_tier: Some(BrandTier::infer(&self.brand, &description)),
            price,
            stock_status: StockStatus::from_text(&self.stock_status),
            stock_quantity: None,
            warehouse_distance_miles: DISTANCE_CEILING_MILES,
            delivery_option: self.warehouse,
            warranty_term: None,
            raw_description: description,
            brand: self.brand,
        })
    }
}

/// Vendor backed by a fixed set of native listings keyed by OEM number.
#[derive(Clone, Debug)]
pub struct ListingVendor<L> {
    vendor_id: String,
    vendor_name: String,
    listings: BTreeMap<String, Vec<L>>,
}

impl<L: VendorListing> ListingVendor<L> {
    pub fn new(vendor_id: impl Into<String>, vendor_name: impl Into<String>) -> Self {
        Self {
            vendor_id: vendor_id.into(),
            vendor_name: vendor_name.into(),
            listings: BTreeMap::new(),
        }
    }

    pub fn with_listing(mut self, listing: L) -> Self {
        self.listings.entry(listing.oem_number().to_owned()).or_default().push(listing);
        self
    }
}

#[async_trait]
impl<L: VendorListing + 'static> VendorSource for ListingVendor<L> {
    fn vendor_id(&self) -> &str {
        &self.vendor_id
    }

    fn vendor_name(&self) -> &str {
        &self.vendor_name
    }

    async fn query(&self, oem_number: &str) -> CollaboratorResult<Vec<VendorOffer>> {
        self.listings
            .get(oem_number)
            .into_iter()
            .flatten()
            .cloned()
            .map(|listing| listing.into_offer(&self.vendor_id, &self.vendor_name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{
        parse_price_text, ListingVendor, ScrapedPriceItem, SsfListing, VendorListing,
        WorldpacListing,
    };
    use crate::collaborators::VendorSource;
    use crate::domain::offer::{BrandTier, StockStatus};
    use crate::errors::CollaboratorError;

    #[test]
    fn worldpac_json_maps_price_text_and_grade() {
        let listing: WorldpacListing = serde_json::from_value(serde_json::json!({
            "partNumber": "0986494824",
            "brand": "Bosch",
            "description": "QuietCast ceramic pad set - NEW",
            "netPrice": "$1,089.99",
            "availability": "In Stock",
            "qtyOnHand": 6,
            "distanceMiles": 12.0,
            "warrantyMonths": 24,
            "qualityGrade": "OE Equivalent"
        }))
        .expect("worldpac listing");

        let offer = listing.into_offer("worldpac", "Worldpac").expect("offer");
        assert_eq!(offer.price, Decimal::new(108999, 2));
        assert_eq!(offer.brand_tier, Some(BrandTier::OeEquivalent));
        assert_eq!(offer.stock_status, StockStatus::InStock);
        assert_eq!(offer.warranty_term.as_deref(), Some("24 months"));
        assert_eq!(offer.oem_number, "0986494824");
    }

    #[test]
    fn ssf_listing_converts_cents_codes_and_kilometres() {
        let listing: SsfListing = serde_json::from_value(serde_json::json!({
            "part_no": "AN-700K",
            "brand": "Akebono",
            "desc": "ProACT ultra-premium ceramic",
            "unit_price_cents": 9450,
            "stock_code": "L",
            "warehouse_km": 40.0
        }))
        .expect("ssf listing");

        let offer = listing.into_offer("ssf", "SSF Auto Parts").expect("offer");
        assert_eq!(offer.price, Decimal::new(9450, 2));
        assert_eq!(offer.stock_status, StockStatus::LimitedStock);
        assert_eq!(offer.brand_tier, Some(BrandTier::Premium));
        assert!((offer.warehouse_distance_miles - 24.85484).abs() < 1e-6);
    }

    #[test]
    fn scraped_item_sits_at_distance_ceiling() {
        let item = ScrapedPriceItem {
            vendor: None,
            part_number: "45022-TVA-A01".to_owned(),
            brand: "Honda".to_owned(),
            description: String::new(),
            price: 112.5,
            stock_status: "Out of stock".to_owned(),
            warehouse: None,
        };

        let offer = item.into_offer("scraper", "Scraper").expect("offer");
        assert_eq!(offer.warehouse_distance_miles, 50.0);
        assert_eq!(offer.price, Decimal::new(11250, 2));
        assert_eq!(offer.stock_status, StockStatus::OutOfStock);
        assert_eq!(offer.raw_description, "Honda 45022-TVA-A01");
    }

    #[test]
    fn price_text_must_be_numeric() {
        assert_eq!(parse_price_text(" $89.99 ").expect("price"), Decimal::new(8999, 2));
        assert!(matches!(parse_price_text("call for price"), Err(CollaboratorError::Malformed(_))));
    }

    #[tokio::test]
    async fn listing_vendor_answers_by_oem_number() {
        let vendor = ListingVendor::new("ssf", "SSF Auto Parts").with_listing(SsfListing {
            part_no: "AN-700K".to_owned(),
            brand: "Akebono".to_owned(),
            desc: "ProACT ceramic".to_owned(),
            unit_price_cents: 9450,
            stock_code: "Y".to_owned(),
            qty: Some(3),
            warehouse_km: 10.0,
            delivery: None,
            warranty: None,
        });

        assert_eq!(vendor.query("AN-700K").await.expect("offers").len(), 1);
        assert!(vendor.query("UNKNOWN").await.expect("offers").is_empty());
    }
}
