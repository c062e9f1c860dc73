//! Weighted brand / price / distance ranking of the offers collected for one part.

use std::cmp::Ordering;

use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::domain::offer::{brand_score, ScoredOffer, Selection, VendorOffer};
use crate::domain::parts::PartCondition;
use crate::errors::EstimateError;

/// Distances at or beyond this many miles score zero.
pub const DISTANCE_CEILING_MILES: f64 = 50.0;
const MAX_COMPONENT_SCORE: f64 = 10.0;

/// Shop-configured relative weights. Any positive numbers; they are normalised before use.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VendorWeights {
    pub brand: f64,
    pub price: f64,
    pub distance: f64,
}

impl Default for VendorWeights {
    fn default() -> Self {
        Self { brand: 40.0, price: 35.0, distance: 25.0 }
    }
}

/// Weights rescaled so they sum to 100.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedWeights {
    pub brand: f64,
    pub price: f64,
    pub distance: f64,
}

impl VendorWeights {
    pub fn new(brand: f64, price: f64, distance: f64) -> Self {
        Self { brand, price, distance }
    }

    pub fn normalized(&self) -> Result<NormalizedWeights, EstimateError> {
        for (name, value) in
            [("brand", self.brand), ("price", self.price), ("distance", self.distance)]
        {
            if !value.is_finite() || value <= 0.0 {
                return Err(EstimateError::InvalidWeights {
                    reason: format!("{name} weight must be a positive number, got {value}"),
                });
            }
        }

        let total = self.brand + self.price + self.distance;

        Ok(NormalizedWeights {
            brand: self.brand / total * 100.0,
            price: self.price / total * 100.0,
            distance: self.distance / total * 100.0,
        })
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor).round() / factor
}

/// Min-max inverse over the current offer set; every offer scores 10 when prices are equal.
pub fn price_score(price: f64, min_price: f64, max_price: f64) -> f64 {
    let spread = max_price - min_price;
    if spread <= 0.0 {
        return MAX_COMPONENT_SCORE;
    }
    (MAX_COMPONENT_SCORE - (price - min_price) / spread * MAX_COMPONENT_SCORE)
        .clamp(0.0, MAX_COMPONENT_SCORE)
}

pub fn distance_score(distance_miles: f64) -> f64 {
    (MAX_COMPONENT_SCORE - distance_miles / DISTANCE_CEILING_MILES * MAX_COMPONENT_SCORE)
        .clamp(0.0, MAX_COMPONENT_SCORE)
}

pub fn composite_score(
    brand: f64,
    price: f64,
    distance: f64,
    weights: &NormalizedWeights,
) -> f64 {
    let raw = (brand * weights.brand + price * weights.price + distance * weights.distance)
        / MAX_COMPONENT_SCORE;
    round_to(raw, 1).clamp(0.0, 100.0)
}

fn price_as_f64(offer: &VendorOffer) -> f64 {
    offer.price.to_f64().unwrap_or(f64::MAX)
}

fn rank_order(left: &ScoredOffer, right: &ScoredOffer) -> Ordering {
    right
        .composite_score
        .total_cmp(&left.composite_score)
        .then_with(|| left.offer.price.cmp(&right.offer.price))
        .then_with(|| {
            left.offer.warehouse_distance_miles.total_cmp(&right.offer.warehouse_distance_miles)
        })
        .then_with(|| left.offer.vendor_id.cmp(&right.offer.vendor_id))
        .then_with(|| left.offer.oem_number.cmp(&right.offer.oem_number))
}

/// Scores and ranks the offers for one part. Rank 1 is Primary, rank 2 Backup.
///
/// `part_description` and `oem_numbers` only feed the error for an empty set.
pub fn score_offers(
    part_description: &str,
    oem_numbers: &[String],
    offers: Vec<(VendorOffer, PartCondition)>,
    weights: &VendorWeights,
) -> Result<Vec<ScoredOffer>, EstimateError> {
    let weights = weights.normalized()?;
    if offers.is_empty() {
        return Err(EstimateError::NoOffersAvailable {
            description: part_description.to_owned(),
            oem_numbers: oem_numbers.to_vec(),
        });
    }

    let prices: Vec<f64> = offers.iter().map(|(offer, _)| price_as_f64(offer)).collect();
    let min_price = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max_price = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut scored: Vec<ScoredOffer> = offers
        .into_iter()
        .zip(prices)
        .map(|((offer, condition), price)| {
            let brand = brand_score(offer.brand_tier);
            let price = price_score(price, min_price, max_price);
            let distance = distance_score(offer.warehouse_distance_miles);
            ScoredOffer {
                composite_score: composite_score(brand, price, distance, &weights),
                brand_score: round_to(brand, 2),
                price_score: round_to(price, 2),
                distance_score: round_to(distance, 2),
                offer,
                condition,
                selection: None,
            }
        })
        .collect();

    scored.sort_by(rank_order);
    if let Some(primary) = scored.get_mut(0) {
        primary.selection = Some(Selection::Primary);
    }
    if let Some(backup) = scored.get_mut(1) {
        backup.selection = Some(Selection::Backup);
    }
    Ok(scored)
}

pub fn primary(scored: &[ScoredOffer]) -> Option<&ScoredOffer> {
    scored.iter().find(|offer| offer.selection == Some(Selection::Primary))
}

pub fn backup(scored: &[ScoredOffer]) -> Option<&ScoredOffer> {
    scored.iter().find(|offer| offer.selection == Some(Selection::Backup))
}
