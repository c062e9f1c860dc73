use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::config::{PartsRounding, ShopConfig};
use crate::domain::estimate::{EstimateBreakdown, PricedPart, ServiceKit};
use crate::domain::job::JobType;
use crate::domain::labor::LaborItem;
use crate::errors::EstimateError;

struct KitSpec {
    job_type: JobType,
    name: &'static str,
    price_cents: i64,
    includes: &'static [&'static str],
}

const GENERAL_KIT: KitSpec = KitSpec {
    job_type: JobType::General,
    name: "General Service Cleaning Kit",
    price_cents: 1200,
    includes: &["All-purpose cleaner", "Shop towels"],
};

const KITS: &[KitSpec] = &[
    KitSpec {
        job_type: JobType::BrakeService,
        name: "Brake Service Cleaning Kit",
        price_cents: 1500,
        includes: &["Brake cleaner", "Caliper grease", "Disposable gloves"],
    },
    KitSpec {
        job_type: JobType::EngineRepair,
        name: "Engine Service Cleaning Kit",
        price_cents: 2000,
        includes: &["Degreaser", "Shop towels", "Oil absorbent"],
    },
    KitSpec {
        job_type: JobType::AcService,
        name: "AC Service Cleaning Kit",
        price_cents: 1800,
        includes: &["UV dye", "Leak sealant", "O-ring lubricant"],
    },
    KitSpec {
        job_type: JobType::Transmission,
        name: "Transmission Service Cleaning Kit",
        price_cents: 1600,
        includes: &["Fluid funnel", "Shop towels", "Spill mat"],
    },
    KitSpec {
        job_type: JobType::Suspension,
        name: "Suspension Service Cleaning Kit",
        price_cents: 1400,
        includes: &["Penetrating oil", "Shop towels", "Grease"],
    },
    GENERAL_KIT,
];

/// Flat-fee consumables kit for a job type; unmatched types get the general kit.
pub fn service_kit(job_type: JobType) -> ServiceKit {
    let spec = KITS.iter().find(|kit| kit.job_type == job_type).unwrap_or(&GENERAL_KIT);
    ServiceKit {
        job_type: spec.job_type,
        name: spec.name.to_owned(),
        price: Decimal::new(spec.price_cents, 2),
        includes: spec.includes.iter().map(|item| (*item).to_owned()).collect(),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimateInputs {
    pub labor: Vec<LaborItem>,
    pub parts: Vec<PricedPart>,
    pub job_type: JobType,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTrace {
    pub steps: Vec<PricingTraceStep>,
}

impl PricingTrace {
    fn push(&mut self, stage: &str, detail: String, amount: Decimal) {
        self.steps.push(PricingTraceStep { stage: stage.to_owned(), detail, amount });
    }
}

/// Totals plus the exact inputs they were computed from, so the run can be replayed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimateCalculation {
    pub breakdown: EstimateBreakdown,
    pub trace: PricingTrace,
    pub inputs: EstimateInputs,
}

pub trait EstimateCalculator: Send + Sync {
    fn calculate(&self, inputs: EstimateInputs) -> Result<EstimateCalculation, EstimateError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeterministicEstimateCalculator {
    pub tax_rate: Decimal,
    pub rounding: PartsRounding,
}

impl DeterministicEstimateCalculator {
    pub fn new(tax_rate: Decimal, rounding: PartsRounding) -> Self {
        Self { tax_rate, rounding }
    }

    pub fn from_shop(shop: &ShopConfig) -> Self {
        Self::new(shop.tax_rate, shop.parts_rounding)
    }
}

impl EstimateCalculator for DeterministicEstimateCalculator {
    fn calculate(&self, inputs: EstimateInputs) -> Result<EstimateCalculation, EstimateError> {
        calculate_estimate(inputs, self.tax_rate, self.rounding)
    }
}

pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn reject_negative(field: &str, value: Decimal) -> Result<(), EstimateError> {
    if value < Decimal::ZERO {
        return Err(EstimateError::InvalidEstimateInput {
            field: field.to_owned(),
            value: value.to_string(),
        });
    }
    Ok(())
}

fn validate(inputs: &EstimateInputs, tax_rate: Decimal) -> Result<(), EstimateError> {
    for item in &inputs.labor {
        reject_negative(&format!("labor[{}].hours", item.job_code), item.hours)?;
        if item.rate <= Decimal::ZERO {
            return Err(EstimateError::InvalidEstimateInput {
                field: format!("labor[{}].rate", item.job_code),
                value: item.rate.to_string(),
            });
        }
    }
    for part in &inputs.parts {
        reject_negative(&format!("parts[{}].quantity", part.oem_number), part.quantity)?;
        reject_negative(&format!("parts[{}].vendor_cost", part.oem_number), part.vendor_cost)?;
        reject_negative(&format!("parts[{}].markup_pct", part.oem_number), part.markup_pct)?;
    }
    if tax_rate < Decimal::ZERO || tax_rate >= Decimal::ONE {
        return Err(EstimateError::InvalidEstimateInput {
            field: "tax_rate".to_owned(),
            value: tax_rate.to_string(),
        });
    }
    Ok(())
}

/// Labor and parts are rounded to cents once aggregated (or per line under
/// `PartsRounding::PerLine`), then tax is computed on the rounded subtotal.
pub fn calculate_estimate(
    inputs: EstimateInputs,
    tax_rate: Decimal,
    rounding: PartsRounding,
) -> Result<EstimateCalculation, EstimateError> {
    validate(&inputs, tax_rate)?;
    let mut trace = PricingTrace::default();

    let labor_total = round_cents(inputs.labor.iter().map(LaborItem::total).sum());
    trace.push("labor", "sum(hours * rate)".to_owned(), labor_total);

    let parts_total = match rounding {
        PartsRounding::Aggregate => {
            round_cents(inputs.parts.iter().map(PricedPart::line_total).sum())
        }
        PartsRounding::PerLine => {
            inputs.parts.iter().map(|part| round_cents(part.line_total())).sum()
        }
    };
    let parts_detail = match rounding {
        PartsRounding::Aggregate => "round(sum(cost * quantity * (1 + markup)))",
        PartsRounding::PerLine => "sum(round(cost * quantity * (1 + markup)))",
    };
    trace.push("parts", parts_detail.to_owned(), parts_total);

    let subtotal = labor_total + parts_total;
    trace.push("subtotal", "labor + parts".to_owned(), subtotal);

    let tax_amount = round_cents(subtotal * tax_rate);
    trace.push("tax", format!("subtotal * {tax_rate}"), tax_amount);

    let cleaning_kit = service_kit(inputs.job_type);
    trace.push("service_kit", cleaning_kit.name.clone(), cleaning_kit.price);

    let grand_total = subtotal + tax_amount + cleaning_kit.price;
    trace.push("total", "subtotal + tax + kit".to_owned(), grand_total);

    Ok(EstimateCalculation {
        breakdown: EstimateBreakdown {
            labor_total,
            parts_total,
            subtotal,
            tax_rate,
            tax_amount,
            cleaning_kit,
            grand_total,
        },
        trace,
        inputs,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rust_decimal::Decimal;

    use super::{
        calculate_estimate, service_kit, DeterministicEstimateCalculator, EstimateCalculator,
        EstimateInputs,
    };
    use crate::config::PartsRounding;
    use crate::domain::estimate::PricedPart;
    use crate::domain::job::JobType;
    use crate::domain::labor::LaborItem;
    use crate::errors::EstimateError;

    fn brake_job() -> EstimateInputs {
        let part = |oem: &str, cents: i64| PricedPart {
            oem_number: oem.to_owned(),
            description: "Brake part".to_owned(),
            condition: None,
            vendor_id: None,
            vendor_cost: Decimal::new(cents, 2),
            markup_pct: Decimal::new(30, 0),
            quantity: Decimal::ONE,
            reason_badge: None,
        };
        EstimateInputs {
            labor: vec![LaborItem {
                job_code: "BRAKE-PAD".to_owned(),
                description: "Front brake pad replacement".to_owned(),
                hours: Decimal::new(12, 1),
                rate: Decimal::new(150, 0),
                source: "book".to_owned(),
                procedure_steps: Vec::new(),
                disassembly_triggers: BTreeSet::new(),
            }],
            parts: vec![part("45022-TVA-A01", 8999), part("BRK-CLN-01", 899)],
            job_type: JobType::BrakeService,
        }
    }

    #[test]
    fn aggregate_rounding_rounds_parts_once() {
        let calculation =
            calculate_estimate(brake_job(), Decimal::new(925, 4), PartsRounding::Aggregate)
                .expect("calculation");
        let breakdown = &calculation.breakdown;

        assert_eq!(breakdown.labor_total, Decimal::new(18000, 2));
        assert_eq!(breakdown.parts_total, Decimal::new(12867, 2));
        assert_eq!(breakdown.subtotal, Decimal::new(30867, 2));
        assert_eq!(breakdown.tax_amount, Decimal::new(2855, 2));
        assert_eq!(breakdown.cleaning_kit.price, Decimal::new(1500, 2));
        assert_eq!(breakdown.grand_total, Decimal::new(35222, 2));
        assert_eq!(calculation.trace.steps.len(), 6);
    }

    #[test]
    fn per_line_rounding_matches_invoice_lines() {
        let breakdown =
            calculate_estimate(brake_job(), Decimal::new(925, 4), PartsRounding::PerLine)
                .expect("calculation")
                .breakdown;

        assert_eq!(breakdown.parts_total, Decimal::new(12868, 2));
        assert_eq!(breakdown.subtotal, Decimal::new(30868, 2));
        assert_eq!(breakdown.tax_amount, Decimal::new(2855, 2));
        assert_eq!(breakdown.grand_total, Decimal::new(35223, 2));
    }

    #[test]
    fn recalculating_from_returned_inputs_is_idempotent() {
        let calculator =
            DeterministicEstimateCalculator::new(Decimal::new(925, 4), PartsRounding::Aggregate);
        let first = calculator.calculate(brake_job()).expect("first");
        let second = calculator.calculate(first.inputs.clone()).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn negative_inputs_are_rejected() {
        let mut inputs = brake_job();
        inputs.labor[0].hours = Decimal::new(-1, 0);
        let error = calculate_estimate(inputs, Decimal::new(925, 4), PartsRounding::Aggregate)
            .expect_err("negative hours");
        assert!(matches!(
            error,
            EstimateError::InvalidEstimateInput { ref field, .. }
                if field == "labor[BRAKE-PAD].hours"
        ));

        let mut inputs = brake_job();
        inputs.parts[1].quantity = Decimal::new(-2, 0);
        let result = calculate_estimate(inputs, Decimal::new(925, 4), PartsRounding::Aggregate);
        assert!(result.is_err());

        assert!(calculate_estimate(brake_job(), Decimal::ONE, PartsRounding::Aggregate).is_err());
    }

    #[test]
    fn zero_labor_rate_is_rejected() {
        let mut inputs = brake_job();
        inputs.labor[0].rate = Decimal::ZERO;
        let error = calculate_estimate(inputs, Decimal::new(925, 4), PartsRounding::Aggregate)
            .expect_err("zero rate");
        assert!(matches!(
            error,
            EstimateError::InvalidEstimateInput { ref field, .. }
                if field == "labor[BRAKE-PAD].rate"
        ));
    }

    #[test]
    fn unmatched_job_type_gets_general_kit() {
        assert_eq!(service_kit(JobType::Electrical).price, Decimal::new(1200, 2));
        assert_eq!(service_kit(JobType::AcService).name, "AC Service Cleaning Kit");
        assert_eq!(service_kit(JobType::Transmission).includes.len(), 3);
    }

    #[test]
    fn empty_job_is_kit_only() {
        let inputs =
            EstimateInputs { labor: Vec::new(), parts: Vec::new(), job_type: JobType::General };
        let breakdown = calculate_estimate(inputs, Decimal::new(925, 4), PartsRounding::Aggregate)
            .expect("calculation")
            .breakdown;
        assert_eq!(breakdown.grand_total, Decimal::new(1200, 2));
    }
}
