use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::job::JobType;
use crate::domain::parts::Condition;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedPart {
    pub oem_number: String,
    pub description: String,
    pub condition: Option<Condition>,
    pub vendor_id: Option<String>,
    pub vendor_cost: Decimal,
    pub markup_pct: Decimal,
    pub quantity: Decimal,
    pub reason_badge: Option<String>,
}

impl PricedPart {
    pub fn markup_rate(&self) -> Decimal {
        self.markup_pct / Decimal::ONE_HUNDRED
    }

    pub fn customer_unit_price(&self) -> Decimal {
        self.vendor_cost * (Decimal::ONE + self.markup_rate())
    }

    /// Unrounded line total; rounding is applied by the calculator.
    pub fn line_total(&self) -> Decimal {
        self.vendor_cost * self.quantity * (Decimal::ONE + self.markup_rate())
    }

    pub fn condition_tag(&self) -> Option<&'static str> {
        self.condition.map(|condition| condition.display_tag())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceKit {
    pub job_type: JobType,
    pub name: String,
    pub price: Decimal,
    pub includes: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimateBreakdown {
    pub labor_total: Decimal,
    pub parts_total: Decimal,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub cleaning_kit: ServiceKit,
    pub grand_total: Decimal,
}
