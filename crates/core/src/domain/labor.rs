use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Catalog entry for one (vehicle, job code) pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaborRecord {
    pub description: String,
    pub hours: Decimal,
    pub source: String,
    #[serde(default)]
    pub procedure_steps: Vec<String>,
    #[serde(default)]
    pub disassembly_triggers: BTreeSet<String>,
    /// Parts the procedure consumes, resolved later against the part catalog.
    #[serde(default)]
    pub part_descriptions: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaborItem {
    pub job_code: String,
    pub description: String,
    pub hours: Decimal,
    pub rate: Decimal,
    pub source: String,
    pub procedure_steps: Vec<String>,
    pub disassembly_triggers: BTreeSet<String>,
}

impl LaborItem {
    pub fn from_record(job_code: impl Into<String>, record: &LaborRecord, rate: Decimal) -> Self {
        Self {
            job_code: job_code.into(),
            description: record.description.clone(),
            hours: record.hours,
            rate,
            source: record.source.clone(),
            procedure_steps: record.procedure_steps.clone(),
            disassembly_triggers: record.disassembly_triggers.clone(),
        }
    }

    pub fn total(&self) -> Decimal {
        self.hours * self.rate
    }

    /// Description, steps and triggers joined for keyword scanning.
    pub fn procedure_text(&self) -> String {
        let mut text = self.description.clone();
        for step in &self.procedure_steps {
            text.push('\n');
            text.push_str(step);
        }
        for trigger in &self.disassembly_triggers {
            text.push('\n');
            text.push_str(trigger);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rust_decimal::Decimal;

    use super::{LaborItem, LaborRecord};

    #[test]
    fn total_is_recomputed_from_hours_and_rate() {
        let record = LaborRecord {
            description: "Front brake pads".to_owned(),
            hours: Decimal::new(12, 1),
            source: "catalog".to_owned(),
            procedure_steps: vec!["Remove wheels".to_owned()],
            disassembly_triggers: BTreeSet::from(["caliper".to_owned()]),
            part_descriptions: Vec::new(),
        };

        let mut item = LaborItem::from_record("BRAKE-PAD", &record, Decimal::new(150, 0));
        assert_eq!(item.total(), Decimal::new(18000, 2));

        item.hours = Decimal::new(2, 0);
        assert_eq!(item.total(), Decimal::new(300, 0));
        assert!(item.procedure_text().contains("caliper"));
    }
}
