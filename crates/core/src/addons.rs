//! Supplementary parts implied by the labor procedure (gaskets, fluids, consumables).

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::labor::LaborItem;

struct AddOnPartDef {
    part_name: &'static str,
    part_number: &'static str,
    category: &'static str,
    price_cents: i64,
    reason: &'static str,
}

struct AddOnRuleDef {
    name: &'static str,
    keywords: &'static [&'static str],
    parts: &'static [AddOnPartDef],
}

const STANDARD_RULES: &[AddOnRuleDef] = &[
    AddOnRuleDef {
        name: "plenum_removal",
        keywords: &[
            "plenum removal",
            "intake manifold removal",
            "remove plenum",
            "remove intake manifold",
        ],
        parts: &[
            AddOnPartDef {
                part_name: "Intake Plenum Gasket",
                part_number: "PLN-GSK-001",
                category: "gaskets",
                price_cents: 2499,
                reason: "Plenum must be resealed after removal",
            },
            AddOnPartDef {
                part_name: "Intake Manifold Gasket Set",
                part_number: "INT-GSK-SET",
                category: "gaskets",
                price_cents: 3499,
                reason: "Required for manifold reassembly",
            },
        ],
    },
    AddOnRuleDef {
        name: "valve_cover",
        keywords: &["valve cover", "remove valve cover", "valve cover gasket"],
        parts: &[
            AddOnPartDef {
                part_name: "Valve Cover Gasket",
                part_number: "VC-GSK-001",
                category: "gaskets",
                price_cents: 2899,
                reason: "Always replace when removing valve cover",
            },
            AddOnPartDef {
                part_name: "Spark Plug Tube Seals",
                part_number: "SP-SEAL-SET",
                category: "seals",
                price_cents: 1899,
                reason: "Prevents oil leaks into spark plug wells",
            },
        ],
    },
    AddOnRuleDef {
        name: "brake_service",
        keywords: &["brake pad", "brake service", "brake rotor", "brake caliper", "replace pads"],
        parts: &[
            AddOnPartDef {
                part_name: "Brake Cleaner",
                part_number: "BC-CLN-001",
                category: "consumables",
                price_cents: 899,
                reason: "Required for proper brake pad installation",
            },
            AddOnPartDef {
                part_name: "Anti-Seize Compound",
                part_number: "AS-CMP-001",
                category: "consumables",
                price_cents: 1299,
                reason: "Prevents caliper slide pin seizure",
            },
            AddOnPartDef {
                part_name: "Brake Hardware Kit",
                part_number: "BRK-HW-KIT",
                category: "hardware",
                price_cents: 1599,
                reason: "Includes clips and springs for proper operation",
            },
        ],
    },
    AddOnRuleDef {
        name: "coolant_system",
        keywords: &["coolant flush", "radiator flush", "thermostat", "water pump", "coolant leak"],
        parts: &[
            AddOnPartDef {
                part_name: "Coolant/Antifreeze (1 gal)",
                part_number: "CLT-AF-001",
                category: "fluids",
                price_cents: 2499,
                reason: "System refill after service",
            },
            AddOnPartDef {
                part_name: "Radiator Cap",
                part_number: "RAD-CAP-001",
                category: "parts",
                price_cents: 1299,
                reason: "Inspect/replace when servicing cooling system",
            },
            AddOnPartDef {
                part_name: "Thermostat Gasket",
                part_number: "THM-GSK-001",
                category: "gaskets",
                price_cents: 899,
                reason: "Required when replacing thermostat",
            },
        ],
    },
    AddOnRuleDef {
        name: "oil_change",
        keywords: &["oil change", "engine oil", "oil filter"],
        parts: &[AddOnPartDef {
            part_name: "Drain Plug Gasket",
            part_number: "DRN-GSK-001",
            category: "gaskets",
            price_cents: 299,
            reason: "Replace every oil change to prevent leaks",
        }],
    },
    AddOnRuleDef {
        name: "timing_belt",
        keywords: &["timing belt", "timing chain", "timing tensioner"],
        parts: &[
            AddOnPartDef {
                part_name: "Timing Belt Tensioner",
                part_number: "TM-TNS-001",
                category: "parts",
                price_cents: 8999,
                reason: "Always replace with timing belt",
            },
            AddOnPartDef {
                part_name: "Timing Belt Idler Pulley",
                part_number: "TM-IDL-001",
                category: "parts",
                price_cents: 3499,
                reason: "Wear item, replace with belt",
            },
            AddOnPartDef {
                part_name: "Water Pump",
                part_number: "WP-001",
                category: "parts",
                price_cents: 7999,
                reason: "Recommended replacement while already accessible",
            },
        ],
    },
    AddOnRuleDef {
        name: "transmission_service",
        keywords: &["transmission fluid", "trans flush", "transmission service", "atf"],
        parts: &[
            AddOnPartDef {
                part_name: "Transmission Filter Kit",
                part_number: "TRS-FLT-KIT",
                category: "filters",
                price_cents: 4599,
                reason: "Replace filter when servicing transmission",
            },
            AddOnPartDef {
                part_name: "Transmission Pan Gasket",
                part_number: "TRS-PAN-GSK",
                category: "gaskets",
                price_cents: 1899,
                reason: "Replace when removing pan",
            },
        ],
    },
    AddOnRuleDef {
        name: "exhaust_work",
        keywords: &["exhaust", "catalytic converter", "muffler", "exhaust manifold"],
        parts: &[
            AddOnPartDef {
                part_name: "Exhaust Gasket",
                part_number: "EXH-GSK-001",
                category: "gaskets",
                price_cents: 1499,
                reason: "Required for exhaust connections",
            },
            AddOnPartDef {
                part_name: "Exhaust Bolts/Studs Kit",
                part_number: "EXH-HW-KIT",
                category: "hardware",
                price_cents: 2299,
                reason: "Often corroded and break during removal",
            },
        ],
    },
    AddOnRuleDef {
        name: "suspension",
        keywords: &["strut", "shock", "control arm", "ball joint", "tie rod"],
        parts: &[AddOnPartDef {
            part_name: "Alignment Service",
            part_number: "SVC-ALIGN",
            category: "labor",
            price_cents: 8999,
            reason: "Required after suspension work",
        }],
    },
    AddOnRuleDef {
        // No bare "ac" keyword: it is a substring of most procedure text.
        name: "ac_service",
        keywords: &["a/c", "air conditioning", "compressor", "condenser", "evaporator"],
        parts: &[
            AddOnPartDef {
                part_name: "R-134a Refrigerant",
                part_number: "AC-R134A",
                category: "fluids",
                price_cents: 4599,
                reason: "System recharge after repair",
            },
            AddOnPartDef {
                part_name: "AC O-Ring Kit",
                part_number: "AC-ORING-KIT",
                category: "seals",
                price_cents: 1899,
                reason: "Replace seals to prevent leaks",
            },
            AddOnPartDef {
                part_name: "PAG Oil",
                part_number: "AC-PAG-OIL",
                category: "fluids",
                price_cents: 2299,
                reason: "Required for compressor lubrication",
            },
        ],
    },
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOnPart {
    pub part_name: String,
    pub part_number: String,
    pub category: String,
    pub unit_cost: Decimal,
    pub quantity: u32,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOnRule {
    pub name: String,
    pub keywords: Vec<String>,
    pub parts: Vec<AddOnPart>,
}

impl AddOnRule {
    /// "brake_service" becomes "Brake Service".
    pub fn label(&self) -> String {
        self.name
            .split('_')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn matched_keyword(&self, text_lower: &str) -> Option<&str> {
        self.keywords
            .iter()
            .map(String::as_str)
            .find(|keyword| text_lower.contains(&keyword.to_lowercase()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedAddOn {
    pub rule: String,
    pub matched_keyword: String,
    pub part: AddOnPart,
    pub reason_badge: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddOnEngine {
    rules: Vec<AddOnRule>,
}

impl Default for AddOnEngine {
    fn default() -> Self {
        Self::standard()
    }
}

impl AddOnEngine {
    pub fn new(rules: Vec<AddOnRule>) -> Self {
        Self { rules }
    }

    pub fn standard() -> Self {
        let rules = STANDARD_RULES
            .iter()
            .map(|rule| AddOnRule {
                name: rule.name.to_owned(),
                keywords: rule.keywords.iter().map(|keyword| (*keyword).to_owned()).collect(),
                parts: rule
                    .parts
                    .iter()
                    .map(|part| AddOnPart {
                        part_name: part.part_name.to_owned(),
                        part_number: part.part_number.to_owned(),
                        category: part.category.to_owned(),
                        unit_cost: Decimal::new(part.price_cents, 2),
                        quantity: 1,
                        reason: part.reason.to_owned(),
                    })
                    .collect(),
            })
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[AddOnRule] {
        &self.rules
    }

    /// Case-insensitive substring scan; each rule fires at most once and part numbers are unique.
    pub fn detect_in_text(&self, procedure_text: &str) -> Vec<DetectedAddOn> {
        let text_lower = procedure_text.to_lowercase();
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut detected = Vec::new();

        for rule in &self.rules {
            let Some(keyword) = rule.matched_keyword(&text_lower) else {
                continue;
            };
            let label = rule.label();
            for part in &rule.parts {
                if !seen.insert(part.part_number.clone()) {
                    continue;
                }
                detected.push(DetectedAddOn {
                    rule: rule.name.clone(),
                    matched_keyword: keyword.to_owned(),
                    part: part.clone(),
                    reason_badge: format!("{label} → {}", part.part_name),
                });
            }
        }

        detected
    }

    pub fn detect(&self, labor: &LaborItem) -> Vec<DetectedAddOn> {
        self.detect_in_text(&labor.procedure_text())
    }
}
