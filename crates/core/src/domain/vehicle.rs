use serde::{Deserialize, Serialize};

use crate::vin::Vin;

/// Decoded vehicle record. Built once by the identity resolver and only read afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleIdentity {
    pub vin: Vin,
    pub year: i32,
    pub make: String,
    pub model: String,
    pub trim: Option<String>,
    pub engine: Option<String>,
    pub drivetrain: Option<String>,
    pub body_style: Option<String>,
}

impl VehicleIdentity {
    pub fn describe(&self) -> String {
        match &self.trim {
            Some(trim) => format!("{} {} {} {}", self.year, self.make, self.model, trim),
            None => format!("{} {} {}", self.year, self.make, self.model),
        }
    }

    /// Catalog key used by labor and parts lookups (year, make, model; case-folded).
    pub fn catalog_key(&self) -> VehicleKey {
        VehicleKey::new(self.year, &self.make, &self.model)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleKey {
    pub year: i32,
    pub make: String,
    pub model: String,
}

impl VehicleKey {
    pub fn new(year: i32, make: &str, model: &str) -> Self {
        Self {
            year,
            make: make.trim().to_ascii_uppercase(),
            model: model.trim().to_ascii_uppercase(),
        }
    }
}
