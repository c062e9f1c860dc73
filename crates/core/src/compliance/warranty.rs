use crate::domain::compliance::{ComplianceFlag, FlagKind, FlagSeverity};

pub const EXTENDED_POWERTRAIN_MAKES: &[&str] = &["HYUNDAI", "KIA"];

const POWERTRAIN_COMPONENTS: &[&str] = &[
    "engine",
    "motor",
    "transmission",
    "transaxle",
    "transfer case",
    "drive shaft",
    "driveshaft",
    "differential",
    "axle",
    "turbo",
    "supercharger",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WarrantyInput<'a> {
    pub model_year: i32,
    pub as_of_year: i32,
    pub make: &'a str,
    pub mileage: u32,
    pub complaint: &'a str,
}

impl WarrantyInput<'_> {
    pub fn vehicle_age(&self) -> i32 {
        (self.as_of_year - self.model_year).max(0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WarrantyRule {
    BumperToBumper,
    Powertrain,
    ExtendedPowertrain,
}

const RULES: [WarrantyRule; 3] =
    [WarrantyRule::BumperToBumper, WarrantyRule::Powertrain, WarrantyRule::ExtendedPowertrain];

impl WarrantyRule {
    fn applies(&self, input: &WarrantyInput<'_>) -> bool {
        let age = input.vehicle_age();
        match self {
            Self::BumperToBumper => age < 3 && input.mileage < 36_000,
            Self::Powertrain => age < 5 && input.mileage < 60_000,
            Self::ExtendedPowertrain => {
                let make = input.make.trim().to_ascii_uppercase();
                EXTENDED_POWERTRAIN_MAKES.contains(&make.as_str())
                    && age < 10
                    && input.mileage < 100_000
            }
        }
    }

    fn flag(&self, input: &WarrantyInput<'_>) -> ComplianceFlag {
        let vehicle = format!("{} {} with {} miles", input.model_year, input.make, input.mileage);
        let (severity, title, message, action, coverage) = match self {
            Self::BumperToBumper => (
                FlagSeverity::Warning,
                "Bumper-to-Bumper",
                format!("{vehicle} is likely under bumper-to-bumper warranty"),
                "Verify coverage with the customer before proceeding".to_owned(),
                "3 years / 36,000 miles",
            ),
            Self::Powertrain => {
                let powertrain_repair = is_powertrain_related(input.complaint);
                let severity =
                    if powertrain_repair { FlagSeverity::Warning } else { FlagSeverity::Info };
                let action = if powertrain_repair {
                    "Powertrain repair, likely covered; consider referring to the dealer"
                } else {
                    "Check whether the repair is powertrain-related"
                };
                (
                    severity,
                    "Powertrain",
                    format!("{vehicle} may have powertrain warranty coverage"),
                    action.to_owned(),
                    "5 years / 60,000 miles",
                )
            }
            Self::ExtendedPowertrain => (
                FlagSeverity::Warning,
                "Extended powertrain",
                format!("{} 10-year/100k powertrain warranty may apply", input.make.trim()),
                "Verify extended coverage before proceeding".to_owned(),
                "10 years / 100,000 miles",
            ),
        };

        ComplianceFlag {
            kind: FlagKind::Warranty,
            severity,
            title: title.to_owned(),
            message,
            recommended_action: action,
            campaign_number: None,
            coverage: Some(coverage.to_owned()),
        }
    }
}

pub fn is_powertrain_related(complaint: &str) -> bool {
    let lowered = complaint.to_lowercase();
    POWERTRAIN_COMPONENTS.iter().any(|component| lowered.contains(component))
}

/// Every matching rule contributes a flag; advisory only.
pub fn check_warranty(input: &WarrantyInput<'_>) -> Vec<ComplianceFlag> {
    RULES.iter().filter(|rule| rule.applies(input)).map(|rule| rule.flag(input)).collect()
}

#[cfg(test)]
mod tests {
    use super::{check_warranty, WarrantyInput};
    use crate::domain::compliance::FlagSeverity;

    fn input<'a>(age: i32, make: &'a str, mileage: u32, complaint: &'a str) -> WarrantyInput<'a> {
        WarrantyInput { model_year: 2026 - age, as_of_year: 2026, make, mileage, complaint }
    }

    #[test]
    fn young_bmw_gets_exactly_one_bumper_warning() {
        let flags = check_warranty(&input(2, "BMW", 20_000, "squeaky brakes"));

        let warnings: Vec<_> =
            flags.iter().filter(|flag| flag.severity == FlagSeverity::Warning).collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].title, "Bumper-to-Bumper");
        assert!(flags.iter().all(|flag| flag.title != "Extended powertrain"));
    }

    #[test]
    fn eight_year_old_hyundai_fires_only_extended_rule() {
        let flags = check_warranty(&input(8, "Hyundai", 80_000, "oil leak"));

        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].title, "Extended powertrain");
        assert_eq!(flags[0].severity, FlagSeverity::Warning);
    }

    #[test]
    fn extended_rule_is_limited_to_hyundai_and_kia() {
        assert!(check_warranty(&input(8, "Toyota", 80_000, "")).is_empty());
        assert_eq!(check_warranty(&input(8, "kia", 80_000, "")).len(), 1);
    }

    #[test]
    fn powertrain_flag_escalates_for_powertrain_complaints() {
        let routine = check_warranty(&input(4, "Honda", 50_000, "brake pads"));
        assert_eq!(routine.len(), 1);
        assert_eq!(routine[0].severity, FlagSeverity::Info);

        let powertrain = check_warranty(&input(4, "Honda", 50_000, "Transmission slipping"));
        assert_eq!(powertrain[0].severity, FlagSeverity::Warning);
    }

    #[test]
    fn boundaries_are_exclusive() {
        assert!(check_warranty(&input(3, "Honda", 35_999, ""))
            .iter()
            .all(|flag| flag.title != "Bumper-to-Bumper"));
        assert!(check_warranty(&input(2, "Honda", 36_000, ""))
            .iter()
            .all(|flag| flag.title != "Bumper-to-Bumper"));
        assert!(check_warranty(&input(5, "Honda", 10_000, "")).is_empty());
    }
}
