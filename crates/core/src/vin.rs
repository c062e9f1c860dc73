//! ISO 3779 vehicle identification numbers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::EstimateError;

pub const VIN_LENGTH: usize = 17;
pub const CHECK_DIGIT_INDEX: usize = 8;

const WEIGHTS: [u32; VIN_LENGTH] = [8, 7, 6, 5, 4, 3, 2, 10, 0, 9, 8, 7, 6, 5, 4, 3, 2];

/// Validated, upper-cased 17-character VIN with a correct check digit.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Vin(String);

impl Vin {
    pub fn parse(raw: &str) -> Result<Self, EstimateError> {
        let normalized = raw.trim().to_ascii_uppercase();
        if normalized.chars().count() != VIN_LENGTH {
            return Err(EstimateError::InvalidIdentifier {
                vin: normalized.clone(),
                reason: format!(
                    "expected {VIN_LENGTH} characters, found {}",
                    normalized.chars().count()
                ),
            });
        }

        let expected = compute_check_digit(&normalized).ok_or_else(|| {
            EstimateError::InvalidIdentifier {
                vin: normalized.clone(),
                reason: "contains characters outside the VIN alphabet (I, O and Q are not allowed)"
                    .to_owned(),
            }
        })?;

        let actual = normalized.as_bytes()[CHECK_DIGIT_INDEX] as char;
        if actual != expected {
            return Err(EstimateError::InvalidIdentifier {
                vin: normalized.clone(),
                reason: format!("check digit mismatch: expected `{expected}`, found `{actual}`"),
            });
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn world_manufacturer_identifier(&self) -> &str {
        &self.0[..3]
    }
}

impl fmt::Display for Vin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Vin {
    type Error = EstimateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Vin> for String {
    fn from(value: Vin) -> Self {
        value.0
    }
}

pub fn validate_vin(raw: &str) -> bool {
    Vin::parse(raw).is_ok()
}

fn transliterate(ch: char) -> Option<u32> {
    let value = match ch {
        '0'..='9' => ch.to_digit(10)?,
        'A' | 'J' => 1,
        'B' | 'K' | 'S' => 2,
        'C' | 'L' | 'T' => 3,
        'D' | 'M' | 'U' => 4,
        'E' | 'N' | 'V' => 5,
        'F' | 'W' => 6,
        'G' | 'P' | 'X' => 7,
        'H' | 'Y' => 8,
        'R' | 'Z' => 9,
        _ => return None,
    };
    Some(value)
}

/// Check digit for a 17-character VIN; the character at position 9 is ignored.
/// Returns `None` when the length or alphabet is wrong.
pub fn compute_check_digit(vin: &str) -> Option<char> {
    let upper = vin.trim().to_ascii_uppercase();
    if upper.chars().count() != VIN_LENGTH {
        return None;
    }

    let mut sum = 0u32;
    for (index, ch) in upper.chars().enumerate() {
        let value = transliterate(ch)?;
        sum += value * WEIGHTS[index];
    }

    match sum % 11 {
        10 => Some('X'),
        remainder => char::from_digit(remainder, 10),
    }
}

/// Returns the input with its check digit replaced by the correct one.
pub fn with_check_digit(vin: &str) -> Option<String> {
    let digit = compute_check_digit(vin)?;
    let mut chars: Vec<char> = vin.trim().to_ascii_uppercase().chars().collect();
    chars[CHECK_DIGIT_INDEX] = digit;
    Some(chars.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::{compute_check_digit, validate_vin, with_check_digit, Vin, CHECK_DIGIT_INDEX};
    use crate::errors::EstimateError;

    const VALID: &[&str] = &[
        "1HGBH41JXMN109186",
        "WBA5R1C56LFH12345",
        "5NPE34AF4JH123456",
        "KNDJP3A57K7012345",
        "2T1BURHE8JC123456",
        "11111111111111111",
    ];

    #[test]
    fn known_vins_validate() {
        for vin in VALID {
            assert!(validate_vin(vin), "{vin} should validate");
        }
        assert!(validate_vin(" 1hgbh41jxmn109186 "));
    }

    #[test]
    fn corrupting_any_single_digit_is_detected() {
        for vin in VALID {
            let chars: Vec<char> = vin.chars().collect();
            for index in 0..chars.len() {
                if index == CHECK_DIGIT_INDEX || !chars[index].is_ascii_digit() {
                    continue;
                }
                for replacement in '0'..='9' {
                    if replacement == chars[index] {
                        continue;
                    }
                    let mut mutated = chars.clone();
                    mutated[index] = replacement;
                    let mutated: String = mutated.into_iter().collect();
                    assert!(!validate_vin(&mutated), "{mutated} should fail validation");
                }
            }
        }
    }

    #[test]
    fn wrong_check_digit_reports_expected_value() {
        let error = Vin::parse("1HGBH41J1MN109186").expect_err("bad check digit");
        assert!(matches!(
            error,
            EstimateError::InvalidIdentifier { ref reason, .. } if reason.contains("expected `X`")
        ));
        assert_eq!(with_check_digit("1HGBH41J1MN109186").as_deref(), Some("1HGBH41JXMN109186"));
    }

    #[test]
    fn length_and_alphabet_are_enforced() {
        assert!(!validate_vin("1HGBH41JXMN10918"));
        assert!(!validate_vin("1HGBH41JXMN1091860"));
        assert!(!validate_vin("1HGBH41JXMN1O9186"));
        assert_eq!(compute_check_digit("IIIIIIIIIIIIIIIII"), None);
    }
}
