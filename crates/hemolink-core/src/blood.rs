//! The fixed ABO/Rh blood-type enumeration.
//!
//! Exactly eight types exist; everything else is rejected at the parse
//! boundary. Serialized form matches the document schema used by the
//! coordination service (`"A+"`, `"O-"`, ...).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the eight ABO/Rh blood types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APos,
    #[serde(rename = "A-")]
    ANeg,
    #[serde(rename = "B+")]
    BPos,
    #[serde(rename = "B-")]
    BNeg,
    #[serde(rename = "AB+")]
    AbPos,
    #[serde(rename = "AB-")]
    AbNeg,
    #[serde(rename = "O+")]
    OPos,
    #[serde(rename = "O-")]
    ONeg,
}

/// All eight types in conventional listing order.
pub const ALL_BLOOD_TYPES: [BloodType; 8] = [
    BloodType::APos,
    BloodType::ANeg,
    BloodType::BPos,
    BloodType::BNeg,
    BloodType::AbPos,
    BloodType::AbNeg,
    BloodType::OPos,
    BloodType::ONeg,
];

impl BloodType {
    /// Canonical string form, identical to the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            BloodType::APos => "A+",
            BloodType::ANeg => "A-",
            BloodType::BPos => "B+",
            BloodType::BNeg => "B-",
            BloodType::AbPos => "AB+",
            BloodType::AbNeg => "AB-",
            BloodType::OPos => "O+",
            BloodType::ONeg => "O-",
        }
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a string is not one of the eight ABO/Rh types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown blood type: {0:?}")]
pub struct ParseBloodTypeError(pub String);

impl FromStr for BloodType {
    type Err = ParseBloodTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_BLOOD_TYPES
            .iter()
            .find(|bt| bt.as_str() == s)
            .copied()
            .ok_or_else(|| ParseBloodTypeError(s.to_string()))
    }
}
