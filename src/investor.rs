use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Investor risk tolerance, ordered from least to most tolerant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RiskProfile {
    Conservative,          // mostly short/medium duration debt
    ModeratelyConservative,
    Balanced,              // roughly even equity/debt with a hybrid sleeve
    ModeratelyAggressive,
    Aggressive,            // equity heavy, small/mid cap tilt
}

static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_\-]+").expect("valid separator pattern"));

impl RiskProfile {
    pub const ALL: [RiskProfile; 5] = [
        RiskProfile::Conservative,
        RiskProfile::ModeratelyConservative,
        RiskProfile::Balanced,
        RiskProfile::ModeratelyAggressive,
        RiskProfile::Aggressive,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RiskProfile::Conservative => "Conservative",
            RiskProfile::ModeratelyConservative => "Moderately Conservative",
            RiskProfile::Balanced => "Balanced",
            RiskProfile::ModeratelyAggressive => "Moderately Aggressive",
            RiskProfile::Aggressive => "Aggressive",
        }
    }
}

impl FromStr for RiskProfile {
    type Err = EngineError;

    /// Case-insensitive; spaces, hyphens and underscores are interchangeable.
    /// Anything else is rejected rather than mapped to a default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = SEPARATORS.replace_all(s.trim(), " ").to_lowercase();
        match normalized.as_str() {
            "conservative" => Ok(RiskProfile::Conservative),
            "moderately conservative" => Ok(RiskProfile::ModeratelyConservative),
            "balanced" => Ok(RiskProfile::Balanced),
            "moderately aggressive" => Ok(RiskProfile::ModeratelyAggressive),
            "aggressive" => Ok(RiskProfile::Aggressive),
            _ => Err(EngineError::UnknownRiskProfile(s.to_string())),
        }
    }
}

impl fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for RiskProfile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}
