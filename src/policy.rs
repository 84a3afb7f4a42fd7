//! Risk profile → target asset-class weights and expected return band.
//!
//! The table is small and explicit: one row per profile, validated once when
//! it is built so lookups never have to re-check it.

use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::catalog::AssetClass;
use crate::error::{EngineError, Result};
use crate::investor::RiskProfile;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Expected annualized return range, percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReturnBand {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllocationPolicy {
    pub profile: RiskProfile,
    /// Target weight per class in [0, 1]; every class is present.
    pub weights: BTreeMap<AssetClass, f64>,
    pub expected_returns: ReturnBand,
}

impl AllocationPolicy {
    pub fn weight(&self, class: AssetClass) -> f64 {
        self.weights.get(&class).copied().unwrap_or(0.0)
    }

    pub fn equity_weight(&self) -> f64 {
        self.weights.iter().filter(|(c, _)| c.is_equity()).map(|(_, w)| w).sum()
    }

    pub fn debt_weight(&self) -> f64 {
        self.weights.iter().filter(|(c, _)| c.is_debt()).map(|(_, w)| w).sum()
    }
}

/// Raw row: weights in `AssetClass::ALL` order, then the return band.
pub type PolicyRow = (RiskProfile, [f64; 6], (f64, f64));

//                                  LargeCap MidCap SmallCap DebtShort DebtMed Hybrid
const STANDARD_ROWS: [PolicyRow; 5] = [
    (RiskProfile::Conservative,           [0.10, 0.02, 0.00, 0.40, 0.33, 0.15], (6.0, 8.0)),
    (RiskProfile::ModeratelyConservative, [0.20, 0.05, 0.02, 0.30, 0.25, 0.18], (7.0, 9.5)),
    (RiskProfile::Balanced,               [0.30, 0.10, 0.05, 0.20, 0.15, 0.20], (8.0, 11.0)),
    (RiskProfile::ModeratelyAggressive,   [0.35, 0.17, 0.10, 0.12, 0.10, 0.16], (9.5, 13.0)),
    (RiskProfile::Aggressive,             [0.40, 0.22, 0.15, 0.05, 0.03, 0.15], (11.0, 15.5)),
];

static STANDARD: OnceCell<PolicyTable> = OnceCell::new();

#[derive(Debug, Clone)]
pub struct PolicyTable {
    policies: Vec<AllocationPolicy>,
}

impl PolicyTable {
    /// The built-in table, constructed and validated on first use.
    pub fn standard() -> Result<&'static PolicyTable> {
        STANDARD.get_or_try_init(|| PolicyTable::from_rows(&STANDARD_ROWS))
    }

    pub fn from_rows(rows: &[PolicyRow]) -> Result<Self> {
        let policies = rows
            .iter()
            .map(|(profile, weights, (min, max))| AllocationPolicy {
                profile: *profile,
                weights: AssetClass::ALL.iter().copied().zip(weights.iter().copied()).collect(),
                expected_returns: ReturnBand { min: *min, max: *max },
            })
            .collect();
        let table = PolicyTable { policies };
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<()> {
        for profile in RiskProfile::ALL {
            let count = self.policies.iter().filter(|p| p.profile == profile).count();
            if count != 1 {
                return Err(EngineError::InvalidPolicy(format!(
                    "profile {} has {} rows, expected exactly one",
                    profile, count
                )));
            }
        }

        for policy in &self.policies {
            if let Some((class, w)) = policy.weights.iter().find(|(_, w)| !(0.0..=1.0).contains(*w)) {
                return Err(EngineError::InvalidPolicy(format!(
                    "{} weight for {} is {} (must be within [0, 1])",
                    policy.profile, class, w
                )));
            }

            let sum: f64 = policy.weights.values().sum();
            if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                return Err(EngineError::InvalidPolicy(format!(
                    "{} weights sum to {} instead of 1.0",
                    policy.profile, sum
                )));
            }

            let band = policy.expected_returns;
            if !(band.min <= band.max) {
                return Err(EngineError::InvalidPolicy(format!(
                    "{} return band {}..{} is inverted",
                    policy.profile, band.min, band.max
                )));
            }
        }

        // Neighbouring profiles: less debt, more equity, higher and wider band.
        let mut ordered: Vec<&AllocationPolicy> = self.policies.iter().collect();
        ordered.sort_by_key(|p| p.profile);
        for pair in ordered.windows(2) {
            let (lower, higher) = (pair[0], pair[1]);
            if higher.debt_weight() > lower.debt_weight() + WEIGHT_SUM_TOLERANCE
                || higher.equity_weight() + WEIGHT_SUM_TOLERANCE < lower.equity_weight()
            {
                return Err(EngineError::InvalidPolicy(format!(
                    "{} must not hold more debt or less equity than {}",
                    higher.profile, lower.profile
                )));
            }
            let (lo, hi) = (lower.expected_returns, higher.expected_returns);
            if hi.min < lo.min || hi.max <= lo.max || (hi.max - hi.min) < (lo.max - lo.min) {
                return Err(EngineError::InvalidPolicy(format!(
                    "return band for {} must sit above and be at least as wide as {}",
                    higher.profile, lower.profile
                )));
            }
        }

        Ok(())
    }

    pub fn weights_for(&self, profile: RiskProfile) -> Result<AllocationPolicy> {
        // Validation guarantees a row per profile.
        self.policies
            .iter()
            .find(|p| p.profile == profile)
            .cloned()
            .ok_or_else(|| EngineError::UnknownRiskProfile(profile.to_string()))
    }

    /// Lookup by label; unknown labels fail instead of falling back to a default.
    pub fn weights_for_label(&self, label: &str) -> Result<AllocationPolicy> {
        self.weights_for(label.parse()?)
    }
}
