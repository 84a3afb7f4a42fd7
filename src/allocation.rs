//! Turns policy weights and scored candidates into concrete fund allocations.
//!
//! Percentages are computed in integer tenths of a percent so class totals are
//! exact after rounding and never drift across classes.

use serde::Serialize;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use tracing::debug;

use crate::catalog::{AssetClass, Fund};
use crate::error::{EngineError, Result};
use crate::policy::AllocationPolicy;
use crate::scorer::ScoredFund;

/// Allocation granularity: one decimal place of a percent.
const UNITS_PER_PERCENT: f64 = 10.0;

/// Share added to every selected fund, as a multiple of the mean relative
/// score, so the lowest-scored pick never ends up with nothing.
const FLOOR_RATIO: f64 = 1.0;

/// Percent of the whole portfolio per asset class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAllocation {
    pub equity_large_cap: f64,
    pub equity_mid_cap: f64,
    pub equity_small_cap: f64,
    pub debt_short_term: f64,
    pub debt_medium_term: f64,
    pub hybrid: f64,
}

impl AssetAllocation {
    pub fn get(&self, class: AssetClass) -> f64 {
        match class {
            AssetClass::EquityLargeCap => self.equity_large_cap,
            AssetClass::EquityMidCap => self.equity_mid_cap,
            AssetClass::EquitySmallCap => self.equity_small_cap,
            AssetClass::DebtShortTerm => self.debt_short_term,
            AssetClass::DebtMediumTerm => self.debt_medium_term,
            AssetClass::Hybrid => self.hybrid,
        }
    }

    fn set(&mut self, class: AssetClass, percent: f64) {
        let slot = match class {
            AssetClass::EquityLargeCap => &mut self.equity_large_cap,
            AssetClass::EquityMidCap => &mut self.equity_mid_cap,
            AssetClass::EquitySmallCap => &mut self.equity_small_cap,
            AssetClass::DebtShortTerm => &mut self.debt_short_term,
            AssetClass::DebtMediumTerm => &mut self.debt_medium_term,
            AssetClass::Hybrid => &mut self.hybrid,
        };
        *slot = percent;
    }

    pub fn total(&self) -> f64 {
        AssetClass::ALL.iter().map(|c| self.get(*c)).sum()
    }

    pub fn equity(&self) -> f64 {
        AssetClass::ALL.iter().filter(|c| c.is_equity()).map(|c| self.get(*c)).sum()
    }

    pub fn debt(&self) -> f64 {
        AssetClass::ALL.iter().filter(|c| c.is_debt()).map(|c| self.get(*c)).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub fund: Fund,
    pub asset_class: AssetClass,
    pub allocation_percent: f64,
    pub fund_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllocationOutcome {
    pub asset_allocation: AssetAllocation,
    /// Grouped by class in `AssetClass::ALL` order, then by descending score.
    pub allocations: Vec<Allocation>,
}

/// Rank descending by score. The sort is stable, so ties keep catalog order.
fn rank(candidates: &[ScoredFund]) -> Vec<&ScoredFund> {
    let mut ranked: Vec<&ScoredFund> = candidates.iter().collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

/// Relative score plus a floor, so ties and the bottom pick still get a share.
fn distribution_weights(selected: &[&ScoredFund]) -> Vec<f64> {
    let min = selected.iter().map(|s| s.score).fold(f64::INFINITY, f64::min);
    let relative: Vec<f64> = selected.iter().map(|s| s.score - min).collect();
    let mean = relative.iter().sum::<f64>() / relative.len() as f64;
    let floor = if mean > f64::EPSILON { FLOOR_RATIO * mean } else { 1.0 };
    relative.iter().map(|r| r + floor).collect()
}

/// Split `total` units proportionally to `weights`, each share at least one
/// unit, with the rounding residual absorbed by the largest share.
fn split_units(total: i64, weights: &[f64]) -> Vec<i64> {
    let weight_sum: f64 = weights.iter().sum();
    let mut units: Vec<i64> = weights
        .iter()
        .map(|w| ((total as f64) * w / weight_sum).round().max(1.0) as i64)
        .collect();

    let largest = |units: &[i64]| {
        units
            .iter()
            .enumerate()
            .fold(0, |best, (i, u)| if *u > units[best] { i } else { best })
    };

    let mut residual = total - units.iter().sum::<i64>();
    if residual > 0 {
        let i = largest(&units);
        units[i] += residual;
    }
    // Over-allocation: take single units from the current largest share.
    while residual < 0 {
        let i = largest(&units);
        if units[i] <= 1 {
            break;
        }
        units[i] -= 1;
        residual += 1;
    }
    units
}

/// Build the asset-class breakdown and per-fund allocations for `policy`.
///
/// `candidates` maps each class to its scored funds in catalog order. A class
/// with a positive target and no candidates is an error; weight is never moved
/// to another class here.
pub fn allocate(
    policy: &AllocationPolicy,
    candidates: &BTreeMap<AssetClass, Vec<ScoredFund>>,
    funds_per_class: NonZeroUsize,
) -> Result<AllocationOutcome> {
    let mut asset_allocation = AssetAllocation::default();
    let mut allocations = Vec::new();

    for class in AssetClass::ALL {
        let class_units = (policy.weight(class) * 100.0 * UNITS_PER_PERCENT).round() as i64;
        if class_units <= 0 {
            continue;
        }

        let available = candidates.get(&class).map(Vec::as_slice).unwrap_or(&[]);
        if available.is_empty() {
            return Err(EngineError::InsufficientFundsForClass(class));
        }
        if let Some(stray) = available.iter().find(|s| s.fund.asset_class != class) {
            return Err(EngineError::MisclassifiedFund {
                fund: stray.fund.name.clone(),
                expected: class,
                actual: stray.fund.asset_class,
            });
        }

        // Never pick more funds than there are units to hand out.
        let take = funds_per_class.get().min(available.len()).min(class_units as usize);
        let ranked = rank(available);
        let selected = &ranked[..take];

        let units = split_units(class_units, &distribution_weights(selected));

        debug!(
            %class,
            class_percent = class_units as f64 / UNITS_PER_PERCENT,
            available = available.len(),
            selected = take,
            "Allocated asset class"
        );

        asset_allocation.set(class, class_units as f64 / UNITS_PER_PERCENT);
        allocations.extend(selected.iter().zip(units).map(|(s, u)| Allocation {
            fund: s.fund.clone(),
            asset_class: class,
            allocation_percent: u as f64 / UNITS_PER_PERCENT,
            fund_score: s.score,
        }));
    }

    Ok(AllocationOutcome {
        asset_allocation,
        allocations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FundMetrics;
    use crate::investor::RiskProfile;
    use crate::policy::PolicyTable;
    use approx::assert_abs_diff_eq;

    fn scored(name: &str, class: AssetClass, score: f64) -> ScoredFund {
        ScoredFund {
            fund: Fund {
                scheme_code: name.to_string(),
                name: name.to_string(),
                amc_name: String::new(),
                asset_class: class,
                subtype: class.default_subtype().to_string(),
                metrics: FundMetrics::default(),
            },
            score,
        }
    }

    fn full_universe(per_class: usize) -> BTreeMap<AssetClass, Vec<ScoredFund>> {
        AssetClass::ALL
            .iter()
            .map(|&class| {
                let funds = (0..per_class)
                    .map(|i| scored(&format!("{:?} {}", class, i), class, 40.0 + 7.0 * i as f64))
                    .collect();
                (class, funds)
            })
            .collect()
    }

    fn n(v: usize) -> NonZeroUsize {
        NonZeroUsize::new(v).unwrap()
    }

    fn class_sum(outcome: &AllocationOutcome, class: AssetClass) -> f64 {
        outcome
            .allocations
            .iter()
            .filter(|a| a.asset_class == class)
            .map(|a| a.allocation_percent)
            .sum()
    }

    #[test]
    fn allocations_sum_to_one_hundred_for_every_profile() {
        let table = PolicyTable::standard().unwrap();
        let universe = full_universe(4);
        for profile in RiskProfile::ALL {
            let policy = table.weights_for(profile).unwrap();
            for per_class in 1..=6 {
                let outcome = allocate(&policy, &universe, n(per_class)).unwrap();
                let total: f64 = outcome.allocations.iter().map(|a| a.allocation_percent).sum();
                assert_abs_diff_eq!(total, 100.0, epsilon = 0.1);
                assert_abs_diff_eq!(outcome.asset_allocation.total(), 100.0, epsilon = 0.1);
                for class in AssetClass::ALL {
                    assert_abs_diff_eq!(
                        class_sum(&outcome, class),
                        outcome.asset_allocation.get(class),
                        epsilon = 1e-9
                    );
                }
                for a in &outcome.allocations {
                    assert_eq!(a.fund.asset_class, a.asset_class);
                    assert!(a.allocation_percent > 0.0);
                }
            }
        }
    }

    #[test]
    fn selects_top_scored_funds_in_descending_order() {
        let policy = PolicyTable::standard().unwrap().weights_for(RiskProfile::Balanced).unwrap();
        let outcome = allocate(&policy, &full_universe(5), n(3)).unwrap();
        let large: Vec<&Allocation> = outcome
            .allocations
            .iter()
            .filter(|a| a.asset_class == AssetClass::EquityLargeCap)
            .collect();
        let names: Vec<&str> = large.iter().map(|a| a.fund.name.as_str()).collect();
        assert_eq!(names, vec!["EquityLargeCap 4", "EquityLargeCap 3", "EquityLargeCap 2"]);
        assert!(large[0].allocation_percent > large[2].allocation_percent);
    }

    #[test]
    fn allocations_are_grouped_in_class_order() {
        let policy = PolicyTable::standard().unwrap().weights_for(RiskProfile::Balanced).unwrap();
        let outcome = allocate(&policy, &full_universe(3), n(2)).unwrap();
        let classes: Vec<AssetClass> = outcome.allocations.iter().map(|a| a.asset_class).collect();
        let mut sorted = classes.clone();
        sorted.sort();
        assert_eq!(classes, sorted);
    }

    #[test]
    fn ties_keep_catalog_order_and_split_evenly() {
        let policy = PolicyTable::standard().unwrap().weights_for(RiskProfile::Balanced).unwrap();
        let mut universe = full_universe(1);
        universe.insert(
            AssetClass::EquityLargeCap,
            vec![
                scored("B Fund", AssetClass::EquityLargeCap, 55.0),
                scored("A Fund", AssetClass::EquityLargeCap, 55.0),
                scored("C Fund", AssetClass::EquityLargeCap, 55.0),
            ],
        );
        let outcome = allocate(&policy, &universe, n(2)).unwrap();
        let large: Vec<&Allocation> = outcome
            .allocations
            .iter()
            .filter(|a| a.asset_class == AssetClass::EquityLargeCap)
            .collect();
        assert_eq!(large[0].fund.name, "B Fund");
        assert_eq!(large[1].fund.name, "A Fund");
        assert_abs_diff_eq!(large[0].allocation_percent, 15.0, epsilon = 1e-9);
        assert_abs_diff_eq!(large[1].allocation_percent, 15.0, epsilon = 1e-9);
    }

    #[test]
    fn lowest_scored_pick_still_gets_a_floor_share() {
        let policy = PolicyTable::standard().unwrap().weights_for(RiskProfile::Balanced).unwrap();
        let mut universe = full_universe(1);
        universe.insert(
            AssetClass::EquityLargeCap,
            vec![
                scored("Strong", AssetClass::EquityLargeCap, 80.0),
                scored("Weak", AssetClass::EquityLargeCap, 20.0),
            ],
        );
        let outcome = allocate(&policy, &universe, n(2)).unwrap();
        let weak = outcome.allocations.iter().find(|a| a.fund.name == "Weak").unwrap();
        let strong = outcome.allocations.iter().find(|a| a.fund.name == "Strong").unwrap();
        // relative scores 60 and 0, floor = mean = 30 → weights 90 : 30
        assert_abs_diff_eq!(strong.allocation_percent, 22.5, epsilon = 1e-9);
        assert_abs_diff_eq!(weak.allocation_percent, 7.5, epsilon = 1e-9);
    }

    #[test]
    fn rounding_residual_lands_on_largest_share() {
        let units = split_units(100, &[1.0, 1.0, 1.0]);
        assert_eq!(units.iter().sum::<i64>(), 100);
        assert_eq!(units, vec![34, 33, 33]);

        // Minimum of one unit each forces an over-allocation that must be taken back
        let units = split_units(5, &[10.0, 1.0, 1.0, 1.0, 1.0]);
        assert_eq!(units.iter().sum::<i64>(), 5);
        assert!(units.iter().all(|u| *u >= 1));
    }

    #[test]
    fn more_requested_than_available_uses_all() {
        let policy = PolicyTable::standard().unwrap().weights_for(RiskProfile::Aggressive).unwrap();
        let outcome = allocate(&policy, &full_universe(2), n(10)).unwrap();
        for class in AssetClass::ALL {
            let count = outcome.allocations.iter().filter(|a| a.asset_class == class).count();
            assert_eq!(count, 2);
        }
    }

    #[test]
    fn empty_class_with_positive_weight_fails() {
        let policy = PolicyTable::standard().unwrap().weights_for(RiskProfile::Aggressive).unwrap();
        let mut universe = full_universe(3);
        universe.insert(AssetClass::EquitySmallCap, Vec::new());
        assert_eq!(
            allocate(&policy, &universe, n(3)),
            Err(EngineError::InsufficientFundsForClass(AssetClass::EquitySmallCap))
        );

        universe.remove(&AssetClass::EquitySmallCap);
        assert_eq!(
            allocate(&policy, &universe, n(3)),
            Err(EngineError::InsufficientFundsForClass(AssetClass::EquitySmallCap))
        );
    }

    #[test]
    fn zero_weight_class_needs_no_funds() {
        // Conservative holds no small cap
        let policy = PolicyTable::standard().unwrap().weights_for(RiskProfile::Conservative).unwrap();
        let mut universe = full_universe(3);
        universe.remove(&AssetClass::EquitySmallCap);
        let outcome = allocate(&policy, &universe, n(3)).unwrap();
        assert_eq!(outcome.asset_allocation.equity_small_cap, 0.0);
        assert!(outcome.allocations.iter().all(|a| a.asset_class != AssetClass::EquitySmallCap));
    }

    #[test]
    fn misclassified_candidate_is_rejected() {
        let policy = PolicyTable::standard().unwrap().weights_for(RiskProfile::Balanced).unwrap();
        let mut universe = full_universe(2);
        universe
            .get_mut(&AssetClass::Hybrid)
            .unwrap()
            .push(scored("Sneaky Debt", AssetClass::DebtShortTerm, 99.0));
        assert!(matches!(
            allocate(&policy, &universe, n(2)),
            Err(EngineError::MisclassifiedFund { .. })
        ));
    }
}
