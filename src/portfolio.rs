//! Portfolio assembly: risk profile in, complete allocation out.
//!
//! [`PortfolioEngine`] looks up the policy weights, scores the candidates of every
//! weighted class, runs the allocator and attaches the expected-return band and
//! the allocation-weighted portfolio score.

use serde::Serialize;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{info, info_span};

use crate::allocation::{self, Allocation, AssetAllocation};
use crate::catalog::{AssetClass, FundSource};
use crate::error::{EngineError, Result};
use crate::investor::RiskProfile;
use crate::policy::{PolicyTable, ReturnBand};
use crate::scorer::{self, MetricsStrictness, ScoredFund, SCORE_MAX, SCORE_MIN};

/// Fund identity as the presentation layer sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundRef {
    pub category: String,
    pub fund_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundAllocation {
    pub fund: FundRef,
    pub allocation_percent: f64,
    /// Score of this fund alone; the portfolio-level score is separate.
    pub fund_score: f64,
}

impl From<Allocation> for FundAllocation {
    fn from(a: Allocation) -> Self {
        FundAllocation {
            fund: FundRef {
                category: a.fund.category(),
                fund_name: a.fund.name,
            },
            allocation_percent: a.allocation_percent,
            fund_score: a.fund_score,
        }
    }
}

/// Generation result. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub risk_profile: RiskProfile,
    pub asset_allocation: AssetAllocation,
    pub allocations: Vec<FundAllocation>,
    pub expected_returns: ReturnBand,
    pub score: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub funds_per_class: NonZeroUsize,
    pub strictness: MetricsStrictness,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            funds_per_class: NonZeroUsize::new(3).unwrap_or(NonZeroUsize::MIN),
            strictness: MetricsStrictness::default(),
        }
    }
}

/// Allocation-weighted average of fund scores, weights normalized to one.
fn aggregate_score(allocations: &[Allocation]) -> f64 {
    let total: f64 = allocations.iter().map(|a| a.allocation_percent).sum();
    if total <= 0.0 {
        return SCORE_MIN;
    }
    allocations
        .iter()
        .map(|a| a.fund_score * (a.allocation_percent / total))
        .sum::<f64>()
        .clamp(SCORE_MIN, SCORE_MAX)
}

/// Portfolio generation over a read-only catalog and policy table.
/// Holds no mutable state, so one engine can serve any number of threads.
pub struct PortfolioEngine<S> {
    catalog: Arc<S>,
    policies: &'static PolicyTable,
    settings: EngineSettings,
}

impl<S: FundSource> PortfolioEngine<S> {
    pub fn new(catalog: Arc<S>, settings: EngineSettings) -> Result<Self> {
        Ok(PortfolioEngine {
            catalog,
            policies: PolicyTable::standard()?,
            settings,
        })
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    /// Entry point for callers holding a raw label, e.g. from a request.
    pub fn generate_portfolio(&self, risk_profile: &str) -> Result<Portfolio> {
        let profile: RiskProfile = risk_profile.parse()?;
        self.generate(profile)
    }

    /// Policy → catalog → scorer → optimizer. Any failure is returned as is.
    pub fn generate(&self, profile: RiskProfile) -> Result<Portfolio> {
        let span = info_span!("generate", profile = %profile);
        let _enter = span.enter();

        let policy = self.policies.weights_for(profile)?;

        let mut candidates: BTreeMap<AssetClass, Vec<ScoredFund>> = BTreeMap::new();
        for class in AssetClass::ALL {
            if policy.weight(class) <= 0.0 {
                continue;
            }
            let funds = self.catalog.funds_by_class(class)?;
            candidates.insert(class, scorer::score_all(&funds, self.settings.strictness)?);
        }

        let outcome = allocation::allocate(&policy, &candidates, self.settings.funds_per_class)?;
        let score = aggregate_score(&outcome.allocations);

        info!(
            positions = outcome.allocations.len(),
            score,
            equity = outcome.asset_allocation.equity(),
            debt = outcome.asset_allocation.debt(),
            "Portfolio generated"
        );

        Ok(Portfolio {
            risk_profile: profile,
            asset_allocation: outcome.asset_allocation,
            allocations: outcome.allocations.into_iter().map(FundAllocation::from).collect(),
            expected_returns: policy.expected_returns,
            score,
        })
    }
}

/// Error body for the string boundary: a single message, no codes.
pub fn error_message(err: &EngineError) -> String {
    err.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Fund, FundCatalog, FundMetrics};
    use approx::assert_abs_diff_eq;

    fn fund(name: &str, class: AssetClass, ret: f64, vol: f64, er: f64) -> Fund {
        Fund {
            scheme_code: name.to_string(),
            name: name.to_string(),
            amc_name: "AMC".to_string(),
            asset_class: class,
            subtype: class.default_subtype().to_string(),
            metrics: FundMetrics {
                return_3y: Some(ret),
                volatility: Some(vol),
                expense_ratio: Some(er),
                ..Default::default()
            },
        }
    }

    fn catalog() -> FundCatalog {
        let mut funds = Vec::new();
        for class in AssetClass::ALL {
            for i in 0..4 {
                let i = i as f64;
                funds.push(fund(&format!("{} Fund {}", class.default_subtype(), i), class, 8.0 + 2.0 * i, 10.0 - i, 1.0));
            }
        }
        FundCatalog::new(funds)
    }

    fn engine(catalog: FundCatalog) -> PortfolioEngine<FundCatalog> {
        PortfolioEngine::new(Arc::new(catalog), EngineSettings::default()).unwrap()
    }

    #[test]
    fn aggregate_score_is_allocation_weighted() {
        let a = Allocation {
            fund: fund("A", AssetClass::Hybrid, 10.0, 10.0, 1.0),
            asset_class: AssetClass::Hybrid,
            allocation_percent: 75.0,
            fund_score: 80.0,
        };
        let b = Allocation {
            allocation_percent: 25.0,
            fund_score: 40.0,
            ..a.clone()
        };
        assert_abs_diff_eq!(aggregate_score(&[a, b]), 70.0, epsilon = 1e-9);
        assert_eq!(aggregate_score(&[]), SCORE_MIN);
    }

    #[test]
    fn echoes_profile_and_copies_band() {
        let engine = engine(catalog());
        let portfolio = engine.generate(RiskProfile::Balanced).unwrap();
        let band = PolicyTable::standard().unwrap().weights_for(RiskProfile::Balanced).unwrap().expected_returns;
        assert_eq!(portfolio.risk_profile, RiskProfile::Balanced);
        assert_eq!(portfolio.expected_returns, band);
        assert!((SCORE_MIN..=SCORE_MAX).contains(&portfolio.score));
    }

    #[test]
    fn string_boundary_rejects_unknown_profile() {
        let engine = engine(catalog());
        let err = engine.generate_portfolio("Yolo").unwrap_err();
        assert_eq!(err, EngineError::UnknownRiskProfile("Yolo".into()));
        assert!(error_message(&err).contains("Yolo"));
    }

    #[test]
    fn invalid_metrics_follow_strictness() {
        let mut funds: Vec<Fund> = catalog().funds().to_vec();
        funds.push(Fund {
            metrics: FundMetrics::default(),
            ..fund("Broken Hybrid", AssetClass::Hybrid, 0.0, 0.0, 0.0)
        });

        let lenient = engine(FundCatalog::new(funds.clone()));
        let portfolio = lenient.generate(RiskProfile::Balanced).unwrap();
        assert!(portfolio.allocations.iter().all(|a| a.fund.fund_name != "Broken Hybrid"));

        let strict = PortfolioEngine::new(
            Arc::new(FundCatalog::new(funds)),
            EngineSettings {
                strictness: MetricsStrictness::Abort,
                ..EngineSettings::default()
            },
        )
        .unwrap();
        assert!(matches!(
            strict.generate(RiskProfile::Balanced),
            Err(EngineError::InvalidFundMetrics { .. })
        ));
    }

    #[test]
    fn serializes_to_presentation_contract() {
        let engine = engine(catalog());
        let portfolio = engine.generate(RiskProfile::Aggressive).unwrap();
        let json = serde_json::to_value(&portfolio).unwrap();

        assert_eq!(json["riskProfile"], "Aggressive");
        for key in ["equityLargeCap", "equityMidCap", "equitySmallCap", "debtShortTerm", "debtMediumTerm", "hybrid"] {
            assert!(json["assetAllocation"][key].is_number(), "missing {}", key);
        }
        let first = &json["allocations"][0];
        assert!(first["fund"]["category"].as_str().unwrap().contains(": "));
        assert!(first["fund"]["fundName"].is_string());
        assert!(first["allocationPercent"].is_number());
        assert!(json["expectedReturns"]["min"].is_number());
        assert!(json["expectedReturns"]["max"].is_number());
        assert!(json["score"].is_number());
    }
}
