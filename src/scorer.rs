//! Per-fund quality score in the fixed range 0..=100.
//!
//! Each metric is squashed into (0, 1) with a logistic curve so the score is
//! strictly monotonic in every metric and cannot leave its range, whatever the
//! catalog contains. The components are then blended with fixed weights.

use std::str::FromStr;
use tracing::warn;

use crate::catalog::{Fund, FundMetrics};
use crate::error::{EngineError, Result};

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;

// Component weights (sum to 1)
const RETURN_WEIGHT: f64 = 0.40;
const CONSISTENCY_WEIGHT: f64 = 0.20;
const VOLATILITY_WEIGHT: f64 = 0.25;
const EXPENSE_WEIGHT: f64 = 0.15;

// Blend of return horizons; missing horizons are dropped and the rest renormalized
const HORIZON_WEIGHTS: [f64; 3] = [0.2, 0.5, 0.3]; // 1y, 3y, 5y

// Logistic centres and scales, in the metric's own unit (percent)
const RETURN_CENTER: f64 = 10.0;
const RETURN_SCALE: f64 = 6.0;
const VOLATILITY_CENTER: f64 = 12.0;
const VOLATILITY_SCALE: f64 = 6.0;
const EXPENSE_CENTER: f64 = 1.0;
const EXPENSE_SCALE: f64 = 0.5;

const NEUTRAL_CONSISTENCY: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredFund {
    pub fund: Fund,
    pub score: f64,
}

/// What to do with a fund whose metrics cannot be scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricsStrictness {
    /// Log it and leave the fund out of the candidate set
    #[default]
    Exclude,
    /// Fail the whole generation
    Abort,
}

impl FromStr for MetricsStrictness {
    type Err = EngineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exclude" => Ok(MetricsStrictness::Exclude),
            "abort" => Ok(MetricsStrictness::Abort),
            other => Err(EngineError::InvalidConfig(format!(
                "metrics strictness must be 'exclude' or 'abort', got '{}'",
                other
            ))),
        }
    }
}

fn logistic(x: f64, center: f64, scale: f64) -> f64 {
    1.0 / (1.0 + (-(x - center) / scale).exp())
}

fn invalid(fund: &Fund, reason: impl Into<String>) -> EngineError {
    EngineError::InvalidFundMetrics {
        fund: fund.name.clone(),
        reason: reason.into(),
    }
}

fn finite(fund: &Fund, field: &str, value: Option<f64>) -> Result<Option<f64>> {
    match value {
        Some(v) if !v.is_finite() => Err(invalid(fund, format!("{} is not a finite number", field))),
        other => Ok(other),
    }
}

/// Weighted blend of whichever return horizons are present.
fn blended_return(fund: &Fund, metrics: &FundMetrics) -> Result<f64> {
    let horizons = [
        finite(fund, "return_1y", metrics.return_1y)?,
        finite(fund, "return_3y", metrics.return_3y)?,
        finite(fund, "return_5y", metrics.return_5y)?,
    ];

    let (weighted, total) = horizons
        .iter()
        .zip(HORIZON_WEIGHTS)
        .filter_map(|(r, w)| r.map(|r| (r * w, w)))
        .fold((0.0, 0.0), |(acc, tw), (rw, w)| (acc + rw, tw + w));

    if total > 0.0 {
        Ok(weighted / total)
    } else {
        Err(invalid(fund, "no historical return (1y, 3y or 5y) available"))
    }
}

/// Score one fund. Fails with `InvalidFundMetrics` when a required metric is
/// missing or malformed.
pub fn score(fund: &Fund) -> Result<ScoredFund> {
    let metrics = &fund.metrics;

    let ret = blended_return(fund, metrics)?;

    let volatility = finite(fund, "volatility", metrics.volatility)?
        .ok_or_else(|| invalid(fund, "volatility is missing"))?;
    if volatility < 0.0 {
        return Err(invalid(fund, format!("volatility {} is negative", volatility)));
    }

    let expense = finite(fund, "expense_ratio", metrics.expense_ratio)?
        .ok_or_else(|| invalid(fund, "expense_ratio is missing"))?;
    if expense < 0.0 {
        return Err(invalid(fund, format!("expense_ratio {} is negative", expense)));
    }

    // Fraction of rolling periods beating the category, never a percentage
    let consistency = match finite(fund, "consistency", metrics.consistency)? {
        None => NEUTRAL_CONSISTENCY,
        Some(c) if (0.0..=1.0).contains(&c) => c,
        Some(c) => return Err(invalid(fund, format!("consistency {} is outside 0..=1", c))),
    };

    let blended = RETURN_WEIGHT * logistic(ret, RETURN_CENTER, RETURN_SCALE)
        + CONSISTENCY_WEIGHT * consistency
        + VOLATILITY_WEIGHT * (1.0 - logistic(volatility, VOLATILITY_CENTER, VOLATILITY_SCALE))
        + EXPENSE_WEIGHT * (1.0 - logistic(expense, EXPENSE_CENTER, EXPENSE_SCALE));

    Ok(ScoredFund {
        fund: fund.clone(),
        score: (blended * SCORE_MAX).clamp(SCORE_MIN, SCORE_MAX),
    })
}

/// Score a candidate set, applying `strictness` to funds that cannot be scored.
/// Input order is preserved.
pub fn score_all(funds: &[Fund], strictness: MetricsStrictness) -> Result<Vec<ScoredFund>> {
    let mut scored = Vec::with_capacity(funds.len());
    for fund in funds {
        match score(fund) {
            Ok(s) => scored.push(s),
            Err(e) => match strictness {
                MetricsStrictness::Abort => return Err(e),
                MetricsStrictness::Exclude => {
                    warn!(fund = %fund.name, error = %e, "Excluding fund with invalid metrics");
                }
            },
        }
    }
    Ok(scored)
}
