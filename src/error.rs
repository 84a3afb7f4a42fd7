use thiserror::Error;

use crate::catalog::AssetClass;

/// Every failure the engine can surface. Messages are what the caller renders.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Unknown risk profile '{0}' (expected one of: Conservative, Moderately Conservative, Balanced, Moderately Aggressive, Aggressive)")]
    UnknownRiskProfile(String),

    #[error("Fund catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Invalid metrics for fund '{fund}': {reason}")]
    InvalidFundMetrics { fund: String, reason: String },

    #[error("No funds available for asset class {0} which has a positive target weight")]
    InsufficientFundsForClass(AssetClass),

    #[error("Fund '{fund}' is tagged {actual} but was offered for the {expected} slot")]
    MisclassifiedFund {
        fund: String,
        expected: AssetClass,
        actual: AssetClass,
    },

    #[error("Invalid allocation policy: {0}")]
    InvalidPolicy(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// Only infrastructure failures are worth retrying; everything else needs
    /// different input or a different catalog.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::CatalogUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
