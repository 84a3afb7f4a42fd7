//! Risk-profile driven mutual fund portfolio construction.
//!
//! A [`PortfolioEngine`] turns a risk profile label into a target asset-class
//! mix, picks and scores funds per class from a read-only [`FundCatalog`], and
//! returns a [`Portfolio`] whose allocations always add up to 100%.

pub mod allocation;
pub mod catalog;
pub mod config;
pub mod error;
pub mod investor;
pub mod logging;
pub mod policy;
pub mod portfolio;
pub mod scorer;

pub use catalog::{AssetClass, Fund, FundCatalog, FundMetrics, FundSource};
pub use error::{EngineError, Result};
pub use investor::RiskProfile;
pub use portfolio::{EngineSettings, Portfolio, PortfolioEngine};
