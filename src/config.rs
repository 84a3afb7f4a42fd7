use dotenvy::dotenv;
use std::env;
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::error::{EngineError, Result};
use crate::portfolio::EngineSettings;
use crate::scorer::MetricsStrictness;

const DEFAULT_CATALOG_PATH: &str = "data/funds_catalog.json";
const DEFAULT_FUNDS_PER_CLASS: usize = 3;
const DEFAULT_CATALOG_TIMEOUT_SECS: u64 = 10;

/// Where the catalog snapshot is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogLocation {
    File(String),
    Url(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub catalog: CatalogLocation,
    pub catalog_timeout: Duration,
    pub engine: EngineSettings,
}

impl Config {
    /// Load from the process environment, after reading `.env` if present.
    pub fn load() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // A URL wins over a path when both are set
        let catalog = match lookup("CATALOG_URL").filter(|v| !v.trim().is_empty()) {
            Some(url) => CatalogLocation::Url(url),
            None => CatalogLocation::File(
                lookup("CATALOG_PATH").unwrap_or_else(|| DEFAULT_CATALOG_PATH.to_string()),
            ),
        };

        let funds_per_class = match lookup("FUNDS_PER_CLASS") {
            Some(raw) => raw
                .trim()
                .parse::<NonZeroUsize>()
                .map_err(|_| EngineError::InvalidConfig(format!("FUNDS_PER_CLASS must be a positive integer, got '{}'", raw)))?,
            None => NonZeroUsize::new(DEFAULT_FUNDS_PER_CLASS).unwrap_or(NonZeroUsize::MIN),
        };

        let strictness = match lookup("METRICS_STRICTNESS") {
            Some(raw) => raw.parse::<MetricsStrictness>()?,
            None => MetricsStrictness::default(),
        };

        let timeout_secs = match lookup("CATALOG_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| EngineError::InvalidConfig(format!("CATALOG_TIMEOUT_SECS must be a positive integer, got '{}'", raw)))?,
            None => DEFAULT_CATALOG_TIMEOUT_SECS,
        };

        Ok(Config {
            catalog,
            catalog_timeout: Duration::from_secs(timeout_secs),
            engine: EngineSettings {
                funds_per_class,
                strictness,
            },
        })
    }
}
