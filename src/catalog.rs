//! Fund universe snapshot and per-class lookup
//!
//! This module handles:
//! - Loading a catalog snapshot from a JSON file or an HTTP endpoint
//! - Resolving raw `category` / `subcategory` strings into an [`AssetClass`]
//! - Serving funds per asset class in a stable order

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetClass {
    EquityLargeCap,
    EquityMidCap,
    EquitySmallCap,
    DebtShortTerm,
    DebtMediumTerm,
    Hybrid,
}

impl AssetClass {
    /// Canonical class order; allocations are grouped in this order.
    pub const ALL: [AssetClass; 6] = [
        AssetClass::EquityLargeCap,
        AssetClass::EquityMidCap,
        AssetClass::EquitySmallCap,
        AssetClass::DebtShortTerm,
        AssetClass::DebtMediumTerm,
        AssetClass::Hybrid,
    ];

    pub fn group(&self) -> &'static str {
        match self {
            AssetClass::EquityLargeCap | AssetClass::EquityMidCap | AssetClass::EquitySmallCap => "Equity",
            AssetClass::DebtShortTerm | AssetClass::DebtMediumTerm => "Debt",
            AssetClass::Hybrid => "Hybrid",
        }
    }

    /// Subtype used when a catalog record does not carry its own.
    pub fn default_subtype(&self) -> &'static str {
        match self {
            AssetClass::EquityLargeCap => "Large Cap",
            AssetClass::EquityMidCap => "Mid Cap",
            AssetClass::EquitySmallCap => "Small Cap",
            AssetClass::DebtShortTerm => "Short Duration",
            AssetClass::DebtMediumTerm => "Medium Duration",
            AssetClass::Hybrid => "Balanced Hybrid",
        }
    }

    pub fn is_equity(&self) -> bool {
        self.group() == "Equity"
    }

    pub fn is_debt(&self) -> bool {
        self.group() == "Debt"
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.group(), self.default_subtype())
    }
}

/// Quality metrics as published for a fund. Every field is optional here;
/// the scorer decides which ones are required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundMetrics {
    #[serde(default, deserialize_with = "deserialize_metric")]
    pub return_1y: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_metric")]
    pub return_3y: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_metric")]
    pub return_5y: Option<f64>,
    /// Annualized standard deviation, percent
    #[serde(default, deserialize_with = "deserialize_metric")]
    pub volatility: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_metric")]
    pub expense_ratio: Option<f64>,
    /// Fraction (0..=1) of rolling periods in which the fund beat its category
    #[serde(default, deserialize_with = "deserialize_metric")]
    pub consistency: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_metric")]
    pub aum_crores: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fund {
    pub scheme_code: String,
    pub name: String,
    pub amc_name: String,
    pub asset_class: AssetClass,
    /// Subtype as published by the catalog, e.g. "Corporate Bond"
    pub subtype: String,
    pub metrics: FundMetrics,
}

impl Fund {
    /// Display category, always in the `"<Group>: <Subtype>"` form.
    pub fn category(&self) -> String {
        format!("{}: {}", self.asset_class.group(), self.subtype)
    }
}

/// Read access to a fund universe.
pub trait FundSource {
    /// All funds tagged with `class`, in stable catalog order.
    fn funds_by_class(&self, class: AssetClass) -> Result<Vec<Fund>>;
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    metadata: CatalogMetadata,
    funds: Vec<FundRecord>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogMetadata {
    #[serde(default)]
    generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FundRecord {
    #[serde(default)]
    scheme_code: String,
    fund_name: String,
    #[serde(default)]
    amc_name: String,
    category: String,
    #[serde(default)]
    subcategory: Option<String>,
    #[serde(flatten)]
    metrics: FundMetrics,
}

static NUMERIC_METRIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([-+]?[0-9][0-9,]*(?:\.[0-9]+)?)\s*%?\s*$").expect("valid metric pattern"));

// Scraped metrics arrive as numbers, strings like "12.5%" or "1,234.50", or null.
fn deserialize_metric<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    Ok(match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => NUMERIC_METRIC
            .captures(&s)
            .and_then(|cap| cap.get(1))
            .and_then(|m| m.as_str().replace(',', "").parse().ok()),
        _ => None,
    })
}

fn normalize_label(raw: &str) -> String {
    raw.trim()
        .to_ascii_lowercase()
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Map a raw category (and optional subcategory) onto an asset class.
/// Accepts either `("Equity", Some("Large Cap"))` or `("Equity: Large Cap", None)`.
/// Returns the class and the subtype to display.
pub fn resolve_category(category: &str, subcategory: Option<&str>) -> Option<(AssetClass, String)> {
    let (group, subtype) = match category.split_once(':') {
        Some((g, s)) => (g.trim(), s.trim()),
        None => (category.trim(), subcategory.unwrap_or("").trim()),
    };

    let class = match (normalize_label(group).as_str(), normalize_label(subtype).as_str()) {
        ("equity", "large cap" | "largecap") => AssetClass::EquityLargeCap,
        ("equity", "mid cap" | "midcap") => AssetClass::EquityMidCap,
        ("equity", "small cap" | "smallcap") => AssetClass::EquitySmallCap,
        (
            "debt",
            "liquid" | "overnight" | "money market" | "ultra short duration" | "low duration" | "short duration",
        ) => AssetClass::DebtShortTerm,
        (
            "debt",
            "medium duration" | "medium to long duration" | "corporate bond" | "banking and psu"
            | "banking & psu" | "dynamic bond",
        ) => AssetClass::DebtMediumTerm,
        ("hybrid", _) => AssetClass::Hybrid,
        _ => return None,
    };

    let subtype = if subtype.is_empty() {
        class.default_subtype().to_string()
    } else {
        subtype.to_string()
    };
    Some((class, subtype))
}

/// Immutable snapshot of the fund universe.
#[derive(Debug, Clone, Default)]
pub struct FundCatalog {
    pub generated_at: Option<DateTime<Utc>>,
    pub source: Option<String>,
    funds: Vec<Fund>,
}

impl FundCatalog {
    /// Build a catalog from already-resolved funds; order is normalized here.
    pub fn new(mut funds: Vec<Fund>) -> Self {
        funds.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.scheme_code.cmp(&b.scheme_code)));
        FundCatalog {
            generated_at: None,
            source: None,
            funds,
        }
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(contents)
            .map_err(|e| EngineError::CatalogUnavailable(format!("malformed catalog JSON: {}", e)))?;

        let mut funds = Vec::with_capacity(file.funds.len());
        let mut unmapped = 0;
        for record in file.funds {
            match resolve_category(&record.category, record.subcategory.as_deref()) {
                Some((asset_class, subtype)) => funds.push(Fund {
                    scheme_code: record.scheme_code,
                    name: record.fund_name,
                    amc_name: record.amc_name,
                    asset_class,
                    subtype,
                    metrics: record.metrics,
                }),
                None => {
                    unmapped += 1;
                    debug!(
                        fund = %record.fund_name,
                        category = %record.category,
                        subcategory = ?record.subcategory,
                        "Fund category maps to no asset class, leaving it out"
                    );
                }
            }
        }

        let mut catalog = FundCatalog::new(funds);
        catalog.generated_at = file.metadata.generated_at;
        catalog.source = file.metadata.source;

        info!(
            funds = catalog.funds.len(),
            unmapped,
            generated_at = ?catalog.generated_at,
            "Loaded fund catalog"
        );
        Ok(catalog)
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            EngineError::CatalogUnavailable(format!("failed to read catalog file '{}': {}", path, e))
        })?;
        Self::from_json_str(&contents)
    }

    /// Fetch a catalog snapshot over HTTP. A non-success status is a failure,
    /// never an empty catalog.
    pub async fn fetch(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::CatalogUnavailable(format!("failed to build HTTP client: {}", e)))?;

        let resp = client
            .get(url)
            .send()
            .await
            .map_err(|e| EngineError::CatalogUnavailable(format!("request to '{}' failed: {}", url, e)))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| EngineError::CatalogUnavailable(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            warn!(%status, url, "Catalog endpoint returned an error status");
            return Err(EngineError::CatalogUnavailable(format!(
                "catalog endpoint returned [CODE: {}]: {}",
                status, text
            )));
        }

        Self::from_json_str(&text)
    }

    pub fn len(&self) -> usize {
        self.funds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funds.is_empty()
    }

    pub fn funds(&self) -> &[Fund] {
        &self.funds
    }
}

impl FundSource for FundCatalog {
    fn funds_by_class(&self, class: AssetClass) -> Result<Vec<Fund>> {
        Ok(self
            .funds
            .iter()
            .filter(|f| f.asset_class == class)
            .cloned()
            .collect())
    }
}
