use eyre::{eyre, Result};
use serde_json::json;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use fund_portfolio::config::{CatalogLocation, Config};
use fund_portfolio::logging::init_logging;
use fund_portfolio::portfolio::error_message;
use fund_portfolio::{FundCatalog, Portfolio, PortfolioEngine};

const USAGE: &str = "usage: fund_portfolio <risk-profile>\n  risk-profile: Conservative | \"Moderately Conservative\" | Balanced | \"Moderately Aggressive\" | Aggressive";

async fn load_catalog(config: &Config) -> fund_portfolio::Result<FundCatalog> {
    match &config.catalog {
        CatalogLocation::File(path) => {
            info!(path = %path, "Reading fund catalog from file");
            FundCatalog::load_from_file(path)
        }
        CatalogLocation::Url(url) => {
            info!(url = %url, "Fetching fund catalog");
            FundCatalog::fetch(url, config.catalog_timeout).await
        }
    }
}

async fn generate(config: Config, risk_profile: &str) -> fund_portfolio::Result<Portfolio> {
    // Catalog is read once; the engine only ever sees this snapshot.
    let catalog = load_catalog(&config).await?;
    let engine = PortfolioEngine::new(Arc::new(catalog), config.engine)?;
    engine.generate_portfolio(risk_profile)
}

// Engine and config failures become the JSON error body; only output failures use eyre.
async fn run(risk_profile: &str) -> Result<bool> {
    let outcome = match Config::load() {
        Ok(config) => generate(config, risk_profile).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(portfolio) => {
            println!("{}", serde_json::to_string_pretty(&portfolio)?);
            Ok(true)
        }
        Err(e) => {
            error!(error = %e, retryable = e.is_retryable(), "Portfolio generation failed");
            println!("{}", serde_json::to_string_pretty(&json!({ "error": error_message(&e) }))?);
            Ok(false)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_logging() {
        eprintln!("Error - could not set up logging: {}", e);
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.as_slice() {
        [] => Err(eyre!("missing risk profile\n{}", USAGE)),
        // Allow the two-word labels to be passed unquoted
        words => run(&words.join(" ")).await,
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::from(2)
        }
    }
}
