use muni_budget::config::AppConfig;
use muni_budget::forecast::generate_forecast;
use muni_budget::items::fetch_valid_item_codes;
use muni_budget::municipality::{fetch_municipality_data, MunicipalityQuery};
use muni_budget::pipeline::{incexp_url_from_user_request, run_user_query};
use muni_budget::ServiceContext;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "muni-budget")]
#[command(about = "Natural-language queries and budget forecasts over Municipal Money data")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a request into an INCEXP URL without calling the API
    Url {
        /// The request in natural language
        request: String,
    },
    /// Translate a request and print the API response
    Query {
        /// The request in natural language
        request: String,
    },
    /// Fetch aggregate income/expenditure data for one municipality
    Municipality {
        /// Demarcation code, e.g. CPT
        #[arg(short, long)]
        municipality: String,

        /// Financial year end
        #[arg(short, long)]
        year: i32,

        /// Amount type code (default: AUDA)
        #[arg(long)]
        amount_type: Option<String>,

        /// Financial period (default: the year)
        #[arg(long)]
        financial_period: Option<String>,

        /// Comma-separated item codes
        #[arg(long)]
        item_codes: Option<String>,
    },
    /// List every item code in the live catalog
    Items,
    /// Forecast and allocate a budget from a JSON array of records
    Forecast {
        /// JSON file holding an array of records
        records: PathBuf,

        /// Total budget to allocate (default: FORECAST_BUDGET_TOTAL)
        #[arg(long)]
        budget_total: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    muni_budget::init_tracing();

    let args = Args::parse();
    let config = AppConfig::from_env()?;
    let ctx = ServiceContext::from_config(config);

    match args.command {
        Commands::Url { request } => {
            let url = incexp_url_from_user_request(&ctx, &request).await?;
            println!("{}", url);
        }
        Commands::Query { request } => {
            let data = run_user_query(&ctx, &request).await?;
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Commands::Municipality {
            municipality,
            year,
            amount_type,
            financial_period,
            item_codes,
        } => {
            let mut params = HashMap::new();
            params.insert("municipality".to_string(), municipality);
            params.insert("year".to_string(), year.to_string());
            let optional = [
                ("amount_type", amount_type),
                ("financial_period", financial_period),
                ("item_codes", item_codes),
            ];
            for (key, value) in optional {
                if let Some(value) = value {
                    params.insert(key.to_string(), value);
                }
            }

            let query = MunicipalityQuery::from_params(&params)?;
            let data = fetch_municipality_data(&ctx, &query).await?;
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Commands::Items => {
            let codes = fetch_valid_item_codes(&ctx).await;
            info!("{} item code(s) in catalog", codes.len());
            for code in codes {
                println!("{}", code);
            }
        }
        Commands::Forecast { records, budget_total } => {
            let raw = fs::read_to_string(&records)
                .with_context(|| format!("Failed to read {}", records.display()))?;
            let records: Vec<serde_json::Value> = serde_json::from_str(&raw)
                .context("Forecast input must be a JSON array of records")?;

            let report = generate_forecast(&ctx, &records, budget_total).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
