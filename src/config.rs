//! Process configuration, read once at startup from the environment
//! (and a `.env` file when present).

use crate::error::{BudgetError, Result};
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_TREASURY_BASE: &str = "https://municipaldata.treasury.gov.za/api";
pub const DEFAULT_PAGESIZE: u32 = 20;
pub const DEFAULT_BUDGET_TOTAL: f64 = 10_000_000_000.0;
const DEFAULT_SECTOR_FLOORS: &str = "Health=2000000000,Water=1000000000,Education=1500000000";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

/// Minimum allocation a sector must receive out of the total budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorFloor {
    pub sector: String,
    pub minimum: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSettings {
    pub budget_total: f64,
    pub floors: Vec<SectorFloor>,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            budget_total: DEFAULT_BUDGET_TOTAL,
            floors: parse_sector_floors(DEFAULT_SECTOR_FLOORS)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub treasury_base_url: String,
    pub llm: LlmConfig,
    pub default_pagesize: u32,
    pub bind_addr: String,
    pub forecast: ForecastSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            treasury_base_url: DEFAULT_TREASURY_BASE.to_string(),
            llm: LlmConfig {
                api_key: None,
                model: "gpt-4o-mini".to_string(),
                base_url: "https://api.openai.com/v1".to_string(),
            },
            default_pagesize: DEFAULT_PAGESIZE,
            bind_addr: "0.0.0.0:5000".to_string(),
            forecast: ForecastSettings::default(),
        }
    }
}

impl AppConfig {
    /// Build configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = Self::default();

        let treasury_base_url = env::var("MUNI_API_BASE")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or(defaults.treasury_base_url);

        let llm = LlmConfig {
            api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            model: env::var("OPENAI_MODEL").unwrap_or(defaults.llm.model),
            base_url: env::var("OPENAI_BASE_URL").unwrap_or(defaults.llm.base_url),
        };

        let default_pagesize = match env::var("DEFAULT_PAGESIZE") {
            Ok(v) => v.trim().parse::<u32>().map_err(|e| {
                BudgetError::Config(format!("DEFAULT_PAGESIZE '{}' is not a number: {}", v, e))
            })?,
            Err(_) => defaults.default_pagesize,
        };

        let budget_total = match env::var("FORECAST_BUDGET_TOTAL") {
            Ok(v) => parse_amount(&v).ok_or_else(|| {
                BudgetError::Config(format!("FORECAST_BUDGET_TOTAL '{}' is not a number", v))
            })?,
            Err(_) => defaults.forecast.budget_total,
        };

        let floors = match env::var("SECTOR_FLOORS") {
            Ok(v) => parse_sector_floors(&v)?,
            Err(_) => defaults.forecast.floors,
        };

        Ok(Self {
            treasury_base_url,
            llm,
            default_pagesize,
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            forecast: ForecastSettings { budget_total, floors },
        })
    }
}

/// Parse `Sector=amount` pairs separated by commas
pub fn parse_sector_floors(raw: &str) -> Result<Vec<SectorFloor>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (sector, amount) = pair.split_once('=').ok_or_else(|| {
                BudgetError::Config(format!("sector floor '{}' must look like Sector=amount", pair))
            })?;
            let minimum = parse_amount(amount).ok_or_else(|| {
                BudgetError::Config(format!("sector floor amount '{}' is not a number", amount.trim()))
            })?;
            Ok(SectorFloor {
                sector: sector.trim().to_string(),
                minimum,
            })
        })
        .collect()
}

// Accepts underscores as digit separators (2_000_000_000)
fn parse_amount(raw: &str) -> Option<f64> {
    raw.trim().replace('_', "").parse::<f64>().ok()
}
