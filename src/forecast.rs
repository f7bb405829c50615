//! Budget forecasting and sector allocation through the generative model.
//!
//! Historical records are flattened into a `time,item_id,target` table and
//! embedded in a prompt together with the total budget and per-sector floors.
//! The model's allocation is parsed and checked against those floors; any
//! shortfall is reported alongside the allocation rather than corrected.

use crate::config::ForecastSettings;
use crate::context::ServiceContext;
use crate::error::{BudgetError, Result};
use crate::json_extract::{strip_code_fence, trim_outer_lines};
use crate::llm::GenerationConfig;
use crate::prompts::forecast_prompt;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub time: String,
    pub item_id: String,
    pub target: f64,
}

/// What could be read from one entry of the model's answer.
///
/// Entries are kept verbatim in the report; this view only feeds the floor
/// check and the allocated total.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Allocation {
    pub sector: Option<String>,
    pub forecast: Option<f64>,
    pub allocation: Option<f64>,
}

const SECTOR_KEYS: [&str; 4] = ["sector_or_item", "sector", "item_id", "item"];

impl Allocation {
    /// Numbers may arrive as JSON numbers or numeric strings; anything
    /// missing or unreadable is `None`
    pub fn from_value(entry: &Value) -> Self {
        let Some(obj) = entry.as_object() else {
            return Self::default();
        };
        Self {
            sector: SECTOR_KEYS.iter().find_map(|key| obj.get(*key).and_then(text_field)),
            forecast: obj.get("forecast").and_then(numeric_field),
            allocation: obj.get("allocation").and_then(numeric_field),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorShortfall {
    pub sector: String,
    pub minimum: f64,
    /// `None` when the model left the sector out entirely
    pub allocated: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    /// The model's entries, keys and values as returned
    pub forecast: Vec<Value>,
    pub shortfalls: Vec<FloorShortfall>,
    pub allocated_total: f64,
    pub budget_total: f64,
}

/// Reshape arbitrary records into forecast records.
///
/// `item.label` and `amount.sum` are renamed to `item_id` and `target`;
/// records without a `time` are stamped with `today`. Records lacking an item
/// or a numeric target are skipped.
pub fn normalize_records(records: &[Value], today: NaiveDate) -> Vec<ForecastRecord> {
    let today = today.format("%Y-%m-%d").to_string();

    records
        .iter()
        .filter_map(|record| {
            let obj = record.as_object()?;

            let item_id = ["item_id", "item.label"]
                .iter()
                .find_map(|key| obj.get(*key).and_then(text_field));
            let target = ["target", "amount.sum"]
                .iter()
                .find_map(|key| obj.get(*key).and_then(numeric_field));

            match (item_id, target) {
                (Some(item_id), Some(target)) => Some(ForecastRecord {
                    time: obj.get("time").and_then(text_field).unwrap_or_else(|| today.clone()),
                    item_id,
                    target,
                }),
                _ => {
                    debug!("Skipping record without item or amount: {}", record);
                    None
                }
            }
        })
        .collect()
}

fn text_field(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn numeric_field(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

/// Render records as a CSV table with a `time,item_id,target` header
pub fn records_to_table(records: &[ForecastRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(record)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| BudgetError::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| BudgetError::Csv(e.to_string()))
}

/// Parse the model's answer as a JSON array.
///
/// The response is parsed directly (after removing a surrounding code fence);
/// failing that, its first and last lines are dropped and parsing retried.
/// Entries themselves are not validated.
pub fn parse_forecast_entries(raw: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<Vec<Value>>(strip_code_fence(raw)) {
        Ok(entries) => Ok(entries),
        Err(first) => {
            debug!("Direct forecast parse failed ({}), trimming outer lines", first);
            Ok(serde_json::from_str::<Vec<Value>>(&trim_outer_lines(raw.trim()))?)
        }
    }
}

/// Sectors whose allocation is missing or below their configured floor
pub fn check_floors(allocations: &[Allocation], settings: &ForecastSettings) -> Vec<FloorShortfall> {
    settings
        .floors
        .iter()
        .filter_map(|floor| {
            let allocated = allocations
                .iter()
                .find(|a| {
                    a.sector
                        .as_deref()
                        .is_some_and(|s| s.trim().eq_ignore_ascii_case(floor.sector.trim()))
                })
                .and_then(|a| a.allocation);
            match allocated {
                Some(amount) if amount >= floor.minimum => None,
                _ => Some(FloorShortfall {
                    sector: floor.sector.clone(),
                    minimum: floor.minimum,
                    allocated,
                }),
            }
        })
        .collect()
}

/// Forecast next year's needs and allocate the budget across sectors
pub async fn generate_forecast(
    ctx: &ServiceContext,
    records: &[Value],
    budget_total: Option<f64>,
) -> Result<ForecastReport> {
    if records.is_empty() {
        return Err(BudgetError::Forecast("No data provided for forecasting".to_string()));
    }

    let normalized = normalize_records(records, chrono::Local::now().date_naive());
    if normalized.is_empty() {
        return Err(BudgetError::Forecast(
            "No usable records: each needs an item label and an amount".to_string(),
        ));
    }

    let settings = ForecastSettings {
        budget_total: budget_total.unwrap_or(ctx.config.forecast.budget_total),
        floors: ctx.config.forecast.floors.clone(),
    };

    let table = records_to_table(&normalized)?;
    let prompt = forecast_prompt(&table, settings.budget_total, &settings.floors);
    info!(
        "Requesting forecast for {} record(s), budget {}",
        normalized.len(),
        settings.budget_total
    );

    let raw = ctx.model.complete(&prompt, &GenerationConfig::forecast()).await?;
    let entries = parse_forecast_entries(&raw)?;
    let allocations: Vec<Allocation> = entries.iter().map(Allocation::from_value).collect();
    let unreadable = allocations
        .iter()
        .filter(|a| a.sector.is_none() || a.allocation.is_none())
        .count();
    if unreadable > 0 {
        warn!("{} forecast entries without a readable sector or allocation", unreadable);
    }

    let shortfalls = check_floors(&allocations, &settings);
    for shortfall in &shortfalls {
        warn!(
            "Allocation for {} is below its floor of {}",
            shortfall.sector, shortfall.minimum
        );
    }

    let allocated_total: f64 = allocations.iter().filter_map(|a| a.allocation).sum();
    Ok(ForecastReport {
        forecast: entries,
        shortfalls,
        allocated_total,
        budget_total: settings.budget_total,
    })
}
