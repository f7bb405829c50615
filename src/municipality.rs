//! Direct municipality lookups against the aggregate endpoint, bypassing the
//! natural-language pipeline.

use crate::context::ServiceContext;
use crate::error::{BudgetError, Result};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::info;
use url::Url;

pub const DEFAULT_AMOUNT_TYPE: &str = "AUDA";
pub const AGGREGATE_PAGESIZE: u32 = 10000;
const MUNICIPALITY_DRILLDOWN: &str = "demarcation.code|demarcation.label|item.code|item.label|function.code|function.label|item.return_form_structure";

const MUNICIPALITIES: &[(&str, &str)] = &[
    ("CPT", "City of Cape Town"),
    ("JHB", "City of Johannesburg"),
    ("TSH", "City of Tshwane"),
    ("BUF", "Buffalo City"),
    ("EKU", "Ekurhuleni"),
    ("ETH", "eThekwini"),
];

const AMOUNT_TYPES: &[(&str, &str)] = &[
    ("AUDA", "Audited Actual"),
    ("ACT", "Actual"),
    ("ORGB", "Original Budget"),
    ("ADJB", "Adjusted Budget"),
];

fn to_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(code, name)| (code.to_string(), name.to_string()))
        .collect()
}

/// Immutable lookup tables shared by every request
#[derive(Debug, Clone)]
pub struct ReferenceTables {
    pub municipalities: BTreeMap<String, String>,
    pub amount_types: BTreeMap<String, String>,
}

impl Default for ReferenceTables {
    fn default() -> Self {
        Self {
            municipalities: to_map(MUNICIPALITIES),
            amount_types: to_map(AMOUNT_TYPES),
        }
    }
}

impl ReferenceTables {
    /// Display name for a demarcation code, or the code itself when unknown
    pub fn municipality_name<'a>(&'a self, code: &'a str) -> &'a str {
        self.municipalities.get(code).map(String::as_str).unwrap_or(code)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MunicipalityQuery {
    pub municipality: String,
    pub year: i32,
    pub amount_type: String,
    pub financial_period: String,
    pub item_codes: Vec<String>,
}

impl MunicipalityQuery {
    /// Read the query from request parameters
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let municipality = get("municipality")
            .ok_or_else(|| BudgetError::Input("municipality missing".to_string()))?
            .to_string();
        let raw_year = get("year").ok_or_else(|| BudgetError::Input("year missing".to_string()))?;
        let year = raw_year
            .parse::<i32>()
            .map_err(|_| BudgetError::Input(format!("year '{}' is not a number", raw_year)))?;

        let amount_type = get("amount_type").unwrap_or(DEFAULT_AMOUNT_TYPE).to_string();
        let financial_period = get("financial_period")
            .map(str::to_string)
            .unwrap_or_else(|| year.to_string());

        let item_codes = get("item_codes")
            .map(|raw| {
                raw.split(',')
                    .map(|code| code.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
                    .filter(|code| !code.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            municipality,
            year,
            amount_type,
            financial_period,
            item_codes,
        })
    }

    pub fn cut_param(&self) -> String {
        let mut cuts = vec![
            format!("financial_year_end.year:{}", self.year),
            format!("amount_type.code:{}", self.amount_type),
            format!("financial_period.period:{}", self.financial_period),
            format!("demarcation.code:\"{}\"", self.municipality),
        ];
        if !self.item_codes.is_empty() {
            let codes: Vec<String> = self.item_codes.iter().map(|c| format!("\"{}\"", c)).collect();
            cuts.push(format!("item.code:{}", codes.join(";")));
        }
        cuts.join("|")
    }

    /// Aggregate URL with percent-encoded parameters
    pub fn to_url(&self, base: &str) -> Result<Url> {
        let endpoint = format!("{}/cubes/incexp/aggregate", base.trim_end_matches('/'));
        let mut url = Url::parse(&endpoint)
            .map_err(|e| BudgetError::InvalidUrl(format!("Bad treasury base URL '{}': {}", base, e)))?;
        url.query_pairs_mut()
            .append_pair("drilldown", MUNICIPALITY_DRILLDOWN)
            .append_pair("cut", &self.cut_param())
            .append_pair("aggregates", "amount.sum")
            .append_pair("pagesize", &AGGREGATE_PAGESIZE.to_string());
        Ok(url)
    }
}

/// Fetch, label and sort aggregate cells for one municipality
pub async fn fetch_municipality_data(ctx: &ServiceContext, query: &MunicipalityQuery) -> Result<Value> {
    let url = query.to_url(ctx.base_url())?;
    info!("Fetching {} data for {}", query.amount_type, query.municipality);

    let mut data = ctx.cube.get_json(url.as_str()).await?;
    annotate_cells(&mut data, ctx.tables.municipality_name(&query.municipality));
    Ok(data)
}

/// Add display fields to every cell and order by `amount.sum`, largest first
pub fn annotate_cells(data: &mut Value, municipality_name: &str) {
    let Some(cells) = data.get_mut("cells").and_then(Value::as_array_mut) else {
        return;
    };

    for cell in cells.iter_mut() {
        let Some(obj) = cell.as_object_mut() else {
            continue;
        };
        obj.insert("municipality_name".to_string(), Value::from(municipality_name));
        if let Some(amount) = obj.get("amount.sum").and_then(Value::as_f64) {
            if amount != 0.0 {
                obj.insert("amount_formatted".to_string(), Value::from(format_rand(amount)));
            }
        }
    }

    cells.sort_by(|a, b| {
        cell_amount(b)
            .partial_cmp(&cell_amount(a))
            .unwrap_or(Ordering::Equal)
    });
}

fn cell_amount(cell: &Value) -> f64 {
    cell.get("amount.sum").and_then(Value::as_f64).unwrap_or(0.0)
}

/// `R 1,234,567.89`
pub fn format_rand(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("R {}{}.{}", sign, grouped, cents)
}
