//! Structured query plan produced by the model, validated at the parse boundary.

use crate::error::Result;
use crate::json_extract::extract_first_json_object;
use crate::llm::{GenerationConfig, TextModel};
use crate::prompts::intent_prompt;
use crate::text::normalize_text;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    #[default]
    Facts,
    Aggregate,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Facts => "facts",
            Endpoint::Aggregate => "aggregate",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "facts" => Some(Endpoint::Facts),
            "aggregate" => Some(Endpoint::Aggregate),
            _ => None,
        }
    }
}

/// Cube dimensions a cut may filter on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    DemarcationCode,
    FinancialYearEnd,
    FinancialPeriod,
    ItemCode,
    AmountTypeCode,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::DemarcationCode,
        Dimension::FinancialYearEnd,
        Dimension::FinancialPeriod,
        Dimension::ItemCode,
        Dimension::AmountTypeCode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::DemarcationCode => "demarcation.code",
            Dimension::FinancialYearEnd => "financial_year_end.year",
            Dimension::FinancialPeriod => "financial_period.period",
            Dimension::ItemCode => "item.code",
            Dimension::AmountTypeCode => "amount_type.code",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|d| d.as_str() == raw)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cut {
    pub dimension: Dimension,
    pub values: Vec<String>,
}

impl Cut {
    pub fn new<I, S>(dimension: Dimension, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dimension,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub endpoint: Endpoint,
    pub cuts: Vec<Cut>,
    pub drilldown: Vec<String>,
    pub aggregates: Vec<String>,
    pub order: Option<String>,
    pub pagesize: u32,
}

const ALLOWED_KEYS: [&str; 6] = ["endpoint", "cuts", "drilldown", "aggregates", "order", "pagesize"];

impl Intent {
    pub fn new(pagesize: u32) -> Self {
        Self {
            endpoint: Endpoint::default(),
            cuts: Vec::new(),
            drilldown: Vec::new(),
            aggregates: Vec::new(),
            order: None,
            pagesize,
        }
    }

    /// Build an intent from the model's JSON object.
    ///
    /// Returns `None` when the value is not an object or carries none of the
    /// allowed keys. Unknown keys and unrecognised cut dimensions are dropped.
    pub fn from_value(value: &Value, default_pagesize: u32) -> Option<Self> {
        let obj = value.as_object()?;

        let ignored: Vec<&String> = obj.keys().filter(|k| !ALLOWED_KEYS.contains(&k.as_str())).collect();
        if !ignored.is_empty() {
            debug!("Ignoring unexpected intent keys: {:?}", ignored);
        }
        if !obj.keys().any(|k| ALLOWED_KEYS.contains(&k.as_str())) {
            return None;
        }

        let mut intent = Intent::new(default_pagesize);

        if let Some(endpoint) = obj.get("endpoint").and_then(Value::as_str) {
            match Endpoint::parse(endpoint) {
                Some(e) => intent.endpoint = e,
                None => warn!("Unknown endpoint '{}', using facts", endpoint),
            }
        }

        if let Some(cuts) = obj.get("cuts").and_then(Value::as_array) {
            for entry in cuts {
                if let Some(cut) = parse_cut(entry) {
                    intent.push_cut(cut);
                }
            }
        }

        match obj.get("drilldown") {
            Some(Value::Array(items)) => {
                intent.drilldown = items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            Some(Value::Null) | None => {}
            Some(other) => warn!("drilldown must be an array, ignoring {}", other),
        }

        match obj.get("aggregates") {
            Some(Value::Array(items)) => {
                intent.aggregates = items.iter().filter_map(Value::as_str).map(str::to_string).collect();
            }
            Some(Value::String(single)) if !single.is_empty() => {
                intent.aggregates = vec![single.clone()];
            }
            _ => {}
        }

        intent.order = obj
            .get("order")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        match obj.get("pagesize") {
            Some(Value::Number(n)) => {
                if let Some(size) = n.as_u64().and_then(|n| u32::try_from(n).ok()) {
                    intent.pagesize = size;
                }
            }
            Some(Value::String(s)) => {
                if let Ok(size) = s.trim().parse::<u32>() {
                    intent.pagesize = size;
                }
            }
            _ => {}
        }

        Some(intent)
    }

    pub fn cut(&self, dimension: Dimension) -> Option<&Cut> {
        self.cuts.iter().find(|c| c.dimension == dimension)
    }

    /// Add a cut, merging its values into an existing cut on the same dimension
    pub fn push_cut(&mut self, cut: Cut) {
        match self.cuts.iter_mut().find(|c| c.dimension == cut.dimension) {
            Some(existing) => existing.values.extend(cut.values),
            None => self.cuts.push(cut),
        }
    }

    /// Replace whatever cut exists for `dimension` with exactly `values`
    pub fn set_cut(&mut self, dimension: Dimension, values: Vec<String>) {
        self.remove_cut(dimension);
        self.cuts.push(Cut { dimension, values });
    }

    pub fn remove_cut(&mut self, dimension: Dimension) {
        self.cuts.retain(|c| c.dimension != dimension);
    }
}

fn parse_cut(entry: &Value) -> Option<Cut> {
    let Some(raw_dimension) = entry.get("dimension").and_then(Value::as_str) else {
        warn!("Dropping cut without a dimension: {}", entry);
        return None;
    };
    let Some(dimension) = Dimension::parse(raw_dimension) else {
        warn!("Dropping cut on unrecognised dimension '{}'", raw_dimension);
        return None;
    };

    let values = match entry.get("value") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(scalar_to_string).collect(),
        // "2019;2023" or "CPT,JHB" carry several values in one string
        Some(Value::String(s)) if s.contains(';') || s.contains(',') => s
            .split(|c| c == ';' || c == ',')
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect(),
        Some(other) => scalar_to_string(other).into_iter().collect(),
    };

    if values.is_empty() {
        warn!("Dropping {} cut with no usable value", dimension);
        return None;
    }
    Some(Cut { dimension, values })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(
            n.as_i64()
                .map(|i| i.to_string())
                .unwrap_or_else(|| n.to_string()),
        ),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Ask the model for a query plan describing `user_text`.
///
/// `Ok(None)` means the model answered but no usable intent could be read
/// from it; `Err` is reserved for failing to reach the model at all.
pub async fn ask_model_for_intent(
    model: &dyn TextModel,
    user_text: &str,
    default_pagesize: u32,
) -> Result<Option<Intent>> {
    let prompt = intent_prompt(user_text);
    let raw = model.complete(&prompt, &GenerationConfig::precise()).await?;
    let raw = normalize_text(&raw);

    let Some(json_text) = extract_first_json_object(&raw) else {
        warn!("No JSON object in model response");
        return Ok(None);
    };

    let value: Value = match serde_json::from_str(json_text) {
        Ok(v) => v,
        Err(e) => {
            warn!("Model intent is not valid JSON: {}", e);
            return Ok(None);
        }
    };

    let intent = Intent::from_value(&value, default_pagesize);
    if let Some(ref intent) = intent {
        info!(
            "Intent parsed: endpoint={}, {} cut(s), drilldown={:?}",
            intent.endpoint.as_str(),
            intent.cuts.len(),
            intent.drilldown
        );
    }
    Ok(intent)
}
