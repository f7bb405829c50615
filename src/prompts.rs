//! Prompt text sent to the generative model.

use crate::config::SectorFloor;

/// Instruction block for turning a plain-English request into an INCEXP query plan
pub const INTENT_INSTRUCTIONS: &str = r#"
You are an API query builder for the Municipal Money API (https://municipaldata.treasury.gov.za/api).

Your task:
- Convert plain-English user requests into a structured JSON object that can be turned into a valid INCEXP cube query.
- Do not output explanations, code fences, or extra text - only the JSON object.

Rules:
1. Always output a single JSON object.
2. Allowed JSON keys:
   - endpoint: "facts" or "aggregate"
   - cuts: an array of { "dimension": "...", "value": "..." } objects
   - drilldown: MUST always be an array of dimension names, e.g. ["demarcation.code","financial_year_end.year"]
   - aggregates: optional array of aggregate measures, e.g. ["amount.sum"]
   - order: optional string, e.g. "amount.sum:desc"
   - pagesize: integer (default = 20 if not specified)

3. Dimensions you can use in cuts:
   - demarcation.code  (municipality code, e.g. "CPT", "TSH")
   - financial_year_end.year  (integer or range, e.g. 2022 or 2019;2023 for 2019 to 2023)
   - financial_period.period  (period, e.g. 2015)
   - item.code  (financial item, e.g. "0100" for operating revenue)
   - amount_type.code  (e.g. "AUDA" for audited actuals, "ORGB" for original budget)

4. Formatting rules:
   - Use exact dimension names as above.
   - Municipality codes must be uppercase (e.g. "CPT").
   - Item codes and amount_type codes must be strings, e.g. "0100", "AUDA".
   - Years may be integers (2022) or ranges (2019-2023).
   - Always wrap string values in quotes inside the JSON.
   - Do not use curly quotes, only straight quotes.

5. drilldown must NEVER be a single string with commas. It must always be a JSON array of strings.

6. Never return an API URL directly. Only return the JSON specification.

7. Always include "item.label" in the drilldown for each item, so the client can display the item description.
"#;

pub fn intent_prompt(user_text: &str) -> String {
    format!("{}\n\nUser request: {}\n\nJSON:", INTENT_INSTRUCTIONS, user_text)
}

/// Ask the model to pick item codes from the live catalog
pub fn item_selection_prompt(catalog_json: &str, description: &str) -> String {
    format!(
        "Given the following item codes and their descriptions:\n\
         {}\n\
         Select all item codes relevant to this description: \"{}\".\n\
         Be more exclusive rather than inclusive.\n\
         Return only a JSON array of codes, no explanation.",
        catalog_json, description
    )
}

pub fn forecast_prompt(table: &str, budget_total: f64, floors: &[SectorFloor]) -> String {
    let constraints: Vec<String> = floors
        .iter()
        .map(|f| format!("- {} >= {}", f.sector, format_amount(f.minimum)))
        .collect();

    format!(
        r#"
You are a municipal budget planning AI.
Here is the municipality's historical budget data (time,item_id,target):

{}
Based on the past few years, provide a forecast for the next financial year's required amounts per sector.
Then allocate a total budget of {} ZAR across sectors.
Constraints:
{}

Only output your response as a raw JSON array of objects, with the fields "sector", "forecast" and "allocation". Do not
provide code or any other commentary. JUST give the raw JSON array of objects, with the specified fields.
"#,
        table,
        format_amount(budget_total),
        constraints.join("\n")
    )
}

// Whole amounts print without a trailing ".0"
fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_prompt_appends_request() {
        let prompt = intent_prompt("water spend in CPT");
        assert!(prompt.starts_with(INTENT_INSTRUCTIONS));
        assert!(prompt.ends_with("User request: water spend in CPT\n\nJSON:"));
    }

    #[test]
    fn test_forecast_prompt_lists_floors() {
        let floors = vec![
            SectorFloor { sector: "Health".to_string(), minimum: 2_000_000_000.0 },
            SectorFloor { sector: "Water".to_string(), minimum: 1_000_000_000.0 },
        ];
        let prompt = forecast_prompt("time,item_id,target\n", 10_000_000_000.0, &floors);
        assert!(prompt.contains("- Health >= 2000000000\n- Water >= 1000000000"));
        assert!(prompt.contains("total budget of 10000000000 ZAR"));
    }

    #[test]
    fn test_item_selection_prompt_quotes_description() {
        let prompt = item_selection_prompt("[]", "road repairs");
        assert!(prompt.contains("relevant to this description: \"road repairs\"."));
        assert!(prompt.contains("Be more exclusive rather than inclusive."));
    }
}
