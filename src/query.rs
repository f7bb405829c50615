//! Serialization of an [`Intent`] into the INCEXP cube query-string grammar.
//!
//! The cube expects `cut=dim:"a";"b"|other:1`, which naive percent-encoding
//! of `;`, `|` and `"` would break, so parameters are joined verbatim.
//! Values must not contain `&`, `=` or quote characters.

use crate::intent::{Cut, Dimension, Intent};

/// Quote a single cut value according to its dimension.
///
/// Years are never quoted, item codes always are. Other dimensions are quoted
/// when part of a multi-value cut or when not purely numeric/hyphenated.
pub fn format_cut_value(dimension: Dimension, raw: &str, multi: bool) -> String {
    let value = raw.trim_matches('"').trim_matches('\'');

    match dimension {
        Dimension::FinancialYearEnd => value.to_string(),
        Dimension::ItemCode => format!("\"{}\"", value),
        _ if multi => format!("\"{}\"", value),
        _ if is_bare(value) => value.to_string(),
        _ => format!("\"{}\"", value),
    }
}

fn is_bare(value: &str) -> bool {
    (!value.is_empty() && value.chars().all(|c| c.is_ascii_digit())) || value.contains('-')
}

/// Build the `cut` parameter, one `dimension:values` fragment per dimension
pub fn build_cut_param(cuts: &[Cut]) -> String {
    let mut merged: Vec<(Dimension, Vec<&str>)> = Vec::new();
    for cut in cuts {
        match merged.iter_mut().find(|(d, _)| *d == cut.dimension) {
            Some((_, values)) => values.extend(cut.values.iter().map(String::as_str)),
            None => merged.push((cut.dimension, cut.values.iter().map(String::as_str).collect())),
        }
    }

    merged
        .into_iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(dimension, values)| {
            let multi = values.len() > 1;
            let formatted: Vec<String> = values
                .iter()
                .map(|v| format_cut_value(dimension, v, multi))
                .collect();
            format!("{}:{}", dimension, formatted.join(";"))
        })
        .collect::<Vec<_>>()
        .join("|")
}

/// Full INCEXP URL for `intent`, rooted at the API `base`
pub fn build_incexp_url(base: &str, intent: &Intent) -> String {
    let mut params: Vec<(&str, String)> = Vec::new();

    let cut = build_cut_param(&intent.cuts);
    if !cut.is_empty() {
        params.push(("cut", cut));
    }
    if !intent.drilldown.is_empty() {
        params.push(("drilldown", intent.drilldown.join("|")));
    }
    if !intent.aggregates.is_empty() {
        params.push(("aggregates", intent.aggregates.join(",")));
    }
    if let Some(order) = &intent.order {
        params.push(("order", order.clone()));
    }
    params.push(("pagesize", intent.pagesize.to_string()));

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}/cubes/incexp/{}?{}",
        base.trim_end_matches('/'),
        intent.endpoint.as_str(),
        query
    )
}
