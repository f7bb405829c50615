//! Resolving free-text item descriptions to catalog item codes

use crate::context::ServiceContext;
use crate::error::Result;
use crate::llm::GenerationConfig;
use crate::prompts::item_selection_prompt;
use crate::text::normalize_text;
use crate::treasury::fetch_item_catalog;
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{info, warn};

lazy_static! {
    static ref ITEM_CODE: Regex = Regex::new(r"^[0-9]{4}$").unwrap();
    static ref ITEM_CODE_TOKEN: Regex = Regex::new(r"\b[0-9]{4}\b").unwrap();
}

/// Every code in the live catalog; empty when the catalog cannot be fetched
pub async fn fetch_valid_item_codes(ctx: &ServiceContext) -> BTreeSet<String> {
    match fetch_item_catalog(ctx.cube.as_ref(), ctx.base_url()).await {
        Ok(catalog) => catalog.into_iter().map(|entry| entry.code).collect(),
        Err(e) => {
            warn!("Could not fetch item catalog: {}", e);
            BTreeSet::new()
        }
    }
}

/// Ask the model which catalog codes match `description`.
///
/// Errors from the catalog fetch or the model call are returned as-is; use
/// [`resolve_item_codes`] for the degrade-to-empty behaviour.
pub async fn fetch_item_codes_by_description(
    ctx: &ServiceContext,
    description: &str,
) -> Result<Vec<String>> {
    let catalog = fetch_item_catalog(ctx.cube.as_ref(), ctx.base_url()).await?;
    let catalog_json = serde_json::to_string(&catalog)?;

    let prompt = item_selection_prompt(&catalog_json, description);
    let raw = ctx.model.complete(&prompt, &GenerationConfig::precise()).await?;

    Ok(parse_item_codes(&normalize_text(&raw)))
}

/// Item codes for `description`, or none if anything along the way failed
pub async fn resolve_item_codes(ctx: &ServiceContext, description: &str) -> Vec<String> {
    match fetch_item_codes_by_description(ctx, description).await {
        Ok(codes) => {
            info!("Resolved {} item code(s)", codes.len());
            codes
        }
        Err(e) => {
            warn!("Item code resolution failed, continuing without item filter: {}", e);
            Vec::new()
        }
    }
}

/// Read codes from the model's answer.
///
/// A JSON array keeps only four-digit codes; anything else falls back to
/// scanning the raw text for four-digit tokens. Order of first appearance is
/// kept in both cases.
pub fn parse_item_codes(raw: &str) -> Vec<String> {
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(raw) {
        return items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|code| ITEM_CODE.is_match(code))
            .unique()
            .collect();
    }

    ITEM_CODE_TOKEN
        .find_iter(raw)
        .map(|m| m.as_str().to_string())
        .unique()
        .collect()
}
