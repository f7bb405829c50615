//! Natural-language request → validated INCEXP URL

use crate::context::ServiceContext;
use crate::error::{BudgetError, Result};
use crate::intent::{ask_model_for_intent, Dimension};
use crate::items::resolve_item_codes;
use crate::query::build_incexp_url;
use crate::text::normalize_text;
use crate::url_validator::is_valid_incexp_url;
use crate::years::extract_years;
use serde_json::Value;
use tracing::{debug, info};

/// Translate a free-text request into an INCEXP cube URL.
///
/// Item codes and years never come from the model: both are derived locally
/// from the request text and replace whatever cuts the model proposed for
/// those dimensions (or remove them when nothing is found locally).
pub async fn incexp_url_from_user_request(ctx: &ServiceContext, user_request: &str) -> Result<String> {
    let request = normalize_text(user_request);

    let mut intent = ask_model_for_intent(ctx.model.as_ref(), &request, ctx.config.default_pagesize)
        .await?
        .ok_or_else(|| BudgetError::Translation("Model output could not be parsed into JSON.".to_string()))?;

    let item_codes = resolve_item_codes(ctx, &request).await;
    if item_codes.is_empty() {
        intent.remove_cut(Dimension::ItemCode);
    } else {
        intent.set_cut(Dimension::ItemCode, item_codes);
    }

    let years = extract_years(&request);
    if years.is_empty() {
        intent.remove_cut(Dimension::FinancialYearEnd);
    } else {
        info!("Years from request: {}", years.join(","));
        intent.set_cut(Dimension::FinancialYearEnd, years);
    }

    let url = build_incexp_url(ctx.base_url(), &intent);
    debug!("Built URL: {}", url);

    if !is_valid_incexp_url(&url) {
        return Err(BudgetError::InvalidUrl(format!("Built URL invalid: {}", url)));
    }
    Ok(url)
}

/// Translate the request and fetch the resulting cube query
pub async fn run_user_query(ctx: &ServiceContext, user_request: &str) -> Result<Value> {
    let url = incexp_url_from_user_request(ctx, user_request).await?;
    info!("Querying treasury API: {}", url);
    ctx.cube.get_json(&url).await
}
