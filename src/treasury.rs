//! Municipal Money cube API client

use crate::error::{BudgetError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

/// Read-only access to the treasury cubes
#[async_trait]
pub trait CubeApi: Send + Sync {
    /// GET `url` and decode the JSON body
    async fn get_json(&self, url: &str) -> Result<Value>;
}

/// One row of the item catalog (`/cubes/incexp/members/item`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCatalogEntry {
    pub code: String,
    pub label: String,
}

pub struct TreasuryClient {
    client: reqwest::Client,
}

impl TreasuryClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for TreasuryClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CubeApi for TreasuryClient {
    async fn get_json(&self, url: &str) -> Result<Value> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BudgetError::upstream(None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Treasury API returned {} for {}: {}", status, url, body);
            return Err(BudgetError::upstream(Some(status.as_u16()), body));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| BudgetError::upstream(Some(status.as_u16()), format!("invalid JSON body: {}", e)))
    }
}

pub fn item_members_url(base: &str) -> String {
    format!("{}/cubes/incexp/members/item", base.trim_end_matches('/'))
}

/// Fetch the live item catalog. Entries without a code or label are skipped.
pub async fn fetch_item_catalog(cube: &dyn CubeApi, base: &str) -> Result<Vec<ItemCatalogEntry>> {
    let body = cube.get_json(&item_members_url(base)).await?;
    Ok(catalog_from_members(&body))
}

fn catalog_from_members(body: &Value) -> Vec<ItemCatalogEntry> {
    let Some(data) = body.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };

    data.iter()
        .filter_map(|item| {
            let code = member_text(item.get("item.code")?)?;
            let label = member_text(item.get("item.label")?)?;
            Some(ItemCatalogEntry { code, label })
        })
        .collect()
}

fn member_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
