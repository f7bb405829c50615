#![allow(dead_code)]

use async_trait::async_trait;
use muni_budget::config::AppConfig;
use muni_budget::llm::{GenerationConfig, TextModel};
use muni_budget::treasury::CubeApi;
use muni_budget::{BudgetError, Result, ServiceContext};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// Model that answers each kind of prompt with a fixed response
#[derive(Default)]
pub struct ScriptedModel {
    pub intent: String,
    pub items: String,
    pub forecast: String,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(intent: &str, items: &str) -> Self {
        Self {
            intent: intent.to_string(),
            items: items.to_string(),
            ..Default::default()
        }
    }

    pub fn with_forecast(forecast: &str) -> Self {
        Self {
            forecast: forecast.to_string(),
            ..Default::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextModel for ScriptedModel {
    async fn complete(&self, prompt: &str, _config: &GenerationConfig) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.contains("API query builder") {
            Ok(self.intent.clone())
        } else if prompt.contains("Select all item codes") {
            Ok(self.items.clone())
        } else if prompt.contains("budget planning") {
            Ok(self.forecast.clone())
        } else {
            Err(BudgetError::Llm(format!("unexpected prompt: {}", prompt)))
        }
    }
}

/// Cube API double: serves the item catalog and echoes every other URL
pub struct FakeCube {
    pub catalog_available: bool,
    pub fail_queries: bool,
    pub cells: Value,
    pub requested: Mutex<Vec<String>>,
}

impl FakeCube {
    pub fn new() -> Self {
        Self {
            catalog_available: true,
            fail_queries: false,
            cells: json!([]),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn without_catalog() -> Self {
        Self {
            catalog_available: false,
            ..Self::new()
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl CubeApi for FakeCube {
    async fn get_json(&self, url: &str) -> Result<Value> {
        self.requested.lock().unwrap().push(url.to_string());

        if url.ends_with("/members/item") {
            if !self.catalog_available {
                return Err(BudgetError::upstream(Some(503), "metadata unavailable"));
            }
            return Ok(json!({
                "data": [
                    {"item.code": "0100", "item.label": "Property rates"},
                    {"item.code": "0200", "item.label": "Service charges - electricity revenue"},
                    {"item.code": "0400", "item.label": "Service charges - water revenue"}
                ]
            }));
        }

        if self.fail_queries {
            return Err(BudgetError::upstream(Some(400), "bad cut"));
        }
        Ok(json!({ "url": url, "cells": self.cells.clone() }))
    }
}

pub fn context(model: Arc<ScriptedModel>, cube: Arc<FakeCube>) -> ServiceContext {
    ServiceContext::new(AppConfig::default(), model, cube)
}
