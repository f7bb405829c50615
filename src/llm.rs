use crate::config::LlmConfig;
use crate::error::{BudgetError, Result};
use async_trait::async_trait;
use tracing::debug;

/// Sampling parameters for a single completion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GenerationConfig {
    /// Used for intent and item-code selection, where output must be exact
    pub fn precise() -> Self {
        Self {
            temperature: Some(0.1),
            max_tokens: Some(1000),
        }
    }

    pub fn forecast() -> Self {
        Self {
            temperature: Some(0.2),
            max_tokens: Some(10000),
        }
    }
}

/// A text-completion oracle: prompt in, raw text out
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn complete(&self, prompt: &str, config: &GenerationConfig) -> Result<String>;
}

/// OpenAI-compatible chat completions client
#[derive(Clone)]
pub struct LlmClient {
    api_key: Option<String>,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: Option<String>, model: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(config.api_key.clone(), config.model.clone(), config.base_url.clone())
    }
}

#[async_trait]
impl TextModel for LlmClient {
    async fn complete(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| BudgetError::Llm("OPENAI_API_KEY is not set".to_string()))?;

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
        });
        if let Some(temperature) = config.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if let Some(max_tokens) = config.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        debug!("Calling model {} ({} prompt chars)", self.model, prompt.len());

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| BudgetError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BudgetError::Llm(format!("LLM API returned {}: {}", status, text)));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BudgetError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| BudgetError::Llm("No content in LLM response".to_string()))?;

        Ok(content.to_string())
    }
}
