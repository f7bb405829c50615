use crate::config::AppConfig;
use crate::llm::{LlmClient, TextModel};
use crate::municipality::ReferenceTables;
use crate::treasury::{CubeApi, TreasuryClient};
use std::sync::Arc;

/// Everything an operation needs, built once at process start
#[derive(Clone)]
pub struct ServiceContext {
    pub config: AppConfig,
    pub model: Arc<dyn TextModel>,
    pub cube: Arc<dyn CubeApi>,
    pub tables: Arc<ReferenceTables>,
}

impl ServiceContext {
    pub fn new(config: AppConfig, model: Arc<dyn TextModel>, cube: Arc<dyn CubeApi>) -> Self {
        Self {
            config,
            model,
            cube,
            tables: Arc::new(ReferenceTables::default()),
        }
    }

    /// Context backed by the real model provider and treasury API
    pub fn from_config(config: AppConfig) -> Self {
        let model = Arc::new(LlmClient::from_config(&config.llm));
        let cube = Arc::new(TreasuryClient::new());
        Self::new(config, model, cube)
    }

    pub fn base_url(&self) -> &str {
        &self.config.treasury_base_url
    }
}
