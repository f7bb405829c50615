pub mod config;
pub mod context;
pub mod error;
pub mod forecast;
pub mod intent;
pub mod items;
pub mod json_extract;
pub mod llm;
pub mod municipality;
pub mod pipeline;
pub mod prompts;
pub mod query;
pub mod server;
pub mod text;
pub mod treasury;
pub mod url_validator;
pub mod years;

pub use context::ServiceContext;
pub use error::{BudgetError, Result};

/// Install the tracing subscriber used by both binaries (`RUST_LOG`, default `info`)
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
