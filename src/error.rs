use thiserror::Error;

#[derive(Error, Debug)]
pub enum BudgetError {
    #[error("LLM error: {0}")]
    Llm(String),

    /// Model output could not be turned into a query plan
    #[error("{0}")]
    Translation(String),

    #[error("{0}")]
    InvalidUrl(String),

    #[error("Upstream API error{}: {message}", status_suffix(.status))]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    #[error("{0}")]
    Input(String),

    #[error("{0}")]
    Forecast(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

impl BudgetError {
    /// Status code used when the error reaches the web API boundary
    pub fn http_status(&self) -> u16 {
        match self {
            BudgetError::Input(_) => 400,
            _ => 500,
        }
    }

    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        BudgetError::Upstream {
            status,
            message: message.into(),
        }
    }
}

impl From<csv::Error> for BudgetError {
    fn from(err: csv::Error) -> Self {
        BudgetError::Csv(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BudgetError>;
