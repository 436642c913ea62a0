use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmpowerError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Reasoning service unavailable: {0}")]
    Unavailable(String),

    #[error("Reasoning service timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Malformed service response: {0}")]
    Decode(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EmpowerError {
    /// Transient failures the caller may retry with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, EmpowerError::Unavailable(_) | EmpowerError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, EmpowerError>;
