//! Runtime configuration
//!
//! Values come from the process environment (optionally seeded from a `.env`
//! file). Command-line flags in the binaries override them.

use crate::error::{EmpowerError, Result};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// OpenAI API key. `None` selects the offline heuristic generator.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Upper bound on a single reasoning-service call
    pub llm_timeout: Duration,
    pub listen_addr: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            llm_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            listen_addr: DEFAULT_ADDR.to_string(),
        }
    }
}

impl AppConfig {
    /// Load `.env` (if present) and read configuration from the environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Split out so tests do not
    /// have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_key = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty());
        if api_key.is_some() {
            info!("OpenAI API key found, reasoning calls go to the configured service");
        } else {
            warn!("OPENAI_API_KEY not set, using the offline heuristic generator");
        }

        let llm_timeout = match lookup("LLM_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    EmpowerError::Config(format!("LLM_TIMEOUT_SECS must be a whole number, got '{}'", raw))
                })?;
                if secs == 0 {
                    return Err(EmpowerError::Config("LLM_TIMEOUT_SECS must be positive".to_string()));
                }
                Duration::from_secs(secs)
            }
            None => defaults.llm_timeout,
        };

        Ok(Self {
            api_key,
            model: lookup("OPENAI_MODEL").unwrap_or(defaults.model),
            base_url: lookup("OPENAI_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            llm_timeout,
            listen_addr: lookup("EMPOWER_ADDR").unwrap_or(defaults.listen_addr),
        })
    }
}
