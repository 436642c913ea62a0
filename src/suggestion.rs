//! Query suggestions generated from a schema description.

use crate::error::{EmpowerError, Result};
use crate::llm::{clean_json_response, generate_with_timeout, TextGenerator};
use crate::prompts::SUGGEST_QUERIES;
use itertools::Itertools;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Number of suggestions the prompt asks for.
pub const SUGGESTION_COUNT: usize = 5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct WireSuggestions {
    suggested_queries: Vec<String>,
}

pub struct QuerySuggester {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl QuerySuggester {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    pub async fn suggest_queries(&self, schema_description: &str) -> Result<Vec<String>> {
        if schema_description.trim().is_empty() {
            return Err(EmpowerError::InvalidInput("schema description is empty".to_string()));
        }
        let input = serde_json::json!({ "schemaDescription": schema_description });
        let raw = generate_with_timeout(self.generator.as_ref(), &SUGGEST_QUERIES, &input, self.timeout).await?;
        let suggestions = decode_suggestions(&raw)?;
        info!("Generated {} query suggestions", suggestions.len());
        Ok(suggestions)
    }
}

/// Trimmed, de-duplicated (case-insensitively, first wins), non-empty list.
pub fn decode_suggestions(raw: &str) -> Result<Vec<String>> {
    let wire: WireSuggestions = serde_json::from_str(clean_json_response(raw))
        .map_err(|e| EmpowerError::Decode(format!("suggestion response: {}", e)))?;

    let suggestions: Vec<String> = wire
        .suggested_queries
        .into_iter()
        .map(|q| strip_numbering(q.trim()).to_string())
        .filter(|q| !q.is_empty())
        .unique_by(|q| q.to_lowercase())
        .collect();

    if suggestions.is_empty() {
        return Err(EmpowerError::Decode("suggestedQueries is empty".to_string()));
    }
    Ok(suggestions)
}

/// Drop a leading "1." / "2)" list marker the model sometimes keeps.
fn strip_numbering(s: &str) -> &str {
    let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return s;
    }
    let rest = &s[digits..];
    match rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
        Some(rest) => rest.trim_start(),
        None => s,
    }
}
