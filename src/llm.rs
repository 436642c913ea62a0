//! Reasoning-service boundary
//!
//! Every flow talks to the language model through `TextGenerator`. The real
//! implementation is `LlmClient` (OpenAI-compatible chat completions); the
//! offline one is `HeuristicGenerator`; tests script replies with
//! `ScriptedGenerator`.

use crate::config::AppConfig;
use crate::error::{EmpowerError, Result};
use crate::heuristic::HeuristicGenerator;
use crate::prompts::{PromptTemplate, JSON_ONLY_SYSTEM};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generator name for logs (e.g. "openai", "heuristic")
    fn name(&self) -> &'static str;

    /// Produce the raw response text for `template` filled from `input`.
    async fn generate(&self, template: &PromptTemplate, input: &Value) -> Result<String>;
}

/// Run one generation bounded by `limit`. Dropping the returned future
/// cancels the in-flight call.
pub async fn generate_with_timeout(
    generator: &dyn TextGenerator,
    template: &PromptTemplate,
    input: &Value,
    limit: Duration,
) -> Result<String> {
    debug!("Calling {} generator for {}", generator.name(), template.name);
    match tokio::time::timeout(limit, generator.generate(template, input)).await {
        Ok(result) => result,
        Err(_) => {
            warn!("{} call for {} timed out after {:?}", generator.name(), template.name, limit);
            Err(EmpowerError::Timeout(limit))
        }
    }
}

/// Strip markdown code fences the model sometimes wraps around JSON.
pub fn clean_json_response(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Pick the generator for a configuration: the real client when an API key is
/// present, otherwise the offline heuristic responder.
pub fn generator_from_config(config: &AppConfig) -> Result<Arc<dyn TextGenerator>> {
    match &config.api_key {
        Some(key) => Ok(Arc::new(LlmClient::new(
            key.clone(),
            config.model.clone(),
            config.base_url.clone(),
            config.llm_timeout,
        )?)),
        None => Ok(Arc::new(HeuristicGenerator::new())),
    }
}

#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: String, model: String, base_url: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmpowerError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_key,
            base_url,
            model,
        })
    }

    async fn call_llm(&self, prompt: &str) -> Result<String> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": JSON_ONLY_SYSTEM},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.1,
        });
        if self.model.starts_with("gpt-4") || self.model.starts_with("gpt-5") {
            body["max_completion_tokens"] = serde_json::json!(1000);
        } else {
            body["max_tokens"] = serde_json::json!(1000);
        }

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EmpowerError::Unavailable(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            let message = format!("LLM API error ({}): {}", status, error_text);
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                EmpowerError::Unavailable(message)
            } else {
                EmpowerError::Llm(message)
            });
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| EmpowerError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        let choice = response_json
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| EmpowerError::Llm("No choices in LLM response".to_string()))?;

        match choice.get("finish_reason").and_then(|r| r.as_str()) {
            Some("content_filter") => {
                return Err(EmpowerError::Llm("LLM response was filtered by content policy".to_string()))
            }
            Some("length") => warn!("LLM response was truncated due to length limit"),
            _ => {}
        }

        let content = choice["message"]["content"]
            .as_str()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| EmpowerError::Llm("No content in LLM response".to_string()))?;

        Ok(content.to_string())
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, template: &PromptTemplate, input: &Value) -> Result<String> {
        let prompt = template.render(input)?;
        self.call_llm(&prompt).await
    }
}

/// Canned behaviour for one `ScriptedGenerator` call.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Unavailable(String),
    /// Never completes; exercises caller timeouts.
    Hang,
}

/// Deterministic generator for tests: replies are queued per template name
/// and every call is recorded.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    replies: Mutex<HashMap<&'static str, VecDeque<ScriptedReply>>>,
    calls: Mutex<Vec<(&'static str, Value)>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, template: &PromptTemplate, reply: ScriptedReply) -> &Self {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(template.name)
            .or_default()
            .push_back(reply);
        self
    }

    pub fn reply(&self, template: &PromptTemplate, text: impl Into<String>) -> &Self {
        self.push(template, ScriptedReply::Text(text.into()))
    }

    pub fn calls(&self) -> Vec<(&'static str, Value)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(&self, template: &PromptTemplate, input: &Value) -> Result<String> {
        // Render anyway so missing fields surface the same way as in production.
        template.render(input)?;
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((template.name, input.clone()));

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(template.name)
            .and_then(|q| q.pop_front());

        match reply {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Unavailable(msg)) => Err(EmpowerError::Unavailable(msg)),
            Some(ScriptedReply::Hang) => std::future::pending().await,
            None => Err(EmpowerError::Llm(format!("no scripted reply for {}", template.name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::SUGGEST_QUERIES;
    use serde_json::json;

    #[test]
    fn test_clean_json_response() {
        assert_eq!(clean_json_response("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(clean_json_response("  {\"a\":1} "), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_timeout_surfaces_as_error() {
        let generator = ScriptedGenerator::new();
        generator.push(&SUGGEST_QUERIES, ScriptedReply::Hang);
        let err = generate_with_timeout(
            &generator,
            &SUGGEST_QUERIES,
            &json!({"schemaDescription": "employees(emp_id integer)"}),
            Duration::from_millis(20),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EmpowerError::Timeout(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let generator = ScriptedGenerator::new();
        generator
            .reply(&SUGGEST_QUERIES, "first")
            .reply(&SUGGEST_QUERIES, "second");
        let input = json!({"schemaDescription": "x"});
        assert_eq!(generator.generate(&SUGGEST_QUERIES, &input).await.unwrap(), "first");
        assert_eq!(generator.generate(&SUGGEST_QUERIES, &input).await.unwrap(), "second");
        assert!(generator.generate(&SUGGEST_QUERIES, &input).await.is_err());
        assert_eq!(generator.call_count(), 3);
    }

    #[test]
    fn test_generator_selection() {
        let offline = generator_from_config(&AppConfig::default()).unwrap();
        assert_eq!(offline.name(), "heuristic");

        let config = AppConfig {
            api_key: Some("sk-test".to_string()),
            ..AppConfig::default()
        };
        assert_eq!(generator_from_config(&config).unwrap().name(), "openai");
    }
}
