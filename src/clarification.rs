//! Clarification Resolver
//!
//! Decides how an ambiguous query with several candidate matches is resolved:
//! narrowed to one clarified query, turned into follow-up questions, or handed
//! back as the candidate list. Cheap local narrowing runs first; only a still
//! ambiguous set goes to the reasoning service.

use crate::error::{EmpowerError, Result};
use crate::llm::{clean_json_response, generate_with_timeout, TextGenerator};
use crate::prompts::CLARIFICATION;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CandidateMatch {
    pub id: String,
    pub name: String,
    /// Disambiguating text, e.g. department or role
    pub context: String,
}

impl CandidateMatch {
    pub fn new(id: &str, name: &str, context: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            context: context.to_string(),
        }
    }
}

/// Exactly one resolution. Serializes as a single-key object, e.g.
/// `{"clarifiedQuery": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ClarificationOutcome {
    #[serde(rename = "clarifiedQuery")]
    ClarifiedQuery(String),
    /// Ordered and never empty
    #[serde(rename = "followUpQuestions")]
    FollowUpQuestions(Vec<String>),
    /// The caller's candidates, in the order received
    #[serde(rename = "candidates")]
    Candidates(Vec<CandidateMatch>),
}

/// Response shape the reasoning service is asked for. Unused keys may be
/// omitted or null; anything else is malformed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct WireOutcome {
    #[serde(default)]
    clarified_query: Option<String>,
    #[serde(default)]
    follow_up_questions: Option<Vec<String>>,
    #[serde(default)]
    possible_matches_with_context: Option<Vec<CandidateMatch>>,
}

pub struct ClarificationResolver {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl ClarificationResolver {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    pub async fn resolve(&self, query: &str, candidates: &[CandidateMatch]) -> Result<ClarificationOutcome> {
        if query.trim().is_empty() {
            return Err(EmpowerError::InvalidQuery("query is empty".to_string()));
        }
        if candidates.is_empty() {
            return Err(EmpowerError::InvalidInput("no candidate matches to clarify".to_string()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = candidates.iter().find(|c| !seen.insert(c.id.as_str())) {
            return Err(EmpowerError::InvalidInput(format!("duplicate candidate id '{}'", dup.id)));
        }

        if let Some(chosen) = narrow_locally(query, candidates) {
            info!("Resolved '{}' locally to candidate {}", query, chosen.id);
            return Ok(ClarificationOutcome::ClarifiedQuery(clarified_query(query, chosen)));
        }

        let input = serde_json::json!({
            "query": query,
            "possibleMatches": candidates,
            "matchList": render_match_list(candidates),
        });
        let raw = generate_with_timeout(self.generator.as_ref(), &CLARIFICATION, &input, self.timeout).await?;
        let outcome = decode_outcome(&raw, candidates)?;
        debug!("Clarification outcome from {}: {:?}", self.generator.name(), outcome);
        Ok(outcome)
    }
}

/// Candidate lines as injected into the prompt.
pub fn render_match_list(candidates: &[CandidateMatch]) -> String {
    candidates
        .iter()
        .map(|c| format!("- Name: {}, Context: {}, ID: {}", c.name, c.context, c.id))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The clarified query names the chosen candidate's id and nothing else.
pub fn clarified_query(query: &str, chosen: &CandidateMatch) -> String {
    format!("{} (id: {}, {}, {})", query.trim(), chosen.id, chosen.name, chosen.context)
}

/// A single candidate, or exactly one candidate whose name and context are
/// both named in the query as whole phrases.
fn narrow_locally<'a>(query: &str, candidates: &'a [CandidateMatch]) -> Option<&'a CandidateMatch> {
    if let [only] = candidates {
        return Some(only);
    }

    let mut matched = candidates
        .iter()
        .filter(|c| phrase_mentioned(query, &c.name) && phrase_mentioned(query, &c.context));
    let first = matched.next()?;
    if matched.next().is_some() {
        return None;
    }
    Some(first)
}

/// Case-insensitive whole-phrase match. The phrase must be bounded by the
/// query edges or non-word characters, so `C++` and `.NET` match too.
fn phrase_mentioned(query: &str, phrase: &str) -> bool {
    let phrase = phrase.trim();
    if phrase.is_empty() {
        return false;
    }
    let pattern = format!(r"(?:^|\W){}(?:\W|$)", regex::escape(phrase));
    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => re.is_match(query),
        Err(e) => {
            warn!("Could not build pattern for '{}': {}", phrase, e);
            false
        }
    }
}

/// Decode a service response into exactly one outcome.
pub fn decode_outcome(raw: &str, candidates: &[CandidateMatch]) -> Result<ClarificationOutcome> {
    let wire: WireOutcome = serde_json::from_str(clean_json_response(raw))
        .map_err(|e| EmpowerError::Decode(format!("clarification response: {}", e)))?;

    let populated = [
        wire.clarified_query.is_some(),
        wire.follow_up_questions.is_some(),
        wire.possible_matches_with_context.is_some(),
    ]
    .iter()
    .filter(|p| **p)
    .count();
    if populated != 1 {
        return Err(EmpowerError::Decode(format!(
            "clarification response must populate exactly one variant, found {}",
            populated
        )));
    }

    if let Some(query) = wire.clarified_query {
        if query.trim().is_empty() {
            return Err(EmpowerError::Decode("clarifiedQuery is empty".to_string()));
        }
        return Ok(ClarificationOutcome::ClarifiedQuery(query));
    }

    if let Some(questions) = wire.follow_up_questions {
        if questions.is_empty() || questions.iter().any(|q| q.trim().is_empty()) {
            return Err(EmpowerError::Decode("followUpQuestions must be non-empty".to_string()));
        }
        return Ok(ClarificationOutcome::FollowUpQuestions(questions));
    }

    let echoed = wire.possible_matches_with_context.unwrap_or_default();
    if echoed.is_empty() {
        return Err(EmpowerError::Decode("possibleMatchesWithContext is empty".to_string()));
    }
    if let Some(unknown) = echoed.iter().find(|e| !candidates.iter().any(|c| c.id == e.id)) {
        return Err(EmpowerError::Decode(format!("unknown candidate id '{}' in response", unknown.id)));
    }
    Ok(ClarificationOutcome::Candidates(candidates.to_vec()))
}
