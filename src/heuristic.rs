//! Offline generator
//!
//! Answers each prompt with a deterministic, rule-based response in the same
//! JSON shape the language model is asked for. Used when no API key is
//! configured so the service still works end to end.

use crate::clarification::CandidateMatch;
use crate::error::{EmpowerError, Result};
use crate::llm::TextGenerator;
use crate::prompts::{PromptTemplate, CLARIFICATION, SCHEMA_MAPPING, SUGGEST_QUERIES};
use crate::schema::SchemaOutline;
use crate::suggestion::SUGGESTION_COUNT;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use strsim::jaro_winkler;

/// Minimum Jaro-Winkler similarity between a query word and a column token.
const TERM_MATCH_THRESHOLD: f64 = 0.9;

const STOPWORDS: &[&str] = &[
    "a", "all", "am", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "each", "for",
    "from", "get", "give", "have", "how", "i", "in", "is", "it", "last", "list", "many", "me", "much",
    "of", "on", "or", "our", "show", "than", "that", "the", "their", "there", "this", "to", "us", "was",
    "we", "were", "what", "which", "who", "whose", "with", "year", "you",
];

/// Query words that name a column under a different word.
const ALIASES: &[(&str, &str)] = &[
    ("department", "dept"),
    ("hired", "join"),
    ("hire", "join"),
    ("joined", "join"),
    ("paid", "salary"),
    ("pay", "salary"),
    ("earn", "salary"),
    ("role", "position"),
    ("title", "position"),
    ("manager", "manager"),
];

lazy_static! {
    static ref NAME_PHRASE: Regex = Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)+").unwrap();
    static ref WORD: Regex = Regex::new(r"[A-Za-z][A-Za-z0-9_]*").unwrap();
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicGenerator;

impl HeuristicGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextGenerator for HeuristicGenerator {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn generate(&self, template: &PromptTemplate, input: &Value) -> Result<String> {
        let response = if template.name == CLARIFICATION.name {
            let candidates: Vec<CandidateMatch> =
                serde_json::from_value(input.get("possibleMatches").cloned().unwrap_or(Value::Null))
                    .map_err(|e| EmpowerError::InvalidInput(format!("possibleMatches: {}", e)))?;
            clarify(&candidates)
        } else if template.name == SCHEMA_MAPPING.name {
            json!({ "mapping": lexical_mapping(str_field(template, input, "query")?, str_field(template, input, "schema")?) })
        } else if template.name == SUGGEST_QUERIES.name {
            json!({ "suggestedQueries": suggest(str_field(template, input, "schemaDescription")?) })
        } else {
            return Err(EmpowerError::Llm(format!(
                "heuristic generator has no rule for prompt '{}'",
                template.name
            )));
        };

        Ok(response.to_string())
    }
}

fn str_field<'a>(template: &PromptTemplate, input: &'a Value, name: &str) -> Result<&'a str> {
    input.get(name).and_then(|v| v.as_str()).ok_or_else(|| {
        EmpowerError::InvalidInput(format!("{} input is missing '{}'", template.name, name))
    })
}

/// Same-name candidates become one follow-up question; anything else is
/// handed back for the user to pick from.
fn clarify(candidates: &[CandidateMatch]) -> Value {
    let first = match candidates.first() {
        Some(first) => first,
        None => return json!({ "possibleMatchesWithContext": [] }),
    };
    let same_name = candidates
        .iter()
        .all(|c| c.name.eq_ignore_ascii_case(&first.name));
    let contexts: HashSet<&str> = candidates.iter().map(|c| c.context.as_str()).collect();

    if same_name && contexts.len() == candidates.len() {
        let options: Vec<String> = candidates
            .iter()
            .map(|c| format!("the one in {}", c.context))
            .collect();
        let question = format!("Which {} do you mean: {}?", first.name, join_options(&options));
        json!({ "followUpQuestions": [question] })
    } else {
        json!({ "possibleMatchesWithContext": candidates })
    }
}

fn join_options(options: &[String]) -> String {
    match options {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} or {}", init.join(", "), last),
    }
}

/// Map query terms to `table.column` paths by token similarity. Multi-word
/// capitalised phrases are treated as person names.
pub fn lexical_mapping(query: &str, schema: &str) -> BTreeMap<String, Option<String>> {
    let outline = SchemaOutline::parse(schema);
    let mut mapping = BTreeMap::new();
    let mut covered: Vec<(usize, usize)> = Vec::new();

    for phrase in NAME_PHRASE.find_iter(query) {
        let (start, text) = strip_leading_stopwords(phrase.start(), phrase.as_str());
        if text.split_whitespace().count() < 2 {
            continue;
        }
        covered.push((start, start + text.len()));
        mapping.insert(text.to_string(), name_column(&outline));
    }

    for word in WORD.find_iter(query) {
        if covered.iter().any(|(s, e)| word.start() >= *s && word.end() <= *e) {
            continue;
        }
        let lowered = word.as_str().to_lowercase();
        if lowered.len() < 3 || STOPWORDS.contains(&lowered.as_str()) {
            continue;
        }
        mapping
            .entry(word.as_str().to_string())
            .or_insert_with(|| best_column(&lowered, &outline));
    }
    mapping
}

fn strip_leading_stopwords(mut start: usize, mut text: &str) -> (usize, &str) {
    while let Some((head, tail)) = text.split_once(char::is_whitespace) {
        if !STOPWORDS.contains(&head.to_lowercase().as_str()) {
            break;
        }
        let tail = tail.trim_start();
        start += text.len() - tail.len();
        text = tail;
    }
    (start, text)
}

fn name_column(outline: &SchemaOutline) -> Option<String> {
    outline.tables.iter().find_map(|(table, columns)| {
        columns
            .iter()
            .find(|c| c.contains("name"))
            .map(|c| format!("{}.{}", table, c))
    })
}

fn singular(word: &str) -> &str {
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        &word[..word.len() - 1]
    } else {
        word
    }
}

/// Best-scoring column for one lowercased query word. Identifier columns lose
/// ties to descriptive ones.
fn best_column(word: &str, outline: &SchemaOutline) -> Option<String> {
    let stem = singular(word);
    let target = ALIASES
        .iter()
        .find(|(from, _)| *from == stem)
        .map(|(_, to)| *to)
        .unwrap_or(stem);

    let mut best: Option<(f64, bool, String)> = None;
    for (table, columns) in &outline.tables {
        let table_hit = jaro_winkler(target, singular(table)) >= TERM_MATCH_THRESHOLD;
        for column in columns {
            let token_score = column
                .split('_')
                .map(|token| jaro_winkler(target, token))
                .fold(0.0_f64, f64::max);
            // A word naming the table maps to that table's first column.
            let score = if table_hit && column == &columns[0] {
                token_score.max(1.0)
            } else {
                token_score
            };
            if score < TERM_MATCH_THRESHOLD {
                continue;
            }
            let descriptive = !column.ends_with("_id");
            let better = match &best {
                None => true,
                Some((s, d, _)) => score > *s || (score == *s && descriptive && !*d),
            };
            if better {
                best = Some((score, descriptive, format!("{}.{}", table, column)));
            }
        }
    }
    best.map(|(_, _, path)| path)
}

/// Generic analytical questions built from the tables in the description.
pub fn suggest(schema_description: &str) -> Vec<String> {
    let outline = SchemaOutline::parse(schema_description);
    let humanize = |s: &str| s.replace('_', " ");
    let mut out = Vec::new();

    for (table, columns) in &outline.tables {
        let descriptive: Vec<&String> = columns.iter().filter(|c| !c.ends_with("_id")).collect();
        out.push(format!("How many {} are there?", humanize(table)));
        if let Some(last) = descriptive.last() {
            out.push(format!("Show the top 5 {} by {}", humanize(table), humanize(last)));
        }
        if let Some(first) = descriptive.first() {
            out.push(format!("List {} grouped by {}", humanize(table), humanize(first)));
        }
    }
    if let [(a, _), (b, _), ..] = outline.tables.as_slice() {
        out.insert(1, format!("Show {} together with their {}", humanize(a), humanize(b)));
    }

    out.truncate(SUGGESTION_COUNT);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clarification::{decode_outcome, ClarificationOutcome};
    use crate::schema::employee_schema;
    use crate::schema_mapper::decode_mapping;
    use crate::suggestion::decode_suggestions;

    #[test]
    fn test_lexical_mapping_on_employee_schema() {
        let schema = employee_schema().describe();
        let query = "What is John Smith's salary in each department?";
        let mapping = lexical_mapping(query, &schema);

        assert_eq!(mapping.get("John Smith"), Some(&Some("employees.full_name".to_string())));
        assert_eq!(mapping.get("salary"), Some(&Some("employees.annual_salary".to_string())));
        assert_eq!(mapping.get("department"), Some(&Some("departments.dept_name".to_string())));
        assert!(!mapping.contains_key("What"));
    }

    #[test]
    fn test_unrecognized_terms_map_to_null() {
        let schema = employee_schema().describe();
        let mapping = lexical_mapping("employees with pets", &schema);
        assert_eq!(mapping.get("pets"), Some(&None));
        assert_eq!(mapping.get("employees"), Some(&Some("employees.emp_id".to_string())));
    }

    #[test]
    fn test_leading_stopword_is_not_part_of_name() {
        let schema = employee_schema().describe();
        let mapping = lexical_mapping("Show John Smith", &schema);
        assert!(mapping.contains_key("John Smith"));
        assert!(!mapping.contains_key("Show John Smith"));
    }

    #[tokio::test]
    async fn test_responses_decode_with_strict_decoders() {
        let generator = HeuristicGenerator::new();
        let schema = employee_schema().describe();
        let query = "Show me the annual salary for John Smith";

        let raw = generator
            .generate(&SCHEMA_MAPPING, &json!({"query": query, "schema": schema}))
            .await
            .unwrap();
        let mapping = decode_mapping(&raw, query, &schema).unwrap();
        assert!(mapping.len() >= 3);

        let raw = generator
            .generate(&SUGGEST_QUERIES, &json!({"schemaDescription": schema}))
            .await
            .unwrap();
        assert_eq!(decode_suggestions(&raw).unwrap().len(), SUGGESTION_COUNT);
    }

    #[tokio::test]
    async fn test_same_name_candidates_get_follow_up() {
        let candidates = vec![
            CandidateMatch::new("1", "John Smith", "Engineering"),
            CandidateMatch::new("2", "John Smith", "Sales"),
        ];
        let raw = HeuristicGenerator::new()
            .generate(
                &CLARIFICATION,
                &json!({"query": "John Smith", "possibleMatches": candidates, "matchList": ""}),
            )
            .await
            .unwrap();
        assert_eq!(
            decode_outcome(&raw, &candidates).unwrap(),
            ClarificationOutcome::FollowUpQuestions(vec![
                "Which John Smith do you mean: the one in Engineering or the one in Sales?".to_string()
            ])
        );
    }

    #[tokio::test]
    async fn test_different_names_listed_back() {
        let candidates = vec![
            CandidateMatch::new("7", "Jon Smith", "Sales"),
            CandidateMatch::new("8", "John Smyth", "Sales"),
        ];
        let raw = HeuristicGenerator::new()
            .generate(
                &CLARIFICATION,
                &json!({"query": "J Smith", "possibleMatches": candidates, "matchList": ""}),
            )
            .await
            .unwrap();
        assert_eq!(
            decode_outcome(&raw, &candidates).unwrap(),
            ClarificationOutcome::Candidates(candidates)
        );
    }
}
