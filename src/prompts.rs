//! Prompt templates for the reasoning service.
//!
//! A template is the wire contract together with the output shape its flow
//! decodes. Fields are substituted verbatim in a single pass over `{{field}}`
//! placeholders; substituted text is never re-expanded.

use crate::error::{EmpowerError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

/// System message sent with every template.
pub const JSON_ONLY_SYSTEM: &str =
    "You are a precise JSON-only responder. Always return valid JSON, no other text.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub text: &'static str,
}

pub const CLARIFICATION: PromptTemplate = PromptTemplate {
    name: "nlQueryClarification",
    text: r#"You are an AI assistant helping to clarify ambiguous natural language queries related to employee data.

The user's query is: "{{query}}"

There are multiple possible matches for this query. Here are the possible matches with their context:
{{matchList}}

Based on the query and the possible matches, you should either:
1. Return a clarified query if you can confidently determine the user's intent.
2. Return a list of follow-up questions to ask the user to clarify the query.
3. Return the list of possible matches with context to display to the user, so the user can select the correct match.

Return JSON with exactly one of these keys:
{"clarifiedQuery": "..."}
{"followUpQuestions": ["...", "..."]}
{"possibleMatchesWithContext": [{"id": "...", "name": "...", "context": "..."}]}"#,
};

pub const SCHEMA_MAPPING: PromptTemplate = PromptTemplate {
    name: "mapNaturalLanguageToSchema",
    text: r#"You are a database expert. Given a natural language query and a database schema, map the query to the schema.

Query: {{query}}
Schema: {{schema}}

Return a JSON object where each key is a term exactly as it appears in the query, and each value is the corresponding column as "table.column" from the schema. If a term does not map to any column, the value must be null.

Example:
Query: Show me the salary for John Smith
Schema: { employees: { name: string, salary: number } }
Output: {"mapping": {"salary": "employees.salary", "John Smith": "employees.name"}}"#,
};

pub const SUGGEST_QUERIES: PromptTemplate = PromptTemplate {
    name: "suggestQueries",
    text: r#"You are an AI assistant helping users to explore a database.
Given the following database schema description, suggest 5 natural language queries a user might ask to gain insights from the database. Consider common questions and analytical queries.

Schema Description: {{schemaDescription}}

Return JSON: {"suggestedQueries": ["...", "..."]}"#,
};

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap();
}

impl PromptTemplate {
    /// Substitute `{{field}}` placeholders from the top-level fields of `input`.
    /// Strings go in verbatim; other JSON values are inserted as compact JSON.
    pub fn render(&self, input: &Value) -> Result<String> {
        let mut out = String::with_capacity(self.text.len() + 256);
        let mut cursor = 0;

        for caps in PLACEHOLDER.captures_iter(self.text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let field = &caps[1];
            let value = input.get(field).ok_or_else(|| {
                EmpowerError::InvalidInput(format!("prompt '{}' is missing field '{}'", self.name, field))
            })?;

            out.push_str(&self.text[cursor..whole.start()]);
            match value {
                Value::String(s) => out.push_str(s),
                other => out.push_str(&other.to_string()),
            }
            cursor = whole.end();
        }
        out.push_str(&self.text[cursor..]);
        Ok(out)
    }

    /// Placeholder names in template order.
    pub fn fields(&self) -> Vec<&'static str> {
        PLACEHOLDER
            .captures_iter(self.text)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect()
    }
}
