//! Schema Mapper
//!
//! Grounds the terms of a natural-language query in the data model: each
//! recognizable term maps to a `table.column` path, or to `None` when no
//! column fits. Terms are never dropped from the mapping.

use crate::error::{EmpowerError, Result};
use crate::highlight::Snippet;
use crate::llm::{clean_json_response, generate_with_timeout, TextGenerator};
use crate::prompts::SCHEMA_MAPPING;
use crate::schema::{mentions_identifier, SchemaOutline};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Query term (literal, as written in the query) to column path. `None` is the
/// explicit "no column" marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SchemaMapping(BTreeMap<String, Option<String>>);

impl SchemaMapping {
    pub fn get(&self, term: &str) -> Option<&Option<String>> {
        self.0.get(term)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Option<String>)> {
        self.0.iter()
    }

    /// Terms that resolved to a column.
    pub fn mapped(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter_map(|(term, path)| path.as_deref().map(|p| (term.as_str(), p)))
    }

    /// Terms with no plausible column.
    pub fn unmapped(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, path)| path.is_none())
            .map(|(term, _)| term.as_str())
    }

    /// The query with every mapped term highlighted.
    pub fn highlight(&self, query: &str) -> Snippet {
        let terms: Vec<&str> = self.mapped().map(|(term, _)| term).collect();
        Snippet::with_terms(query, &terms)
    }
}

impl FromIterator<(String, Option<String>)> for SchemaMapping {
    fn from_iter<I: IntoIterator<Item = (String, Option<String>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireMapping {
    mapping: BTreeMap<String, Option<String>>,
}

pub struct SchemaMapper {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl SchemaMapper {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    pub async fn map_to_schema(&self, query: &str, schema: &str) -> Result<SchemaMapping> {
        if query.trim().is_empty() {
            return Err(EmpowerError::InvalidQuery("query is empty".to_string()));
        }
        if schema.trim().is_empty() {
            return Err(EmpowerError::InvalidInput("schema description is empty".to_string()));
        }

        let input = serde_json::json!({ "query": query, "schema": schema });
        let raw = generate_with_timeout(self.generator.as_ref(), &SCHEMA_MAPPING, &input, self.timeout).await?;
        let mapping = decode_mapping(&raw, query, schema)?;
        debug!(
            "Mapped {} terms ({} without a column)",
            mapping.len(),
            mapping.unmapped().count()
        );
        Ok(mapping)
    }
}

/// Decode a service response and check it against the query and schema.
pub fn decode_mapping(raw: &str, query: &str, schema: &str) -> Result<SchemaMapping> {
    let wire: WireMapping = serde_json::from_str(clean_json_response(raw))
        .map_err(|e| EmpowerError::Decode(format!("schema mapping response: {}", e)))?;
    let outline = SchemaOutline::parse(schema);

    let mut mapping = BTreeMap::new();
    for (term, path) in wire.mapping {
        if term.trim().is_empty() {
            return Err(EmpowerError::Decode("schema mapping contains an empty term".to_string()));
        }
        if !query.contains(term.as_str()) {
            return Err(EmpowerError::Decode(format!(
                "term '{}' does not appear in the query",
                term
            )));
        }

        let grounded = match path {
            Some(path) => {
                let qualified = qualify_path(path.trim(), schema, &outline);
                if qualified.is_none() {
                    warn!("Column '{}' for term '{}' is not in the schema, marking absent", path, term);
                }
                qualified
            }
            None => None,
        };
        mapping.insert(term, grounded);
    }
    Ok(SchemaMapping(mapping))
}

/// Accept `table.column` when both parts appear in the schema description; a
/// bare column is qualified when exactly one table has it.
fn qualify_path(path: &str, schema: &str, outline: &SchemaOutline) -> Option<String> {
    if path.is_empty() {
        return None;
    }

    if let Some((table, column)) = path.split_once('.') {
        let known = if outline.is_empty() {
            mentions_identifier(schema, table) && mentions_identifier(schema, column)
        } else {
            outline
                .tables
                .iter()
                .any(|(t, cols)| t == table && cols.iter().any(|c| c == column))
        };
        return known.then(|| path.to_string());
    }

    let mut owners = outline
        .tables
        .iter()
        .filter(|(_, cols)| cols.iter().any(|c| c == path));
    match (owners.next(), owners.next()) {
        (Some((table, _)), None) => Some(format!("{}.{}", table, path)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedGenerator;
    use crate::schema::employee_schema;

    const QUERY: &str = "Show me the annual salary for John Smith in Engineering";

    fn schema() -> String {
        employee_schema().describe()
    }

    #[test]
    fn test_decode_keeps_absent_terms() {
        let raw = r#"{"mapping": {"annual salary": "employees.annual_salary", "John Smith": "employees.full_name", "Engineering": "departments.dept_name", "Show": null}}"#;
        let mapping = decode_mapping(raw, QUERY, &schema()).unwrap();
        assert_eq!(mapping.len(), 4);
        assert_eq!(mapping.get("Show"), Some(&None));
        assert_eq!(
            mapping.get("John Smith"),
            Some(&Some("employees.full_name".to_string()))
        );
        assert_eq!(mapping.unmapped().collect::<Vec<_>>(), vec!["Show"]);
    }

    #[test]
    fn test_unknown_column_becomes_absent_not_dropped() {
        let raw = r#"{"mapping": {"annual salary": "payroll.gross"}}"#;
        let mapping = decode_mapping(raw, QUERY, &schema()).unwrap();
        assert_eq!(mapping.get("annual salary"), Some(&None));
    }

    #[test]
    fn test_bare_column_is_qualified() {
        let raw = r#"{"mapping": {"annual salary": "annual_salary", "Engineering": "dept_id"}}"#;
        let mapping = decode_mapping(raw, QUERY, &schema()).unwrap();
        assert_eq!(
            mapping.get("annual salary"),
            Some(&Some("employees.annual_salary".to_string()))
        );
        // dept_id lives in two tables, so it cannot be qualified.
        assert_eq!(mapping.get("Engineering"), Some(&None));
    }

    #[test]
    fn test_keys_must_be_literal_query_terms() {
        let raw = r#"{"mapping": {"john smith": "employees.full_name"}}"#;
        assert!(matches!(
            decode_mapping(raw, QUERY, &schema()),
            Err(EmpowerError::Decode(_))
        ));
    }

    #[test]
    fn test_malformed_shapes_rejected() {
        for raw in [
            r#"{"salary": "employees.annual_salary"}"#,
            r#"{"mapping": {"salary": 3}}"#,
            r#"{"mapping": {}, "notes": "x"}"#,
            r#"["salary"]"#,
        ] {
            assert!(decode_mapping(raw, QUERY, &schema()).is_err(), "{}", raw);
        }
    }

    #[test]
    fn test_object_notation_schema() {
        let schema = "{ employees: { name: string, salary: number } }";
        let raw = r#"{"mapping": {"salary": "employees.salary", "John Smith": "employees.name"}}"#;
        let mapping = decode_mapping(raw, "Show me the salary for John Smith", schema).unwrap();
        assert_eq!(mapping.mapped().count(), 2);
    }

    #[test]
    fn test_highlight_mapped_terms() {
        let raw = r#"{"mapping": {"annual salary": "employees.annual_salary", "Show": null}}"#;
        let mapping = decode_mapping(raw, QUERY, &schema()).unwrap();
        assert_eq!(mapping.highlight(QUERY).highlighted(), vec!["annual salary"]);
    }

    #[tokio::test]
    async fn test_map_to_schema_uses_generator() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.reply(
            &SCHEMA_MAPPING,
            r#"{"mapping": {"annual salary": "employees.annual_salary"}}"#,
        );
        let mapper = SchemaMapper::new(generator.clone(), Duration::from_secs(1));
        let mapping = mapper.map_to_schema(QUERY, &schema()).await.unwrap();
        assert_eq!(mapping.len(), 1);

        let calls = generator.calls();
        assert_eq!(calls[0].1["query"], QUERY);
    }

    #[tokio::test]
    async fn test_empty_inputs_rejected_before_call() {
        let generator = Arc::new(ScriptedGenerator::new());
        let mapper = SchemaMapper::new(generator.clone(), Duration::from_secs(1));
        assert!(matches!(
            mapper.map_to_schema("", &schema()).await,
            Err(EmpowerError::InvalidQuery(_))
        ));
        assert!(matches!(
            mapper.map_to_schema(QUERY, " ").await,
            Err(EmpowerError::InvalidInput(_))
        ));
        assert_eq!(generator.call_count(), 0);
    }
}
