//! Discovered schema model
//!
//! The employee database is simulated: `employee_schema()` returns the schema a
//! connector would have discovered. `describe()` renders it as the plain-text
//! description handed to the reasoning service, and `SchemaOutline::parse`
//! recovers table/column names from such a description.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub tables: usize,
    pub columns: usize,
    pub relationships: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredSchema {
    pub info: SchemaInfo,
    pub tables: Vec<TableDef>,
    pub relationships: Vec<Relationship>,
}

fn col(name: &str, data_type: &str) -> ColumnDef {
    ColumnDef {
        name: name.to_string(),
        data_type: data_type.to_string(),
        is_primary_key: false,
    }
}

fn pk(name: &str, data_type: &str) -> ColumnDef {
    ColumnDef {
        is_primary_key: true,
        ..col(name, data_type)
    }
}

fn rel(from_table: &str, from_column: &str, to_table: &str, to_column: &str) -> Relationship {
    Relationship {
        from_table: from_table.to_string(),
        from_column: from_column.to_string(),
        to_table: to_table.to_string(),
        to_column: to_column.to_string(),
    }
}

/// The simulated company database.
pub fn employee_schema() -> DiscoveredSchema {
    let tables = vec![
        TableDef {
            name: "employees".to_string(),
            columns: vec![
                pk("emp_id", "integer"),
                col("full_name", "varchar"),
                col("dept_id", "integer"),
                col("position", "varchar"),
                col("annual_salary", "numeric"),
                col("join_date", "date"),
            ],
        },
        TableDef {
            name: "departments".to_string(),
            columns: vec![
                pk("dept_id", "integer"),
                col("dept_name", "varchar"),
                col("manager_id", "integer"),
            ],
        },
        TableDef {
            name: "documents".to_string(),
            columns: vec![
                pk("doc_id", "uuid"),
                col("emp_id", "integer"),
                col("type", "varchar"),
                col("content", "text"),
                col("uploaded_at", "timestamp"),
            ],
        },
    ];
    let relationships = vec![
        rel("employees", "dept_id", "departments", "dept_id"),
        rel("documents", "emp_id", "employees", "emp_id"),
    ];
    DiscoveredSchema::new(tables, relationships)
}

impl DiscoveredSchema {
    /// Build a schema, deriving the summary counts from its contents.
    pub fn new(tables: Vec<TableDef>, relationships: Vec<Relationship>) -> Self {
        let info = SchemaInfo {
            tables: tables.len(),
            columns: tables.iter().map(|t| t.columns.len()).sum(),
            relationships: relationships.len(),
        };
        Self {
            info,
            tables,
            relationships,
        }
    }

    /// Plain-text description used as the `schema` prompt field.
    pub fn describe(&self) -> String {
        let mut lines: Vec<String> = self
            .tables
            .iter()
            .map(|table| {
                let columns: Vec<String> = table
                    .columns
                    .iter()
                    .map(|c| {
                        if c.is_primary_key {
                            format!("{} {} primary key", c.name, c.data_type)
                        } else {
                            format!("{} {}", c.name, c.data_type)
                        }
                    })
                    .collect();
                format!("{}({})", table.name, columns.join(", "))
            })
            .collect();

        if !self.relationships.is_empty() {
            let joins: Vec<String> = self
                .relationships
                .iter()
                .map(|r| format!("{}.{} -> {}.{}", r.from_table, r.from_column, r.to_table, r.to_column))
                .collect();
            lines.push(format!("relationships: {}", joins.join("; ")));
        }
        lines.join("\n")
    }
}

lazy_static! {
    static ref PAREN_TABLE: Regex = Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\s*\(([^()]*)\)").unwrap();
    static ref BRACE_TABLE: Regex = Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\s*:\s*\{([^{}]*)\}").unwrap();
    static ref BRACE_COLUMN: Regex = Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\s*:").unwrap();
    static ref IDENT: Regex = Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap();
}

/// Table and column names recovered from a free-text schema description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaOutline {
    pub tables: Vec<(String, Vec<String>)>,
}

impl SchemaOutline {
    /// Accepts both `table(col type, ...)` lines and the `{ table: { col: type } }`
    /// object notation. Anything else is ignored.
    pub fn parse(description: &str) -> Self {
        let mut tables: Vec<(String, Vec<String>)> = Vec::new();

        for caps in PAREN_TABLE.captures_iter(description) {
            let columns = caps[2]
                .split(',')
                .filter_map(|item| IDENT.find(item.trim()).map(|m| m.as_str().to_string()))
                .collect::<Vec<_>>();
            if !columns.is_empty() {
                tables.push((caps[1].to_string(), columns));
            }
        }

        for caps in BRACE_TABLE.captures_iter(description) {
            let columns = BRACE_COLUMN
                .captures_iter(&caps[2])
                .map(|c| c[1].to_string())
                .collect::<Vec<_>>();
            if !columns.is_empty() && !tables.iter().any(|(name, _)| name == &caps[1]) {
                tables.push((caps[1].to_string(), columns));
            }
        }

        Self { tables }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// All `table.column` paths, in description order.
    pub fn column_paths(&self) -> Vec<String> {
        self.tables
            .iter()
            .flat_map(|(table, columns)| columns.iter().map(move |c| format!("{}.{}", table, c)))
            .collect()
    }
}

/// True when `ident` appears in `description` as a whole identifier.
pub fn mentions_identifier(description: &str, ident: &str) -> bool {
    IDENT.find_iter(description).any(|m| m.as_str() == ident)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_employee_schema_counts() {
        let schema = employee_schema();
        assert_eq!(
            schema.info,
            SchemaInfo {
                tables: 3,
                columns: 14,
                relationships: 2
            }
        );
    }

    #[test]
    fn test_describe_round_trips_through_outline() {
        let schema = employee_schema();
        let outline = SchemaOutline::parse(&schema.describe());
        assert_eq!(outline.tables.len(), 3);
        assert_eq!(outline.tables[0].0, "employees");
        assert!(outline.column_paths().contains(&"employees.annual_salary".to_string()));
        assert!(outline.column_paths().contains(&"departments.dept_name".to_string()));
    }

    #[test]
    fn test_outline_from_object_notation() {
        let outline = SchemaOutline::parse("{ employees: { name: string, salary: number } }");
        assert_eq!(
            outline.tables,
            vec![("employees".to_string(), vec!["name".to_string(), "salary".to_string()])]
        );
    }

    #[test]
    fn test_mentions_identifier_is_word_bounded() {
        let description = "employees(annual_salary numeric)";
        assert!(mentions_identifier(description, "annual_salary"));
        assert!(!mentions_identifier(description, "salary"));
    }
}
