//! Simulated result sets for each query category.
//!
//! Snippet markup here is fixture text; it goes through `Snippet::from_marked`
//! and is never rendered verbatim.

use crate::highlight::Snippet;
use crate::results::{DocumentHit, QueryCategory, QueryResult, Row};

/// Suggestion chips shown before any query is entered.
pub const DEFAULT_SUGGESTIONS: [&str; 4] = [
    "Show me all Python developers in Engineering",
    "How many employees do we have?",
    "List employees hired this year",
    "Show me performance reviews for engineers hired last year",
];

fn employee(emp_id: i64, full_name: &str, position: &str, annual_salary: i64) -> Row {
    Row::new()
        .with("emp_id", emp_id)
        .with("full_name", full_name)
        .with("position", position)
        .with("annual_salary", annual_salary)
}

fn staff(emp_id: i64, full_name: &str, dept_name: &str, position: &str) -> Row {
    Row::new()
        .with("emp_id", emp_id)
        .with("full_name", full_name)
        .with("dept_name", dept_name)
        .with("position", position)
}

fn hit(source: &str, marked: &str) -> DocumentHit {
    DocumentHit {
        source: source.to_string(),
        snippet: Snippet::from_marked(marked),
    }
}

pub fn structured_rows() -> Vec<Row> {
    vec![
        employee(101, "Alice Johnson", "Software Engineer", 120000),
        employee(105, "Bob Williams", "Senior Engineer", 150000),
        employee(202, "Charlie Brown", "Product Manager", 140000),
        employee(108, "David Lee", "DevOps Engineer", 135000),
        employee(301, "Eve Davis", "Data Scientist", 160000),
    ]
}

pub fn document_hits() -> Vec<DocumentHit> {
    vec![
        hit(
            "John_Doe_Review_2023.pdf",
            "John consistently exceeds expectations... shows strong leadership potential. Needs to improve on <mark>documentation</mark> practices.",
        ),
        hit(
            "Engineering_Handbook.docx",
            "All engineers are required to complete a quarterly performance review. These <mark>reviews</mark> are crucial for career development.",
        ),
        hit(
            "Alice_Johnson_Resume.pdf",
            "Led a team of 5 engineers in the development of a new microservice. Skilled in <mark>Python</mark>, Java, and React.",
        ),
    ]
}

pub fn combined_rows() -> Vec<Row> {
    vec![
        staff(101, "Alice Johnson", "Engineering", "Software Engineer"),
        staff(105, "Bob Williams", "Engineering", "Senior Engineer"),
        staff(301, "Eve Davis", "Data Science", "Data Scientist"),
    ]
}

pub fn combined_hits() -> Vec<DocumentHit> {
    vec![
        hit(
            "Alice_Johnson_Resume.pdf",
            "...proficient in several programming languages including <mark>Python</mark>, Go, and JavaScript.",
        ),
        hit(
            "Tech_Talk_Signups.csv",
            "Eve Davis, Introduction to <mark>Python</mark> for Data Analysis",
        ),
    ]
}

/// The canned payload for a category.
pub fn result_for(category: QueryCategory) -> QueryResult {
    match category {
        QueryCategory::Structured => QueryResult::Structured {
            rows: structured_rows(),
        },
        QueryCategory::DocumentSearch => QueryResult::DocumentSearch {
            hits: document_hits(),
        },
        QueryCategory::Combined => QueryResult::Combined {
            rows: combined_rows(),
            hits: combined_hits(),
        },
    }
}
