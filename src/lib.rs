pub mod clarification;
pub mod config;
pub mod connector;
pub mod dashboard;
pub mod error;
pub mod heuristic;
pub mod highlight;
pub mod llm;
pub mod metrics;
pub mod mock_data;
pub mod prompts;
pub mod results;
pub mod retry;
pub mod router;
pub mod schema;
pub mod schema_mapper;
pub mod service;
pub mod suggestion;
pub mod uploader;

pub use clarification::{CandidateMatch, ClarificationOutcome, ClarificationResolver};
pub use config::AppConfig;
pub use error::{EmpowerError, Result};
pub use llm::{LlmClient, TextGenerator};
pub use results::{QueryCategory, QueryMetrics, QueryResult};
pub use router::{QueryRouter, RouterConfig};
pub use schema_mapper::{SchemaMapper, SchemaMapping};
pub use service::QueryService;
