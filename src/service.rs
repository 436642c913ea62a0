//! Wires the query flows together for the CLI and the HTTP server.

use crate::clarification::{CandidateMatch, ClarificationOutcome, ClarificationResolver};
use crate::config::AppConfig;
use crate::connector::DatabaseConnector;
use crate::dashboard::DashboardSnapshot;
use crate::error::Result;
use crate::llm::{generator_from_config, TextGenerator};
use crate::metrics::MetricsRecorder;
use crate::retry::RetryPolicy;
use crate::router::{QueryRouter, RoutedQuery, RouterConfig};
use crate::schema::{employee_schema, DiscoveredSchema, SchemaInfo};
use crate::schema_mapper::{SchemaMapper, SchemaMapping};
use crate::suggestion::QuerySuggester;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct QueryService {
    router: QueryRouter,
    resolver: ClarificationResolver,
    mapper: SchemaMapper,
    suggester: QuerySuggester,
    connector: DatabaseConnector,
    recorder: Arc<MetricsRecorder>,
    retry: RetryPolicy,
    schema: DiscoveredSchema,
}

impl QueryService {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let generator = generator_from_config(config)?;
        info!("Using {} generator", generator.name());
        Ok(Self::with_generator(generator, config.llm_timeout))
    }

    pub fn with_generator(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        let recorder = Arc::new(MetricsRecorder::new());
        Self {
            router: QueryRouter::new(RouterConfig::default(), recorder.clone()),
            resolver: ClarificationResolver::new(generator.clone(), timeout),
            mapper: SchemaMapper::new(generator.clone(), timeout),
            suggester: QuerySuggester::new(generator, timeout),
            connector: DatabaseConnector::new(),
            recorder,
            retry: RetryPolicy::default(),
            schema: employee_schema(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn route(&self, query: &str) -> Result<RoutedQuery> {
        self.router.route(query)
    }

    pub async fn clarify(&self, query: &str, candidates: &[CandidateMatch]) -> Result<ClarificationOutcome> {
        self.retry.retry(|| self.resolver.resolve(query, candidates)).await
    }

    /// Map against `schema`, or the discovered schema when none is given.
    pub async fn map_to_schema(&self, query: &str, schema: Option<&str>) -> Result<SchemaMapping> {
        let description = match schema {
            Some(s) => s.to_string(),
            None => self.schema.describe(),
        };
        self.retry
            .retry(|| self.mapper.map_to_schema(query, &description))
            .await
    }

    pub async fn suggest_queries(&self, schema_description: Option<&str>) -> Result<Vec<String>> {
        let description = match schema_description {
            Some(s) => s.to_string(),
            None => self.schema.describe(),
        };
        self.retry
            .retry(|| self.suggester.suggest_queries(&description))
            .await
    }

    pub async fn connect(&self, connection_string: &str) -> Result<SchemaInfo> {
        self.connector.connect(connection_string).await
    }

    pub fn schema(&self) -> &DiscoveredSchema {
        &self.schema
    }

    pub fn dashboard(&self) -> DashboardSnapshot {
        DashboardSnapshot::capture(self.schema.info, &self.recorder, self.router.cached_queries())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmpowerError;
    use crate::heuristic::HeuristicGenerator;
    use crate::llm::{ScriptedGenerator, ScriptedReply};
    use crate::prompts::SUGGEST_QUERIES;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_routes_feed_dashboard() {
        let service = QueryService::with_generator(Arc::new(HeuristicGenerator::new()), Duration::from_secs(1));
        service.route("Average salary by department").unwrap();
        service.route("average  salary by DEPARTMENT").unwrap();

        let dashboard = service.dashboard();
        assert_eq!(dashboard.cache.lookups, 2);
        assert_eq!(dashboard.cache.hits, 1);
        assert_eq!(dashboard.cached_queries, 1);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.push(&SUGGEST_QUERIES, ScriptedReply::Unavailable("503".to_string()));
        generator.reply(&SUGGEST_QUERIES, r#"{"suggestedQueries": ["Headcount by department"]}"#);

        let service = QueryService::with_generator(generator.clone(), Duration::from_secs(1))
            .with_retry(fast_retry());
        let suggestions = service.suggest_queries(None).await.unwrap();
        assert_eq!(suggestions, vec!["Headcount by department".to_string()]);
        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test]
    async fn test_decode_failure_is_not_retried() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.reply(&SUGGEST_QUERIES, r#"{"queries": []}"#);

        let service = QueryService::with_generator(generator.clone(), Duration::from_secs(1))
            .with_retry(fast_retry());
        assert!(matches!(
            service.suggest_queries(Some("employees(emp_id integer)")).await,
            Err(EmpowerError::Decode(_))
        ));
        assert_eq!(generator.call_count(), 1);
    }
}
