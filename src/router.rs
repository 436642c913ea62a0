//! Query Router
//!
//! Classifies a natural-language query into a result category by keyword
//! signals and returns the matching payload with timing telemetry. The
//! classifier is a keyword placeholder; callers rely only on it returning one
//! of three categories deterministically for the same keyword signals.

use crate::error::{EmpowerError, Result};
use crate::metrics::MetricsRecorder;
use crate::mock_data;
use crate::results::{CacheStatus, QueryCategory, QueryMetrics, QueryResult};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info};

pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Keyword signals, matched as lowercase substrings of the query.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Unstructured-content signals; highest precedence.
    pub document_keywords: Vec<String>,
    /// Cross-cutting skill signals; checked after document keywords.
    pub skill_keywords: Vec<String>,
    /// Most distinct queries kept in the result cache; oldest are evicted first.
    pub cache_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            document_keywords: vec!["review".to_string(), "resume".to_string()],
            skill_keywords: vec!["python".to_string()],
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl RouterConfig {
    pub fn classify(&self, query: &str) -> QueryCategory {
        let lowered = query.to_lowercase();
        let has = |keywords: &[String]| keywords.iter().any(|k| lowered.contains(k.as_str()));

        if has(&self.document_keywords) {
            QueryCategory::DocumentSearch
        } else if has(&self.skill_keywords) {
            QueryCategory::Combined
        } else {
            QueryCategory::Structured
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutedQuery {
    pub result: QueryResult,
    pub metrics: QueryMetrics,
}

pub struct QueryRouter {
    config: RouterConfig,
    cache: DashMap<String, QueryResult>,
    /// Cache keys in insertion order, for eviction
    insertion_order: Mutex<VecDeque<String>>,
    recorder: Arc<MetricsRecorder>,
}

impl QueryRouter {
    pub fn new(config: RouterConfig, recorder: Arc<MetricsRecorder>) -> Self {
        Self {
            config,
            cache: DashMap::new(),
            insertion_order: Mutex::new(VecDeque::new()),
            recorder,
        }
    }

    pub fn classify(&self, query: &str) -> QueryCategory {
        self.config.classify(query)
    }

    /// Route a query. Empty input is rejected before any lookup.
    pub fn route(&self, query: &str) -> Result<RoutedQuery> {
        let key = cache_key(query);
        if key.is_empty() {
            return Err(EmpowerError::InvalidQuery("query is empty".to_string()));
        }

        let started = Instant::now();
        let (result, cache) = match self.cache.get(&key) {
            Some(cached) => (cached.value().clone(), CacheStatus::Hit),
            None => {
                let category = self.config.classify(query);
                debug!("Classified query as {:?}", category);
                let result = mock_data::result_for(category);
                self.remember(key, result.clone());
                (result, CacheStatus::Miss)
            }
        };
        let elapsed = started.elapsed();

        self.recorder.record(cache, elapsed);
        info!(
            "Routed query to {} ({}, {} rows, {} documents)",
            result.category(),
            cache,
            result.rows().len(),
            result.hits().len()
        );

        Ok(RoutedQuery {
            result,
            metrics: QueryMetrics { elapsed, cache },
        })
    }

    pub fn cached_queries(&self) -> usize {
        self.cache.len()
    }

    fn remember(&self, key: String, result: QueryResult) {
        if self.cache.insert(key.clone(), result).is_some() {
            return;
        }
        let capacity = self.config.cache_capacity.max(1);
        let mut order = self.insertion_order.lock().unwrap_or_else(|e| e.into_inner());
        order.push_back(key);
        while order.len() > capacity {
            if let Some(oldest) = order.pop_front() {
                self.cache.remove(&oldest);
                debug!("Evicted cached query '{}'", oldest);
            }
        }
    }
}

/// Lowercased, whitespace-collapsed form of the query.
fn cache_key(query: &str) -> String {
    query
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}
