//! Metrics dashboard snapshot.

use crate::metrics::{CacheStats, MetricsRecorder, ResponseTimeBucket};
use crate::schema::SchemaInfo;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub schema: SchemaInfo,
    pub cache: CacheStats,
    pub response_times: Vec<ResponseTimeBucket>,
    pub cached_queries: usize,
}

impl DashboardSnapshot {
    pub fn capture(schema: SchemaInfo, recorder: &MetricsRecorder, cached_queries: usize) -> Self {
        Self {
            schema,
            cache: recorder.cache_stats(),
            response_times: recorder.response_history(),
            cached_queries,
        }
    }

    /// Plain-text rendering for the CLI.
    pub fn render(&self) -> String {
        let mut out = format!(
            "Tables: {}  Columns: {}  Relationships: {}\nCache hit rate: {}% ({} of {} lookups, {} cached queries)\n",
            self.schema.tables,
            self.schema.columns,
            self.schema.relationships,
            self.cache.hit_rate_percent,
            self.cache.hits,
            self.cache.lookups,
            self.cached_queries
        );
        if self.response_times.is_empty() {
            out.push_str("No queries recorded yet\n");
        }
        for bucket in &self.response_times {
            out.push_str(&format!(
                "  {}  {:>6} ms  ({} queries)\n",
                bucket.time, bucket.response_time_ms, bucket.queries
            ));
        }
        out
    }
}
