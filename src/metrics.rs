//! In-process query instrumentation backing the dashboard.
//!
//! Cache hit rate and response-time history are computed from what the router
//! actually observed.

use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::results::CacheStatus;

/// Width of one response-time bucket.
pub const BUCKET_MINUTES: i64 = 10;
/// Number of buckets reported on the dashboard.
pub const HISTORY_BUCKETS: usize = 7;
/// Samples older than this are dropped.
const RETAIN_MINUTES: i64 = BUCKET_MINUTES * HISTORY_BUCKETS as i64;

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: DateTime<Utc>,
    elapsed: Duration,
}

#[derive(Debug, Default)]
pub struct MetricsRecorder {
    lookups: AtomicU64,
    hits: AtomicU64,
    samples: Mutex<Vec<Sample>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub lookups: u64,
    /// Whole percent, 0 when nothing has been looked up yet
    pub hit_rate_percent: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseTimeBucket {
    /// Bucket start, `HH:MM` UTC
    pub time: String,
    pub response_time_ms: u64,
    pub queries: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, cache: CacheStatus, elapsed: Duration) {
        self.record_at(Utc::now(), cache, elapsed);
    }

    pub fn record_at(&self, at: DateTime<Utc>, cache: CacheStatus, elapsed: Duration) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if cache == CacheStatus::Hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }

        let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        samples.push(Sample { at, elapsed });
        let cutoff = at - ChronoDuration::minutes(RETAIN_MINUTES);
        samples.retain(|s| s.at > cutoff);
    }

    pub fn cache_stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let lookups = self.lookups.load(Ordering::Relaxed);
        let hit_rate_percent = if lookups == 0 {
            0
        } else {
            ((hits as f64 / lookups as f64) * 100.0).round() as u32
        };
        CacheStats {
            hits,
            lookups,
            hit_rate_percent,
        }
    }

    /// Average response time per bucket, oldest first, most recent
    /// `HISTORY_BUCKETS` buckets that saw traffic.
    pub fn response_history(&self) -> Vec<ResponseTimeBucket> {
        let samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        let width = ChronoDuration::minutes(BUCKET_MINUTES);

        let mut buckets: BTreeMap<DateTime<Utc>, (u128, usize)> = BTreeMap::new();
        for sample in samples.iter() {
            let start = sample.at.duration_trunc(width).unwrap_or(sample.at);
            let entry = buckets.entry(start).or_insert((0, 0));
            entry.0 += sample.elapsed.as_millis();
            entry.1 += 1;
        }

        let skip = buckets.len().saturating_sub(HISTORY_BUCKETS);
        buckets
            .into_iter()
            .skip(skip)
            .map(|(start, (total_ms, count))| ResponseTimeBucket {
                time: start.format("%H:%M").to_string(),
                response_time_ms: (total_ms / count as u128) as u64,
                queries: count,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_cache_stats() {
        let recorder = MetricsRecorder::new();
        assert_eq!(recorder.cache_stats().hit_rate_percent, 0);

        recorder.record(CacheStatus::Miss, Duration::from_millis(10));
        recorder.record(CacheStatus::Hit, Duration::from_millis(1));
        recorder.record(CacheStatus::Hit, Duration::from_millis(1));
        recorder.record(CacheStatus::Hit, Duration::from_millis(1));

        let stats = recorder.cache_stats();
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.lookups, 4);
        assert_eq!(stats.hit_rate_percent, 75);
    }

    #[test]
    fn test_response_history_buckets() {
        let recorder = MetricsRecorder::new();
        recorder.record_at(at(12, 1), CacheStatus::Miss, Duration::from_millis(800));
        recorder.record_at(at(12, 9), CacheStatus::Miss, Duration::from_millis(900));
        recorder.record_at(at(12, 12), CacheStatus::Hit, Duration::from_millis(1100));

        let history = recorder.response_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].time, "12:00");
        assert_eq!(history[0].response_time_ms, 850);
        assert_eq!(history[0].queries, 2);
        assert_eq!(history[1].time, "12:10");
    }

    #[test]
    fn test_old_samples_are_dropped() {
        let recorder = MetricsRecorder::new();
        recorder.record_at(at(10, 0), CacheStatus::Miss, Duration::from_millis(500));
        recorder.record_at(at(13, 0), CacheStatus::Miss, Duration::from_millis(700));

        let history = recorder.response_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].time, "13:00");
        // Counters are lifetime totals and are not pruned.
        assert_eq!(recorder.cache_stats().lookups, 2);
    }
}
