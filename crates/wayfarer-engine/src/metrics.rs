//! Metrics Collector (SPEC_FULL.md §2.5): per-run counters and timers,
//! appended as one JSONL record per run to `metrics/metrics.jsonl`.

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Default)]
struct Counters {
    values: HashMap<&'static str, u64>,
}

#[derive(Debug, Default)]
struct Timers {
    /// keyed by metric name (e.g. `tool_latency_ms.flights_search_links`)
    values: HashMap<String, Vec<u64>>,
}

/// Per-run metrics accumulator. Flushed to disk once via [`MetricsCollector::finish`].
pub struct MetricsCollector {
    run_id: String,
    counters: Mutex<Counters>,
    timers: Mutex<Timers>,
}

impl MetricsCollector {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            counters: Mutex::new(Counters::default()),
            timers: Mutex::new(Timers::default()),
        }
    }

    pub fn incr(&self, name: &'static str) {
        *self.counters.lock().values.entry(name).or_insert(0) += 1;
    }

    pub fn record_ms(&self, name: impl Into<String>, millis: u64) {
        self.timers.lock().values.entry(name.into()).or_default().push(millis);
    }

    pub fn null() -> std::sync::Arc<dyn wayfarer_kernel::telemetry::MetricsSink> {
        std::sync::Arc::new(MetricsCollector::new("null"))
    }

    pub fn finish(&self, runtime_dir: &Path, status: &str) -> std::io::Result<()> {
        #[derive(Serialize)]
        struct Record<'a> {
            timestamp: chrono::DateTime<Utc>,
            run_id: &'a str,
            status: &'a str,
            counters: HashMap<&'static str, u64>,
            timers_ms: HashMap<String, Vec<u64>>,
        }

        let record = Record {
            timestamp: Utc::now(),
            run_id: &self.run_id,
            status,
            counters: self.counters.lock().values.clone(),
            timers_ms: self.timers.lock().values.clone(),
        };

        let metrics_dir = runtime_dir.join("metrics");
        std::fs::create_dir_all(&metrics_dir)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(metrics_dir.join("metrics.jsonl"))?;
        writeln!(file, "{}", serde_json::to_string(&record)?)
    }
}

impl wayfarer_kernel::telemetry::MetricsSink for MetricsCollector {
    fn incr(&self, name: &'static str) {
        MetricsCollector::incr(self, name);
    }

    fn record_ms(&self, name: String, millis: u64) {
        MetricsCollector::record_ms(self, name, millis);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_writes_one_jsonl_record() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = MetricsCollector::new("r1");
        metrics.incr("rag_retrievals");
        metrics.incr("rag_retrievals");
        metrics.record_ms("tool_latency_ms.flights_search_links", 12);
        metrics.finish(dir.path(), "finalized").unwrap();

        let content = std::fs::read_to_string(dir.path().join("metrics").join("metrics.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("\"rag_retrievals\":2"));
    }
}
