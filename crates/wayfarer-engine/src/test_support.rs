//! Shared test fixtures for node unit tests.

#![cfg(test)]

use wayfarer_kernel::graph::{RuntimeConfig, RuntimeContext};

pub fn test_ctx() -> RuntimeContext {
    RuntimeContext {
        config: RuntimeConfig::with_defaults(25, 3.5, 1, std::env::temp_dir()),
        telemetry: crate::telemetry::null_telemetry(),
        failures: crate::telemetry::null_telemetry(),
        metrics: crate::metrics::MetricsCollector::null(),
    }
}
